// CLI definitions using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use usbll::{Config, OutputFormat};
use usbll_engine::Speed;

#[derive(Parser)]
#[command(name = "usbll")]
#[command(author, version, about = "USB 2.0 link-layer capture analyzer")]
pub struct Cli {
    /// Capture file (pcap or pcapng, link type 288 or 293-295)
    pub file: PathBuf,

    /// Config file path (default: ~/.config/usbll/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bus speed for captures that do not record it (link type 288)
    #[arg(long, value_enum)]
    pub speed: Option<CliSpeed>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<CliFormat>,

    /// Filter output (all, transfers, errors, addr=N)
    #[arg(long)]
    pub filter: Option<String>,

    /// Show raw packet bytes alongside decoded output
    #[arg(long)]
    pub hex: bool,

    /// Print frame and transfer statistics to stderr when done
    #[arg(long)]
    pub stats: bool,

    /// Re-dissect every frame after the first pass and report differences
    #[arg(long)]
    pub verify_replay: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CliSpeed {
    Low,
    Full,
    High,
}

impl From<CliSpeed> for Speed {
    fn from(speed: CliSpeed) -> Self {
        match speed {
            CliSpeed::Low => Speed::Low,
            CliSpeed::Full => Speed::Full,
            CliSpeed::High => Speed::High,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum CliFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output (one object per line)
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Text => OutputFormat::Text,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

impl Cli {
    /// Command line flags take precedence over the config file
    pub fn apply(&self, config: &mut Config) {
        if let Some(speed) = self.speed {
            config.fallback_speed = speed.into();
        }
        if let Some(format) = self.format {
            config.format = format.into();
        }
        if self.hex {
            config.hex = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["usbll", "--speed", "high", "--format", "json", "cap.pcap"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.fallback_speed, Speed::High);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.hex);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["usbll", "cap.pcapng"]);
        let mut config = Config {
            hex: true,
            ..Config::default()
        };
        cli.apply(&mut config);
        assert!(config.hex);
        assert_eq!(cli.log_level, "warn");
        assert!(!cli.verify_replay);
    }
}

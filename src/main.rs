// USB 2.0 link-layer capture analyzer

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing::{debug, info};

use cli::Cli;
use usbll::{CaptureAnalyzer, CaptureError, Config, OutputFormat, PacketFilter, Printer};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries dissection output only
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    debug!("Loading config from {:?}", config_path);
    let mut config = Config::load(&config_path)?;
    cli.apply(&mut config);

    let filter = match cli.filter.as_deref() {
        Some(f) => PacketFilter::from_str(f).map_err(CaptureError::Filter)?,
        None => PacketFilter::All,
    };

    let stdout = std::io::stdout();
    let color = config.format == OutputFormat::Text && stdout.is_terminal();
    let printer = Printer::new(config.format, filter)
        .with_hex(config.hex)
        .with_color(color);

    let mut analyzer = CaptureAnalyzer::new(&config, printer).with_verify_replay(cli.verify_replay);
    let mut out = stdout.lock();
    analyzer
        .analyze_file(&cli.file, &mut out)
        .with_context(|| format!("Failed to analyze {}", cli.file.display()))?;

    let stats = analyzer.stats();
    info!(
        "Analyzed {} frames, {} transfers",
        stats.frames,
        stats.transfers()
    );
    if cli.stats {
        stats.print_summary();
    }
    if let Some(mismatches) = stats.replay_mismatches.filter(|m| *m > 0) {
        anyhow::bail!("{} frame(s) differ on replay", mismatches);
    }
    Ok(())
}

//! Output formatting for the capture analyzer
//!
//! Text mode prints one line per frame with the URB (if the frame completed one)
//! indented beneath it. JSON mode prints one object per frame.

use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use usbll_engine::{Dissection, Urb};

use crate::error::CaptureError;

/// URB bytes shown by the hex fallback before eliding
const HEX_SUMMARY_BYTES: usize = 32;

/// Output format for the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Frame filter for selective display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PacketFilter {
    #[default]
    All,
    /// Frames that complete a transfer
    Transfers,
    /// Frames with advisories
    Errors,
    /// Frames to or from one device
    Address(u8),
}

impl FromStr for PacketFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "transfers" | "transfer" | "urb" | "urbs" => Ok(Self::Transfers),
            "errors" | "error" | "advisories" => Ok(Self::Errors),
            s if s.starts_with("addr=") => {
                let value = &s["addr=".len()..];
                let address = match value.strip_prefix("0x") {
                    Some(hex) => u8::from_str_radix(hex, 16),
                    None => value.parse::<u8>(),
                }
                .map_err(|e| format!("Invalid device address: {}", e))?;
                if address > 127 {
                    return Err(format!("Device address out of range: {}", address));
                }
                Ok(Self::Address(address))
            }
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

impl PacketFilter {
    pub fn matches(&self, dissection: &Dissection) -> bool {
        match self {
            PacketFilter::All => true,
            PacketFilter::Transfers => dissection.urb.is_some(),
            PacketFilter::Errors => dissection.has_advisories(),
            PacketFilter::Address(address) => dissection.addresses.is_some_and(|pair| {
                pair.source.device() == Some(*address)
                    || pair.destination.device() == Some(*address)
            }),
        }
    }
}

/// A frame as written in JSON mode
#[derive(Debug, Serialize)]
struct JsonFrame<'a> {
    #[serde(flatten)]
    dissection: &'a Dissection,
    pid_name: Option<String>,
    advisory_text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

/// Output printer
#[derive(Debug, Clone, Default)]
pub struct Printer {
    format: OutputFormat,
    filter: PacketFilter,
    hex: bool,
    color: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, filter: PacketFilter) -> Self {
        Self {
            format,
            filter,
            hex: false,
            color: false,
        }
    }

    /// Add the raw frame bytes to every frame
    pub fn with_hex(mut self, hex: bool) -> Self {
        self.hex = hex;
        self
    }

    /// Highlight advisories and transfers with terminal colors (text mode only)
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write one frame, unless filtered out
    pub fn print<W: Write>(
        &self,
        out: &mut W,
        dissection: &Dissection,
        raw: &[u8],
    ) -> Result<(), CaptureError> {
        if let Some(rendered) = self.render(dissection, raw)? {
            writeln!(out, "{}", rendered)?;
        }
        Ok(())
    }

    /// Render one frame, `None` when the filter rejects it
    pub fn render(&self, dissection: &Dissection, raw: &[u8]) -> Result<Option<String>, CaptureError> {
        if !self.filter.matches(dissection) {
            return Ok(None);
        }
        let rendered = match self.format {
            OutputFormat::Text => self.render_text(dissection, raw),
            OutputFormat::Json => {
                let frame = JsonFrame {
                    dissection,
                    pid_name: dissection.packet_id.map(|id| id.name()),
                    advisory_text: dissection.advisories.iter().map(|a| a.to_string()).collect(),
                    raw: self.hex.then(|| hex_string(raw)),
                };
                serde_json::to_string(&frame)?
            }
        };
        Ok(Some(rendered))
    }

    fn render_text(&self, d: &Dissection, raw: &[u8]) -> String {
        let (source, destination) = match d.addresses {
            Some(pair) => (pair.source.to_string(), pair.destination.to_string()),
            None => ("?".to_string(), "?".to_string()),
        };
        let pid = d.packet_id.map(|id| id.name()).unwrap_or_else(|| "-".to_string());

        let mut line = format!(
            "{:>6}  {:>7} -> {:<7}  {:<8} {}",
            d.frame, source, destination, pid, d.state
        );
        for field in d.fields.iter().filter(|f| f.name != "pid") {
            let _ = write!(line, " {}", field.summary());
        }

        for advisory in &d.advisories {
            let text = format!("! {}", advisory);
            if self.color {
                let _ = write!(line, "\n        {}", text.red());
            } else {
                let _ = write!(line, "\n        {}", text);
            }
        }

        if let Some(urb) = &d.urb {
            let text = format!("URB {}", urb_text(urb, d.urb_summary.as_deref()));
            if self.color {
                let _ = write!(line, "\n        {}", text.green());
            } else {
                let _ = write!(line, "\n        {}", text);
            }
        }

        if self.hex {
            let _ = write!(line, "\n        raw: {}", hex_spaced(raw));
        }
        line
    }
}

/// One-line URB rendering; without a dissector summary the payload is shown as hex
pub fn urb_text(urb: &Urb, summary: Option<&str>) -> String {
    let head = format!(
        "{} {} {}.{} {} bytes {}",
        urb.kind,
        urb.direction,
        urb.device,
        urb.endpoint,
        urb.data.len(),
        urb.status
    );
    match summary {
        Some(summary) => format!("{}: {}", head, summary),
        None if urb.payload().is_empty() => head,
        None => format!("{}: {}", head, hex_summary(urb.payload())),
    }
}

/// Hex of the first bytes of a payload
pub fn hex_summary(data: &[u8]) -> String {
    if data.len() > HEX_SUMMARY_BYTES {
        format!("{} ...", hex_spaced(&data[..HEX_SUMMARY_BYTES]))
    } else {
        hex_spaced(data)
    }
}

fn hex_spaced(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

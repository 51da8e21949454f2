// USB 2.0 link-layer capture analyzer - shared library
// Capture reading, configuration and next-layer dissectors on top of usbll-engine

pub mod config;
pub mod error;
pub mod pcap_analyzer;

pub use config::{Config, EndpointSeed};
pub use error::CaptureError;
pub use pcap_analyzer::{CaptureAnalyzer, OutputFormat, PacketFilter, Printer, Statistics};

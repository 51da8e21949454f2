//! Capture analyzer for link-layer USB 2.0 captures
//!
//! Reads pcap and pcapng files holding raw bus packets (link types 288 and 293-295,
//! as written by hardware sniffers), feeds every packet through a
//! [`usbll_engine::Session`] and prints the result.
//!
//! # Example
//!
//! ```ignore
//! use usbll::{CaptureAnalyzer, Config, OutputFormat, PacketFilter, Printer};
//!
//! let config = Config::default();
//! let printer = Printer::new(OutputFormat::Text, PacketFilter::All);
//! let mut analyzer = CaptureAnalyzer::new(&config, printer);
//! analyzer.analyze_file("capture.pcapng".as_ref(), &mut std::io::stdout())?;
//! ```

mod descriptors;
mod linktype;
mod printer;
mod requests;

pub use descriptors::{parse_configuration, Configuration, ConfigurationLearner, ConfiguredEndpoint};
pub use linktype::{link_speed, LinkSpeed};
pub use printer::{hex_summary, urb_text, OutputFormat, PacketFilter, Printer};
pub use requests::{decode_usb_string, describe_request, StandardRequests};

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use pcap_parser::pcapng::Block;
use pcap_parser::{create_reader, Linktype, PcapBlockOwned, PcapError};
use serde::Serialize;
use tracing::{debug, warn};

use usbll_engine::{
    Advisory, Dissection, EndpointDescriptors, EndpointType, Frame, PacketId, Pass, Pid, Session,
    Speed, UrbDissectors,
};

use crate::config::Config;
use crate::error::CaptureError;

/// Frame and transfer counts for `--stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub frames: u64,
    /// Packets on interfaces with a non-USB link type
    pub skipped: u64,
    pub tokens: u64,
    pub sofs: u64,
    pub data: u64,
    pub handshakes: u64,
    pub splits: u64,
    pub extended: u64,
    pub invalid_sequences: u64,
    pub crc_failures: u64,
    pub other_advisories: u64,
    pub control_transfers: u64,
    pub isochronous_transfers: u64,
    pub bulk_transfers: u64,
    pub interrupt_transfers: u64,
    /// Frames whose replay differed from the first pass, when verified
    pub replay_mismatches: Option<u64>,
    pub truncated: bool,
}

impl Statistics {
    pub fn record(&mut self, d: &Dissection) {
        self.frames += 1;
        if d.packet_id == Some(PacketId::Pid(Pid::Sof)) {
            self.sofs += 1;
        } else if d.state.is_token() {
            self.tokens += 1;
        } else if d.state.is_data() {
            self.data += 1;
        } else if d.state.is_handshake() {
            self.handshakes += 1;
        }
        if d.state.is_split_packet() {
            self.splits += 1;
        }
        if d.state.is_lpm() {
            self.extended += 1;
        }

        for advisory in &d.advisories {
            match advisory {
                Advisory::InvalidSequence { .. } => self.invalid_sequences += 1,
                a if a.is_checksum() => self.crc_failures += 1,
                _ => self.other_advisories += 1,
            }
        }

        if let Some(urb) = &d.urb {
            match urb.kind {
                EndpointType::Control => self.control_transfers += 1,
                EndpointType::Isochronous => self.isochronous_transfers += 1,
                EndpointType::Bulk => self.bulk_transfers += 1,
                EndpointType::Interrupt | EndpointType::Unknown => self.interrupt_transfers += 1,
            }
        }
    }

    pub fn transfers(&self) -> u64 {
        self.control_transfers
            + self.isochronous_transfers
            + self.bulk_transfers
            + self.interrupt_transfers
    }

    pub fn print_summary(&self) {
        eprintln!("\nCapture statistics:");
        eprintln!("  Frames:             {}", self.frames);
        eprintln!("  Skipped (non-USB):  {}", self.skipped);
        eprintln!("  Tokens:             {}", self.tokens);
        eprintln!("  SOF:                {}", self.sofs);
        eprintln!("  Data:               {}", self.data);
        eprintln!("  Handshakes:         {}", self.handshakes);
        eprintln!("  SPLIT:              {}", self.splits);
        eprintln!("  EXT/LPM:            {}", self.extended);
        eprintln!("  Invalid sequences:  {}", self.invalid_sequences);
        eprintln!("  CRC failures:       {}", self.crc_failures);
        eprintln!("  Other advisories:   {}", self.other_advisories);
        eprintln!("  Transfers:          {}", self.transfers());
        eprintln!("    Control:          {}", self.control_transfers);
        eprintln!("    Isochronous:      {}", self.isochronous_transfers);
        eprintln!("    Bulk:             {}", self.bulk_transfers);
        eprintln!("    Interrupt:        {}", self.interrupt_transfers);
        if let Some(mismatches) = self.replay_mismatches {
            eprintln!("  Replay mismatches:  {}", mismatches);
        }
        if self.truncated {
            eprintln!("  (capture file truncated)");
        }
    }
}

/// Link type of one capture interface
#[derive(Debug, Clone, Copy)]
struct Interface {
    link: LinkSpeed,
    warned: bool,
}

impl Interface {
    fn new(linktype: Linktype) -> Self {
        Self {
            link: link_speed(linktype),
            warned: false,
        }
    }
}

/// What a pcap block means to the analyzer, copied out of the reader's buffer
enum BlockEvent {
    Section,
    Interface(Linktype),
    LegacyHeader(Linktype),
    Packet { interface: usize, data: Vec<u8> },
    Other,
}

fn block_event(block: &PcapBlockOwned<'_>) -> BlockEvent {
    match block {
        PcapBlockOwned::LegacyHeader(header) => BlockEvent::LegacyHeader(header.network),
        PcapBlockOwned::Legacy(lp) => BlockEvent::Packet {
            interface: 0,
            data: captured(lp.data, lp.caplen),
        },
        PcapBlockOwned::NG(Block::SectionHeader(_)) => BlockEvent::Section,
        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => BlockEvent::Interface(idb.linktype),
        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => BlockEvent::Packet {
            interface: epb.if_id as usize,
            data: captured(epb.data, epb.caplen),
        },
        PcapBlockOwned::NG(Block::SimplePacket(spb)) => BlockEvent::Packet {
            interface: 0,
            data: captured(spb.data, spb.origlen),
        },
        _ => BlockEvent::Other,
    }
}

/// Packet bytes without block padding
fn captured(data: &[u8], caplen: u32) -> Vec<u8> {
    data[..data.len().min(caplen as usize)].to_vec()
}

/// A frame kept for `--verify-replay`
struct RetainedFrame {
    speed: Option<Speed>,
    data: Vec<u8>,
    dissection: Dissection,
}

/// Reads a capture and drives one engine session over it
pub struct CaptureAnalyzer {
    session: Session,
    descriptors: Arc<RwLock<EndpointDescriptors>>,
    printer: Printer,
    stats: Statistics,
    verify_replay: bool,
    retained: Vec<RetainedFrame>,
    interfaces: Vec<Interface>,
    next_frame: u32,
}

impl CaptureAnalyzer {
    /// Analyzer with the configured endpoints seeded and the shipped dissectors registered
    pub fn new(config: &Config, printer: Printer) -> Self {
        let descriptors = Arc::new(RwLock::new(config.descriptor_store()));
        let dissectors = UrbDissectors::new()
            .with(
                EndpointType::Control,
                Box::new(ConfigurationLearner::new(Arc::clone(&descriptors))),
            )
            .with(EndpointType::Control, Box::new(StandardRequests));
        let session = Session::new(config.session_config())
            .with_descriptors(Arc::clone(&descriptors))
            .with_dissectors(dissectors);

        Self {
            session,
            descriptors,
            printer,
            stats: Statistics::default(),
            verify_replay: false,
            retained: Vec::new(),
            interfaces: Vec::new(),
            next_frame: 1,
        }
    }

    /// Keep every frame and re-dissect them all after reading
    pub fn with_verify_replay(mut self, verify: bool) -> Self {
        self.verify_replay = verify;
        self
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Descriptor store shared with the session
    pub fn descriptors(&self) -> Arc<RwLock<EndpointDescriptors>> {
        Arc::clone(&self.descriptors)
    }

    /// Analyze a pcap or pcapng file
    pub fn analyze_file<W: Write>(&mut self, path: &Path, out: &mut W) -> Result<(), CaptureError> {
        let file = File::open(path)?;
        self.analyze_reader(file, out)
    }

    /// Analyze a capture from any reader, printing frames to `out`
    pub fn analyze_reader<R: Read + Send, W: Write>(
        &mut self,
        input: R,
        out: &mut W,
    ) -> Result<(), CaptureError> {
        let mut reader =
            create_reader(65536, input).map_err(|e| CaptureError::Pcap(format!("{:?}", e)))?;
        let mut block_count = 0u64;
        let mut last_incomplete_index = None;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    // Copy out before consume: the block borrows the reader's buffer
                    let event = block_event(&block);
                    reader.consume(offset);
                    block_count += 1;
                    self.handle_event(event, out)?;
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::UnexpectedEof) => {
                    warn!("Capture ends in the middle of a block (file truncated)");
                    self.stats.truncated = true;
                    break;
                }
                Err(PcapError::Incomplete(_)) => {
                    // No progress since the last refill: the file ends mid-block
                    if last_incomplete_index == Some(block_count) {
                        warn!("Could not read complete data block (file may be truncated)");
                        self.stats.truncated = true;
                        break;
                    }
                    last_incomplete_index = Some(block_count);
                    reader
                        .refill()
                        .map_err(|e| CaptureError::Pcap(format!("Refill error: {:?}", e)))?;
                }
                Err(e) => return Err(CaptureError::Pcap(format!("{:?}", e))),
            }
        }
        out.flush()?;

        if self.verify_replay {
            let mismatches = self.verify_replay()?;
            self.stats.replay_mismatches = Some(mismatches.len() as u64);
        }
        Ok(())
    }

    fn handle_event<W: Write>(&mut self, event: BlockEvent, out: &mut W) -> Result<(), CaptureError> {
        match event {
            BlockEvent::Section => self.interfaces.clear(),
            BlockEvent::Interface(linktype) => {
                debug!("Interface {}: link type {}", self.interfaces.len(), linktype.0);
                self.interfaces.push(Interface::new(linktype));
            }
            BlockEvent::LegacyHeader(linktype) => {
                debug!("pcap link type {}", linktype.0);
                self.interfaces = vec![Interface::new(linktype)];
            }
            BlockEvent::Packet { interface, data } => {
                let number = self.next_frame;
                self.next_frame += 1;
                let link = match self.interfaces.get_mut(interface) {
                    Some(iface) => {
                        let link = iface.link;
                        if let LinkSpeed::Unsupported(linktype) = link {
                            if !iface.warned {
                                warn!(
                                    "Interface {}: link type {} is not link-layer USB 2.0, skipping its packets",
                                    interface, linktype
                                );
                                iface.warned = true;
                            }
                        }
                        link
                    }
                    None => {
                        warn!("Frame {}: packet on undeclared interface {}", number, interface);
                        LinkSpeed::Unsupported(-1)
                    }
                };
                match link {
                    LinkSpeed::Usb(speed) => self.process_frame(number, speed, &data, out)?,
                    LinkSpeed::Unsupported(_) => self.stats.skipped += 1,
                }
            }
            BlockEvent::Other => {}
        }
        Ok(())
    }

    /// Dissect one frame (first pass) and print it
    pub fn process_frame<W: Write>(
        &mut self,
        number: u32,
        speed: Option<Speed>,
        data: &[u8],
        out: &mut W,
    ) -> Result<(), CaptureError> {
        let dissection = self
            .session
            .dissect(&Frame::new(number, speed, data), Pass::First)?;
        self.stats.record(&dissection);
        self.printer.print(out, &dissection, data)?;

        if self.verify_replay {
            self.retained.push(RetainedFrame {
                speed,
                data: data.to_vec(),
                dissection,
            });
        }
        Ok(())
    }

    /// Re-dissect every retained frame and return the numbers of those that changed
    pub fn verify_replay(&mut self) -> Result<Vec<u32>, CaptureError> {
        let mut mismatches = Vec::new();
        // Replay order is free; walk backwards
        for retained in self.retained.iter().rev() {
            let number = retained.dissection.frame;
            let replayed = self
                .session
                .dissect(&Frame::new(number, retained.speed, &retained.data), Pass::Replay)?;
            if replayed != retained.dissection {
                warn!("Frame {}: replay differs from first pass", number);
                mismatches.push(number);
            }
        }
        mismatches.reverse();
        debug!(
            "Replayed {} frames, {} mismatches",
            self.retained.len(),
            mismatches.len()
        );
        Ok(mismatches)
    }
}

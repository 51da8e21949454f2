//! Capture file round trips
//!
//! Builds pcap and pcapng files in memory from synthesised bus packets and runs them
//! through the analyzer the way the binary does.

use std::io::Cursor;

use usbll::{CaptureAnalyzer, Config, OutputFormat, PacketFilter, Printer};
use usbll_engine::builder::Sequence;
use usbll_engine::setup::{request, SetupPacket};
use usbll_engine::{Pid, Speed};

// ── Capture file builders ──────────────────────────────────────────────────

const LINKTYPE_ETHERNET: u32 = 1;
const LINKTYPE_USB_2_0: u32 = 288;
const LINKTYPE_USB_2_0_FULL_SPEED: u32 = 294;
const LINKTYPE_USB_2_0_HIGH_SPEED: u32 = 295;

/// Classic pcap, microsecond timestamps, little-endian
fn legacy_pcap(linktype: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&linktype.to_le_bytes());
    for (i, packet) in packets.iter().enumerate() {
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(i as u32 * 125).to_le_bytes());
        out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        out.extend_from_slice(packet);
    }
    out
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let padded = body.len().div_ceil(4) * 4;
    let total = (12 + padded) as u32;
    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(body);
    out.resize(8 + padded, 0);
    out.extend_from_slice(&total.to_le_bytes());
    out
}

fn section_header() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&(-1i64).to_le_bytes());
    pcapng_block(0x0a0d_0d0a, &body)
}

fn interface_description(linktype: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(linktype as u16).to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&65535u32.to_le_bytes());
    pcapng_block(1, &body)
}

fn enhanced_packet(interface: u32, timestamp: u64, packet: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&interface.to_le_bytes());
    body.extend_from_slice(&((timestamp >> 32) as u32).to_le_bytes());
    body.extend_from_slice(&(timestamp as u32).to_le_bytes());
    body.extend_from_slice(&(packet.len() as u32).to_le_bytes());
    body.extend_from_slice(&(packet.len() as u32).to_le_bytes());
    body.extend_from_slice(packet);
    pcapng_block(6, &body)
}

fn run(config: &Config, filter: PacketFilter, capture: Vec<u8>) -> (CaptureAnalyzer, String) {
    let printer = Printer::new(config.format, filter).with_hex(config.hex);
    let mut analyzer = CaptureAnalyzer::new(config, printer).with_verify_replay(true);
    let mut out = Vec::new();
    analyzer
        .analyze_reader(Cursor::new(capture), &mut out)
        .expect("capture should be readable");
    (analyzer, String::from_utf8(out).expect("output is UTF-8"))
}

// ── Traffic ────────────────────────────────────────────────────────────────

/// Interface 0, interrupt IN 0x81 (8 bytes), bulk OUT 0x02 (64 bytes)
fn configuration_descriptor() -> Vec<u8> {
    let mut data = vec![0x09, 0x02, 0x20, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32];
    data.extend_from_slice(&[0x09, 0x04, 0x00, 0x00, 0x02, 0xff, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0a]);
    data.extend_from_slice(&[0x07, 0x05, 0x02, 0x02, 0x40, 0x00, 0x00]);
    data
}

/// GET_DESCRIPTOR(CONFIGURATION) on device 3, then a 74-byte bulk write to EP2
fn learn_then_bulk() -> Sequence {
    let get_config = SetupPacket::new(0x80, request::GET_DESCRIPTOR, 0x0200, 0, 32);
    Sequence::new()
        .sof(100)
        .setup(3, 0, &get_config)
        .handshake(Pid::Ack)
        .token(Pid::In, 3, 0)
        .data(Pid::Data1, &configuration_descriptor())
        .handshake(Pid::Ack)
        .token(Pid::Out, 3, 0)
        .data(Pid::Data1, &[])
        .handshake(Pid::Ack)
        .sof(101)
        .token(Pid::Out, 3, 2)
        .data(Pid::Data0, &[0x55; 64])
        .handshake(Pid::Ack)
        .token(Pid::Out, 3, 2)
        .data(Pid::Data1, &[0xaa; 10])
        .handshake(Pid::Ack)
}

// ── Legacy pcap ────────────────────────────────────────────────────────────

#[test]
fn learned_configuration_drives_bulk_reassembly() {
    let seq = learn_then_bulk();
    let capture = legacy_pcap(LINKTYPE_USB_2_0_FULL_SPEED, seq.packets());
    let (analyzer, out) = run(&Config::default(), PacketFilter::Transfers, capture);

    let lines: Vec<&str> = out.lines().filter(|l| l.trim_start().starts_with("URB")).collect();
    assert_eq!(lines.len(), 3, "{}", out);
    assert!(lines[0].contains("URB control IN 3.0 32 bytes complete: CONFIGURATION 1"));
    assert!(lines[0].contains("0x02 bulk 64"));
    assert!(lines[1].contains("status"), "{}", lines[1]);
    // 64 + 10: the full first packet kept the transfer open
    assert!(lines[2].contains("URB bulk OUT 3.2 74 bytes complete"), "{}", lines[2]);

    let stats = analyzer.stats();
    assert_eq!(stats.frames, seq.len() as u64);
    assert_eq!(stats.control_transfers, 2);
    assert_eq!(stats.bulk_transfers, 1);
    assert_eq!(stats.replay_mismatches, Some(0));

    let learned = analyzer.descriptors();
    assert_eq!(learned.read().len(), 2);
}

#[test]
fn short_configuration_reply_is_learned_at_status_stage() {
    let get_config = SetupPacket::new(0x80, request::GET_DESCRIPTOR, 0x0200, 0, 255);
    let seq = Sequence::new()
        .setup(3, 0, &get_config)
        .handshake(Pid::Ack)
        .token(Pid::In, 3, 0)
        .data(Pid::Data1, &configuration_descriptor())
        .handshake(Pid::Ack)
        .token(Pid::Out, 3, 0)
        .data(Pid::Data1, &[])
        .handshake(Pid::Ack);
    let capture = legacy_pcap(LINKTYPE_USB_2_0_FULL_SPEED, seq.packets());
    let (analyzer, out) = run(&Config::default(), PacketFilter::Transfers, capture);

    assert!(
        out.contains("URB control IN 3.0 32 bytes complete: CONFIGURATION 1"),
        "{}",
        out
    );
    assert_eq!(analyzer.descriptors().read().len(), 2);
    assert_eq!(analyzer.stats().replay_mismatches, Some(0));
}

#[test]
fn configured_endpoints_seed_the_store() {
    let config = Config::parse(
        r#"
        [[endpoint]]
        address = 3
        endpoint = 0x02
        type = "bulk"
        max_packet_size = 8
        "#,
    )
    .unwrap();
    let seq = Sequence::new()
        .token(Pid::Out, 3, 2)
        .data(Pid::Data0, &[1; 8])
        .handshake(Pid::Ack)
        .token(Pid::Out, 3, 2)
        .data(Pid::Data1, &[2; 3])
        .handshake(Pid::Ack);
    let capture = legacy_pcap(LINKTYPE_USB_2_0_FULL_SPEED, seq.packets());
    let (analyzer, out) = run(&config, PacketFilter::Transfers, capture);

    assert!(out.contains("URB bulk OUT 3.2 11 bytes complete: 01 01 01"), "{}", out);
    assert_eq!(analyzer.stats().bulk_transfers, 1);
}

#[test]
fn unknown_speed_uses_fallback() {
    let config = Config {
        fallback_speed: Speed::High,
        format: OutputFormat::Json,
        ..Config::default()
    };
    let seq = Sequence::new().token(Pid::In, 2, 1).handshake(Pid::Nak);
    let capture = legacy_pcap(LINKTYPE_USB_2_0, seq.packets());
    let (_, out) = run(&config, PacketFilter::All, capture);

    let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
    assert_eq!(first["frame"], 1);
    assert_eq!(first["speed"], "high");
    assert_eq!(first["state"], "In");
}

#[test]
fn truncated_file_is_a_warning() {
    let seq = learn_then_bulk();
    let mut capture = legacy_pcap(LINKTYPE_USB_2_0_FULL_SPEED, seq.packets());
    capture.truncate(capture.len() - 1);
    let (analyzer, _) = run(&Config::default(), PacketFilter::All, capture);

    let stats = analyzer.stats();
    assert!(stats.truncated);
    assert_eq!(stats.frames, seq.len() as u64 - 1);
}

#[test]
fn errors_filter_shows_only_advisories() {
    let mut bad = usbll_engine::builder::token(Pid::Out, 1, 1);
    bad[2] ^= 0x80;
    let packets = vec![
        usbll_engine::builder::sof(5),
        bad,
        usbll_engine::builder::handshake(Pid::Ack),
    ];
    let capture = legacy_pcap(LINKTYPE_USB_2_0_FULL_SPEED, &packets);
    let (analyzer, out) = run(&Config::default(), PacketFilter::Errors, capture);

    assert!(out.contains("! CRC5 mismatch"), "{}", out);
    assert!(!out.contains("SOF"), "{}", out);
    assert_eq!(analyzer.stats().crc_failures, 1);
}

// ── pcapng ─────────────────────────────────────────────────────────────────

#[test]
fn pcapng_skips_non_usb_interfaces() {
    let seq = learn_then_bulk();
    let mut capture = section_header();
    capture.extend(interface_description(LINKTYPE_ETHERNET));
    capture.extend(interface_description(LINKTYPE_USB_2_0_HIGH_SPEED));
    capture.extend(enhanced_packet(0, 0, &[0xff; 42]));
    for (i, packet) in seq.packets().iter().enumerate() {
        capture.extend(enhanced_packet(1, i as u64, packet));
    }
    capture.extend(enhanced_packet(0, 99, &[0xff; 60]));

    let (analyzer, out) = run(&Config::default(), PacketFilter::All, capture);
    let stats = analyzer.stats();
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.frames, seq.len() as u64);
    assert_eq!(stats.bulk_transfers, 1);

    // Ethernet packet took frame number 1
    let first = out.lines().next().unwrap();
    assert!(first.trim_start().starts_with("2 "), "{}", first);
}

#[test]
fn pcapng_hex_output_strips_block_padding() {
    let mut capture = section_header();
    capture.extend(interface_description(LINKTYPE_USB_2_0_FULL_SPEED));
    // 3-byte SOF, padded to 4 in the block
    capture.extend(enhanced_packet(0, 0, &usbll_engine::builder::sof(0x123)));

    let config = Config {
        hex: true,
        ..Config::default()
    };
    let (_, out) = run(&config, PacketFilter::All, capture);
    let raw = out.lines().find(|l| l.contains("raw:")).unwrap();
    assert_eq!(raw.trim(), format!("raw: {}", hex(&usbll_engine::builder::sof(0x123))));
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

//! Packet grammar, LPM and replay of memoised frames.

use usbll_engine::builder::{self, Sequence};
use usbll_engine::pid::wire;
use usbll_engine::setup::{descriptor, request};
use usbll_engine::state::STATE_NAMES;
use usbll_engine::{
    next_state, Advisory, EndpointType, FieldValue, Frame, Pass, PacketId, Pid, Session,
    SetupPacket, Speed, SplitPhase, State, SubPid,
};

fn enumeration_and_split_traffic() -> Sequence {
    let get_descriptor = SetupPacket::new(
        0x80,
        request::GET_DESCRIPTOR,
        u16::from(descriptor::DEVICE) << 8,
        0,
        18,
    );
    let mut response = vec![0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40];
    response.extend_from_slice(&[0x6b, 0x1d, 0x04, 0x01, 0x00, 0x01, 0x01, 0x02, 0x03, 0x01]);

    Sequence::new()
        .sof(1)
        .setup(5, 0, &get_descriptor)
        .handshake(Pid::Ack)
        .token(Pid::In, 5, 0)
        .data(Pid::Data1, &response)
        .handshake(Pid::Ack)
        .token(Pid::Out, 5, 0)
        .data(Pid::Data0, &[])
        .handshake(Pid::Ack)
        .sof(2)
        .split(SplitPhase::Start, 5, 3, false, EndpointType::Bulk)
        .token(Pid::Out, 9, 2)
        .data(Pid::Data0, &[1, 2, 3])
        .handshake(Pid::Ack)
        .split(SplitPhase::Complete, 5, 3, false, EndpointType::Bulk)
        .token(Pid::Out, 9, 2)
        .handshake(Pid::Ack)
        .handshake(Pid::Ack)
        .push(vec![0x00])
}

// ── Grammar ──

#[test]
fn grammar_is_total() {
    for (state, _) in STATE_NAMES {
        for pid in Pid::ALL {
            let next = next_state(*state, pid);
            assert!(STATE_NAMES.iter().any(|(s, _)| *s == next));
        }
    }
}

#[test]
fn pre_outside_split_is_silently_idle() {
    let mut session = Session::default();
    let seq = Sequence::new().sof(1).handshake(Pid::PreErr);
    let out: Vec<_> = seq
        .frames(Some(Speed::Full))
        .map(|f| session.dissect(&f, Pass::First).unwrap())
        .collect();
    assert_eq!(out[1].state, State::Idle);
    assert!(out[1].advisories.is_empty());
}

#[test]
fn lpm_transaction() {
    let mut session = Session::default();
    let seq = Sequence::new()
        .token(Pid::Ext, 2, 0)
        .push(builder::lpm(1, 4, true))
        .handshake(Pid::Ack);
    let out: Vec<_> = seq
        .frames(Some(Speed::High))
        .map(|f| session.dissect(&f, Pass::First).unwrap())
        .collect();

    assert_eq!(out[0].state, State::Ext);
    assert_eq!(out[1].packet_id, Some(PacketId::SubPid(SubPid::Lpm)));
    assert_eq!(out[1].state, State::SubpidLpm);
    assert_eq!(out[2].state, State::SubpidLpmAck);
    assert!(out.iter().all(|d| d.advisories.is_empty()));

    let besl = out[1].fields.iter().find(|f| f.name == "lpm_besl").unwrap();
    assert_eq!(besl.value, FieldValue::Uint(4));
    assert_eq!(besl.text.as_deref(), Some("400 us"));
    let wake = out[1]
        .fields
        .iter()
        .find(|f| f.name == "lpm_remote_wake")
        .unwrap();
    assert_eq!(wake.value, FieldValue::Bool(true));
}

#[test]
fn conflicting_subpid_is_flagged() {
    let mut session = Session::default();
    let ext = builder::token(Pid::Ext, 2, 0);
    let subpid = vec![wire::OUT, 0x00, 0x00];
    session
        .dissect(&Frame::new(1, None, &ext), Pass::First)
        .unwrap();
    let d = session
        .dissect(&Frame::new(2, None, &subpid), Pass::First)
        .unwrap();
    assert_eq!(d.state, State::SubpidNotReusable);
    assert_eq!(d.advisories, vec![Advisory::ConflictingSubPid { octet: wire::OUT }]);
}

#[test]
fn bad_token_crc_is_reported() {
    let mut session = Session::default();
    let token = builder::corrupt_crc(builder::token(Pid::In, 1, 1));
    let d = session
        .dissect(&Frame::new(1, None, &token), Pass::First)
        .unwrap();
    assert_eq!(d.state, State::In);
    assert!(matches!(d.advisories[..], [Advisory::Crc5Mismatch { .. }]));
}

#[test]
fn trailing_bytes_after_handshake() {
    let mut session = Session::default();
    let token = builder::token(Pid::In, 1, 1);
    let nak = vec![wire::NAK, 0xff];
    session
        .dissect(&Frame::new(1, None, &token), Pass::First)
        .unwrap();
    let d = session
        .dissect(&Frame::new(2, None, &nak), Pass::First)
        .unwrap();
    assert_eq!(d.state, State::InNak);
    assert_eq!(d.advisories, vec![Advisory::UndecodedData { length: 1 }]);
}

// ── Replay ──

#[test]
fn replay_matches_first_pass() {
    let seq = enumeration_and_split_traffic();
    let mut session = Session::default();
    let first: Vec<_> = seq
        .frames(Some(Speed::High))
        .map(|f| session.dissect(&f, Pass::First).unwrap())
        .collect();
    assert!(first.iter().any(|d| d.urb.is_some()));

    let analysed = session.frame_count();
    let replayed: Vec<_> = seq
        .frames(Some(Speed::High))
        .map(|f| session.dissect(&f, Pass::Replay).unwrap())
        .collect();
    assert_eq!(first, replayed);
    assert_eq!(session.frame_count(), analysed);
}

#[test]
fn replay_in_any_order() {
    let seq = enumeration_and_split_traffic();
    let mut session = Session::default();
    let frames: Vec<_> = seq.frames(Some(Speed::High)).collect();
    let first: Vec<_> = frames
        .iter()
        .map(|f| session.dissect(f, Pass::First).unwrap())
        .collect();

    for (frame, expected) in frames.iter().zip(&first).rev() {
        assert_eq!(&session.dissect(frame, Pass::Replay).unwrap(), expected);
    }
    let middle = frames.len() / 2;
    assert_eq!(
        session.dissect(&frames[middle], Pass::Replay).unwrap(),
        first[middle]
    );
}

#[test]
fn replay_keeps_invalid_sequence_advisories() {
    let seq = enumeration_and_split_traffic();
    let mut session = Session::default();
    let frames: Vec<_> = seq.frames(None).collect();
    for frame in &frames {
        session.dissect(frame, Pass::First).unwrap();
    }

    // Second ACK in a row has no place in the grammar
    let stray = frames.len() - 2;
    let d = session.dissect(&frames[stray], Pass::Replay).unwrap();
    assert_eq!(d.state, State::Invalid);
    assert!(matches!(
        d.advisories[..],
        [Advisory::InvalidSequence { pid: Pid::Ack, .. }]
    ));

    let last = session.dissect(&frames[stray + 1], Pass::Replay).unwrap();
    assert_eq!(last.advisories, vec![Advisory::MalformedPid { octet: 0x00 }]);
}

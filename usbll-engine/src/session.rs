//! Capture session: per-frame dispatch, shared tables and memoisation
//!
//! A [`Session`] owns everything one capture needs: endpoint records, transaction
//! translator tables, the transaction arena and the per-frame records. Frames are
//! dissected once in capture order with [`Pass::First`]; later passes use
//! [`Pass::Replay`], which reads the memoised records and never touches the shared
//! tables, so its output is identical to the first pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::address::{self, AddressPair};
use crate::endpoint::{EndpointInfo, EndpointTable};
use crate::error::{Advisory, EngineError};
use crate::fields::{
    trailing, DataFields, Field, LpmFields, SofFields, SplitFields, TokenFields, SPLIT_LEN,
    TOKEN_LEN,
};
use crate::pid::{classify, PacketId, Pid, SubPid};
use crate::setup::{SetupPacket, DEVICE_DESCRIPTOR_MPS_OFFSET, SETUP_LEN};
use crate::state::{next_extended_state, next_state, split_state, DataOutcome, SplitPhase, State};
use crate::transaction::{Transaction, TransactionArena, TransactionId};
use crate::transfer::{
    account_chunk, apply_outcome, end_data_stage, FragmentTable, Reassembly, TransferFragment,
};
use crate::tt::TransactionTranslators;
use crate::types::{Direction, EndpointType, Frame, Speed};
use crate::urb::{Urb, UrbDissectors, UrbStatus};
use crate::{DescriptorStore, EndpointDescriptors};

/// Which analysis pass a frame is dissected in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Capture-order pass that updates the session's tables
    First,
    /// Any later pass; read-only
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Speed assumed when the capture does not say
    pub fallback_speed: Speed,
}

/// What the first pass remembers about a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    pub state: State,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub transaction: Option<TransactionId>,
    pub fragment: Option<TransferFragment>,
    pub urb: Option<Urb>,
    pub urb_summary: Option<String>,
}

/// Everything produced for one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dissection {
    pub frame: u32,
    pub packet_id: Option<PacketId>,
    pub state: State,
    pub fields: Vec<Field>,
    pub addresses: Option<AddressPair>,
    pub advisories: Vec<Advisory>,
    pub transaction: Option<TransactionId>,
    pub speed: Option<Speed>,
    pub fragment: Option<TransferFragment>,
    pub urb: Option<Urb>,
    pub urb_summary: Option<String>,
}

impl Dissection {
    pub fn has_advisories(&self) -> bool {
        !self.advisories.is_empty()
    }
}

/// Parsed packet body
#[derive(Debug, Clone, Copy)]
enum Body<'a> {
    Empty,
    Sof,
    Token(TokenFields),
    Split(SplitFields),
    Data(DataFields<'a>),
    Lpm,
}

/// Stateless part of dissecting a frame: depends on the bytes and the previous state only
struct Decoded<'a> {
    packet_id: Option<PacketId>,
    state: State,
    fields: Vec<Field>,
    advisories: Vec<Advisory>,
    body: Body<'a>,
}

fn decode(data: &[u8], previous: State) -> Decoded<'_> {
    let mut fields = Vec::new();
    let mut advisories = Vec::new();

    let Some(&octet) = data.first() else {
        advisories.push(Advisory::Truncated {
            expected: 1,
            actual: 0,
        });
        return Decoded {
            packet_id: None,
            state: State::Invalid,
            fields,
            advisories,
            body: Body::Empty,
        };
    };

    let packet_id = classify(octet, previous);
    fields.push(
        Field::uint("pid", 0, 1, u32::from(octet))
            .with_text(format!("{} (0x{:02x})", packet_id.name(), octet)),
    );

    let (state, body) = match packet_id {
        PacketId::Malformed(octet) => {
            advisories.push(Advisory::MalformedPid { octet });
            (State::Invalid, Body::Empty)
        }
        PacketId::MalformedSubPid(octet) => {
            advisories.push(Advisory::MalformedSubPid { octet });
            (next_extended_state(None), Body::Empty)
        }
        PacketId::SubPid(subpid) => {
            let state = next_extended_state(Some(subpid));
            match subpid {
                SubPid::Lpm => match LpmFields::parse(data) {
                    Ok(lpm) => {
                        fields.extend(lpm.fields());
                        advisories.extend(lpm.crc_advisory());
                        advisories.extend(trailing(data, TOKEN_LEN));
                        (state, Body::Lpm)
                    }
                    Err(advisory) => {
                        advisories.push(advisory);
                        (state, Body::Empty)
                    }
                },
                SubPid::NotReusable(_) => {
                    advisories.push(Advisory::ConflictingSubPid { octet });
                    (state, Body::Empty)
                }
                SubPid::Reserved(_) => {
                    advisories.push(Advisory::ReservedSubPid { octet });
                    (state, Body::Empty)
                }
            }
        }
        PacketId::Pid(pid) => decode_pid(data, pid, previous, &mut fields, &mut advisories),
    };

    if let Body::Data(payload) = body {
        if state.is_setup_data() && payload.payload.len() != SETUP_LEN {
            advisories.push(Advisory::MalformedSetup {
                length: payload.payload.len(),
            });
        }
    }

    Decoded {
        packet_id: Some(packet_id),
        state,
        fields,
        advisories,
        body,
    }
}

fn decode_pid<'a>(
    data: &'a [u8],
    pid: Pid,
    previous: State,
    fields: &mut Vec<Field>,
    advisories: &mut Vec<Advisory>,
) -> (State, Body<'a>) {
    let sequence = |advisories: &mut Vec<Advisory>| {
        let state = next_state(previous, pid);
        if state == State::Invalid {
            advisories.push(Advisory::InvalidSequence { previous, pid });
        }
        state
    };

    match pid {
        Pid::Sof => match SofFields::parse(data) {
            Ok(sof) => {
                fields.extend(sof.fields());
                advisories.extend(sof.crc_advisory());
                advisories.extend(trailing(data, TOKEN_LEN));
                (State::Idle, Body::Sof)
            }
            Err(advisory) => {
                advisories.push(advisory);
                (State::Idle, Body::Empty)
            }
        },
        Pid::Split => match SplitFields::parse(data) {
            Ok(split) => {
                fields.extend(split.fields());
                advisories.extend(split.crc_advisory());
                advisories.extend(trailing(data, SPLIT_LEN));
                (split_state(split.phase, split.kind), Body::Split(split))
            }
            Err(advisory) => {
                advisories.push(advisory);
                (State::Invalid, Body::Empty)
            }
        },
        Pid::Out | Pid::In | Pid::Setup | Pid::Ping | Pid::Ext => match TokenFields::parse(data) {
            Ok(token) => {
                fields.extend(token.fields());
                advisories.extend(token.crc_advisory());
                advisories.extend(trailing(data, TOKEN_LEN));
                (sequence(advisories), Body::Token(token))
            }
            Err(advisory) => {
                advisories.push(advisory);
                (State::Invalid, Body::Empty)
            }
        },
        Pid::Data0 | Pid::Data1 | Pid::Data2 | Pid::Mdata => match DataFields::parse(data) {
            Ok(payload) => {
                fields.extend(payload.fields());
                advisories.extend(payload.crc_advisory());
                (sequence(advisories), Body::Data(payload))
            }
            Err(advisory) => {
                advisories.push(advisory);
                (State::Invalid, Body::Empty)
            }
        },
        Pid::Ack | Pid::Nak | Pid::Stall | Pid::Nyet | Pid::PreErr => {
            advisories.extend(trailing(data, 1));
            (sequence(advisories), Body::Empty)
        }
    }
}

/// Link-layer analysis state of one capture
pub struct Session {
    config: SessionConfig,
    descriptors: Box<dyn DescriptorStore>,
    reassembly: Box<dyn Reassembly>,
    dissectors: UrbDissectors,
    endpoints: EndpointTable,
    translators: TransactionTranslators,
    transactions: TransactionArena,
    frames: HashMap<u32, FrameRecord>,
    last_frame: Option<u32>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            descriptors: Box::new(EndpointDescriptors::default()),
            reassembly: Box::new(FragmentTable::new()),
            dissectors: UrbDissectors::new(),
            endpoints: EndpointTable::new(),
            translators: TransactionTranslators::new(),
            transactions: TransactionArena::default(),
            frames: HashMap::new(),
            last_frame: None,
        }
    }

    pub fn with_descriptors(mut self, store: impl DescriptorStore + 'static) -> Self {
        self.descriptors = Box::new(store);
        self
    }

    pub fn with_reassembly(mut self, reassembly: impl Reassembly + 'static) -> Self {
        self.reassembly = Box::new(reassembly);
        self
    }

    pub fn with_dissectors(mut self, dissectors: UrbDissectors) -> Self {
        self.dissectors = dissectors;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Dissect one frame.
    ///
    /// First-pass frames must come in capture order with strictly increasing numbers
    /// starting at 1. Replay requires the frame to have been through a first pass.
    pub fn dissect(&mut self, frame: &Frame<'_>, pass: Pass) -> Result<Dissection, EngineError> {
        match pass {
            Pass::First => self.first_pass(frame),
            Pass::Replay => self.replay(frame),
        }
    }

    pub fn record(&self, frame: u32) -> Option<&FrameRecord> {
        self.frames.get(&frame)
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn endpoint(&self, address: u8, endpoint: u8, direction: Direction) -> Option<&EndpointInfo> {
        self.endpoints.get(address, endpoint, direction)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.last_frame
    }

    /// Drop all tables and records so the session can take a new capture
    pub fn reset(&mut self) {
        debug!("Resetting session ({} frames)", self.frames.len());
        self.endpoints.clear();
        self.translators.clear();
        self.transactions.clear();
        self.frames.clear();
        self.reassembly.clear();
        self.last_frame = None;
    }

    fn first_pass(&mut self, frame: &Frame<'_>) -> Result<Dissection, EngineError> {
        if frame.number == 0 {
            return Err(EngineError::ZeroFrameNumber);
        }
        if let Some(last) = self.last_frame {
            if frame.number <= last {
                return Err(EngineError::OutOfOrder {
                    frame: frame.number,
                    last,
                });
            }
        }

        let (previous_state, previous_transaction) =
            match self.last_frame.and_then(|n| self.frames.get(&n)) {
                Some(record) => (record.state, record.transaction),
                None => (State::Idle, None),
            };

        let decoded = decode(frame.data, previous_state);
        trace!(
            "Frame {}: {} -> {}",
            frame.number,
            previous_state,
            decoded.state
        );

        let mut record = FrameRecord {
            state: decoded.state,
            previous: self.last_frame,
            next: None,
            transaction: None,
            fragment: None,
            urb: None,
            urb_summary: None,
        };
        record.transaction =
            self.assign_transaction(frame, &decoded, previous_state, previous_transaction);
        self.track(frame.number, &decoded, &mut record);

        if let Some(previous) = self.last_frame.and_then(|n| self.frames.get_mut(&n)) {
            previous.next = Some(frame.number);
        }
        self.last_frame = Some(frame.number);

        let dissection = self.assemble(frame.number, decoded, &record);
        self.frames.insert(frame.number, record);
        Ok(dissection)
    }

    fn replay(&self, frame: &Frame<'_>) -> Result<Dissection, EngineError> {
        let record = self
            .frames
            .get(&frame.number)
            .ok_or(EngineError::FrameNotAnalyzed {
                frame: frame.number,
            })?;
        let previous_state = record
            .previous
            .and_then(|n| self.frames.get(&n))
            .map_or(State::Idle, |r| r.state);
        let decoded = decode(frame.data, previous_state);
        Ok(self.assemble(frame.number, decoded, record))
    }

    fn assemble(&self, number: u32, decoded: Decoded<'_>, record: &FrameRecord) -> Dissection {
        Dissection {
            frame: number,
            packet_id: decoded.packet_id,
            state: record.state,
            fields: decoded.fields,
            addresses: address::derive(record.state, record.transaction, &self.transactions),
            advisories: decoded.advisories,
            transaction: record.transaction,
            speed: record
                .transaction
                .and_then(|id| self.transactions.get(id))
                .map(|t| t.speed),
            fragment: record.fragment,
            urb: record.urb.clone(),
            urb_summary: record.urb_summary.clone(),
        }
    }

    /// Transaction a frame belongs to: tokens and SPLITs open one, data and
    /// handshakes join the previous packet's
    fn assign_transaction(
        &mut self,
        frame: &Frame<'_>,
        decoded: &Decoded<'_>,
        previous_state: State,
        previous_transaction: Option<TransactionId>,
    ) -> Option<TransactionId> {
        let state = decoded.state;
        match (&decoded.body, decoded.packet_id) {
            (Body::Split(split), _) => Some(self.open_split(frame.number, split)),
            (Body::Token(token), Some(PacketId::Pid(pid))) => {
                let mut transaction = Transaction::new(
                    frame.number,
                    pid,
                    token.address,
                    token.endpoint,
                    frame.speed.unwrap_or(self.config.fallback_speed),
                );
                let split = previous_transaction
                    .filter(|_| previous_state.is_split_packet())
                    .and_then(|id| self.transactions.get(id).map(|t| (id, t)));
                if let (Some((split_id, split)), Some(phase)) = (split, state.split_phase()) {
                    match phase {
                        SplitPhase::Start => {
                            transaction.speed = split.speed;
                            transaction.split_start = Some(split_id);
                        }
                        // The start split carries the authoritative speed
                        SplitPhase::Complete => {
                            transaction.speed = split
                                .split_start
                                .and_then(|id| self.transactions.get(id))
                                .map_or(split.speed, |start| start.speed);
                            transaction.split_start = split.split_start;
                            transaction.split_complete = Some(split_id);
                        }
                    }
                }
                Some(self.transactions.push(transaction))
            }
            (Body::Sof, _) => None,
            _ if state == State::Idle || !state.is_valid() => None,
            _ => previous_transaction,
        }
    }

    fn open_split(&mut self, number: u32, split: &SplitFields) -> TransactionId {
        let mut transaction =
            Transaction::new(number, Pid::Split, split.hub, split.port, split.speed());
        match split.phase {
            SplitPhase::Start => {
                let id = self.transactions.push(transaction);
                self.translators.store(split.hub, split.port, split.kind, id);
                id
            }
            SplitPhase::Complete => {
                let start = match self.translators.restore(split.hub, split.port, split.kind) {
                    Some(start) => start,
                    None => {
                        debug!(
                            "Frame {}: complete split on {}:{} without start split",
                            number, split.hub, split.port
                        );
                        self.transactions.push(Transaction::new(
                            number,
                            Pid::Split,
                            split.hub,
                            split.port,
                            split.speed(),
                        ))
                    }
                };
                transaction.split_start = Some(start);
                let id = self.transactions.push(transaction);
                if let Some(start) = self.transactions.get_mut(start) {
                    start.split_complete = Some(id);
                }
                id
            }
        }
    }

    /// Endpoint and transfer bookkeeping for data and handshakes
    fn track(&mut self, number: u32, decoded: &Decoded<'_>, record: &mut FrameRecord) {
        let Some(transaction) = record
            .transaction
            .and_then(|id| self.transactions.get(id))
            .filter(|t| !t.is_split())
            .cloned()
        else {
            return;
        };
        let state = record.state;

        match decoded.body {
            Body::Data(data) if !data.crc_ok => {
                debug!("Frame {}: bad CRC16, excluded from reassembly", number);
            }
            Body::Data(data) if state.is_setup_data() => {
                if let Some(setup) = SetupPacket::parse(data.payload) {
                    if let Some(fragment) = self.handle_setup(number, &transaction, setup) {
                        self.feed(number, &transaction, fragment, data.payload, Some(setup), record);
                    }
                }
            }
            Body::Data(data) => {
                let (Some(direction), Some(PacketId::Pid(pid))) =
                    (state.data_direction(), decoded.packet_id)
                else {
                    return;
                };
                self.handle_data(number, &transaction, state, pid, direction, data, record);
            }
            Body::Empty => {
                if let Some((direction, outcome)) = state.data_outcome() {
                    self.handle_handshake(number, &transaction, direction, outcome, record);
                }
            }
            Body::Token(_) => {
                let direction = match transaction.pid {
                    Pid::In => Direction::In,
                    Pid::Out | Pid::Ping => Direction::Out,
                    _ => return,
                };
                self.handle_status_token(number, &transaction, direction, record);
            }
            _ => {}
        }
    }

    /// A control token running against the open data stage starts the status stage
    fn handle_status_token(
        &mut self,
        number: u32,
        transaction: &Transaction,
        direction: Direction,
        record: &mut FrameRecord,
    ) {
        let (address, endpoint) = (transaction.address, transaction.endpoint);
        let stage = direction.opposite();
        let open = self
            .endpoints
            .get(address, endpoint, stage)
            .is_some_and(|info| info.kind == EndpointType::Control && info.in_transfer());
        if !open {
            return;
        }

        let store: &dyn DescriptorStore = &*self.descriptors;
        let info = self.endpoints.get_mut(address, endpoint, stage, store);
        let setup = info.setup;
        if let Some(fragment) = end_data_stage(info, number, stage) {
            debug!(
                "Frame {}: status stage on {}.{} closes the {} data stage at {} bytes",
                number, address, endpoint, stage, fragment.offset
            );
            self.feed(number, transaction, fragment, &[], setup, record);
        }
    }

    fn handle_setup(
        &mut self,
        number: u32,
        transaction: &Transaction,
        setup: SetupPacket,
    ) -> Option<TransferFragment> {
        let (address, endpoint) = (transaction.address, transaction.endpoint);
        let store: &dyn DescriptorStore = &*self.descriptors;

        if let Some(new_address) = setup.set_address().filter(|a| *a >= 1) {
            let max_packet_size0 = self
                .endpoints
                .get(address, 0, Direction::Out)
                .map_or(0, |e| e.max_packet_size);
            debug!(
                "Frame {}: SET_ADDRESS {}, resetting its endpoints (max packet size 0 = {})",
                number, new_address, max_packet_size0
            );
            self.endpoints.reset_address(new_address, max_packet_size0);
        }

        for direction in [Direction::Out, Direction::In] {
            let info = self.endpoints.get_mut(address, endpoint, direction, store);
            info.reset_transfer();
            if info.kind == EndpointType::Unknown {
                info.kind = EndpointType::Control;
            }
            info.setup = Some(setup);
        }

        let length = u32::from(setup.length());
        let setup_len = SETUP_LEN as u32;
        match setup.direction() {
            Direction::In if length > 0 => {
                let info = self.endpoints.get_mut(address, endpoint, Direction::In, store);
                info.requested_transfer_length = length;
                if setup.is_get_device_descriptor() {
                    info.probe_max_packet_size = true;
                }
                None
            }
            Direction::Out if length > 0 => {
                let info = self.endpoints.get_mut(address, endpoint, Direction::Out, store);
                info.active_transfer_key = number;
                info.transfer_offset = setup_len;
                info.requested_transfer_length = setup_len + length;
                Some(TransferFragment {
                    key: number,
                    offset: 0,
                    length: setup_len,
                    kind: EndpointType::Control,
                    direction: Direction::Out,
                    more: true,
                    status: UrbStatus::Complete,
                })
            }
            // No data stage: the request alone is the transfer
            _ => Some(TransferFragment {
                key: number,
                offset: 0,
                length: setup_len,
                kind: EndpointType::Control,
                direction: Direction::Out,
                more: false,
                status: UrbStatus::Complete,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_data(
        &mut self,
        number: u32,
        transaction: &Transaction,
        state: State,
        pid: Pid,
        direction: Direction,
        data: DataFields<'_>,
        record: &mut FrameRecord,
    ) {
        let (address, endpoint) = (transaction.address, transaction.endpoint);
        let store: &dyn DescriptorStore = &*self.descriptors;
        let info = self.endpoints.get_mut(address, endpoint, direction, store);
        let length = data.payload.len() as u32;

        // Must precede accounting: this chunk is judged against the learned size
        let mut learned = None;
        if info.probe_max_packet_size && direction == Direction::In {
            let offset = match info.last_chunk {
                Some(last) if last.pid == pid => last.offset,
                _ => info.transfer_offset,
            };
            let at = DEVICE_DESCRIPTOR_MPS_OFFSET as u32;
            if offset <= at && at < offset + length {
                let max_packet_size = u16::from(data.payload[(at - offset) as usize]);
                info.probe_max_packet_size = false;
                info.max_packet_size = max_packet_size;
                learned = Some(max_packet_size);
            }
        }

        let fragment = account_chunk(
            info,
            number,
            pid,
            direction,
            length,
            state.is_isochronous_data(),
        );
        let setup = info.setup;

        if let Some(max_packet_size) = learned {
            debug!(
                "Frame {}: endpoint {}.{} max packet size {}",
                number, address, endpoint, max_packet_size
            );
            self.endpoints
                .get_mut(address, endpoint, Direction::Out, store)
                .max_packet_size = max_packet_size;
        }

        self.feed(number, transaction, fragment, data.payload, setup, record);
    }

    fn handle_handshake(
        &mut self,
        number: u32,
        transaction: &Transaction,
        direction: Direction,
        outcome: DataOutcome,
        record: &mut FrameRecord,
    ) {
        let store: &dyn DescriptorStore = &*self.descriptors;
        let info = self.endpoints.get_mut(
            transaction.address,
            transaction.endpoint,
            direction,
            store,
        );
        let setup = info.setup;
        if let Some(fragment) = apply_outcome(info, number, direction, outcome) {
            self.feed(number, transaction, fragment, &[], setup, record);
        }
    }

    /// Hand a fragment to reassembly and build the URB once the transfer completes
    fn feed(
        &mut self,
        number: u32,
        transaction: &Transaction,
        fragment: TransferFragment,
        bytes: &[u8],
        setup: Option<SetupPacket>,
        record: &mut FrameRecord,
    ) {
        record.fragment = Some(fragment);
        let Some(data) = self.reassembly.add(&fragment, bytes) else {
            return;
        };

        let urb = Urb {
            transfer_key: fragment.key,
            completed_in: number,
            speed: transaction.speed,
            kind: fragment.kind,
            direction: fragment.direction,
            device: transaction.address,
            endpoint: transaction.endpoint,
            setup: setup.filter(|_| fragment.kind == EndpointType::Control),
            data,
            status: fragment.status,
        };
        debug!(
            "Frame {}: {} {:?} transfer {} on {}.{} complete ({} bytes, {})",
            number,
            urb.kind,
            urb.direction,
            urb.transfer_key,
            urb.device,
            urb.endpoint,
            urb.data.len(),
            urb.status
        );
        record.urb_summary = self.dissectors.dispatch(&urb);
        record.urb = Some(urb);
    }
}

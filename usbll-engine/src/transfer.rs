//! Transfer reassembly
//!
//! Every DATA packet that passes its CRC becomes a [`TransferFragment`]: the key of
//! the transfer it belongs to (frame number of the packet that started it), its byte
//! offset, and whether more data is expected. Handshakes that end a transfer early
//! produce an empty final fragment that only fixes the transfer's length.
//!
//! The fragments feed a [`Reassembly`] facility that hands back the contiguous
//! buffer once a transfer is complete.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, trace};

use crate::endpoint::{EndpointInfo, LastChunk};
use crate::pid::Pid;
use crate::state::DataOutcome;
use crate::types::{Direction, EndpointType};
use crate::urb::UrbStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferFragment {
    /// Frame number of the first packet of the transfer
    pub key: u32,
    pub offset: u32,
    pub length: u32,
    #[serde(rename = "type")]
    pub kind: EndpointType,
    pub direction: Direction,
    /// More fragments are expected
    pub more: bool,
    /// How the transfer ends, meaningful when `more` is false
    pub status: UrbStatus,
}

impl TransferFragment {
    pub fn end(&self) -> u32 {
        self.offset + self.length
    }

    /// Empty fragment produced by a handshake that ends the transfer
    pub fn is_terminator(&self) -> bool {
        self.length == 0 && !self.more && self.status != UrbStatus::Complete
    }
}

/// Generic reassembly facility: collects fragments and returns the transfer's
/// bytes once the final fragment makes it complete
pub trait Reassembly {
    fn add(&mut self, fragment: &TransferFragment, data: &[u8]) -> Option<Vec<u8>>;

    /// Forget everything (new capture)
    fn clear(&mut self);
}

/// Completed transfers remembered for late copies of their chunks
pub const RETAINED_COMPLETIONS: usize = 256;
/// Open transfers kept before the oldest is given up
pub const RETAINED_PENDING: usize = 1024;

#[derive(Debug, Default)]
struct PendingTransfer {
    fragments: BTreeMap<u32, Vec<u8>>,
    total: Option<u32>,
}

impl PendingTransfer {
    /// Contiguous bytes from offset 0, if they reach `total`
    fn assemble(&self, total: u32) -> Option<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::with_capacity(total as usize);
        for (&offset, bytes) in &self.fragments {
            let offset = offset as usize;
            if offset > buffer.len() {
                break;
            }
            let end = offset + bytes.len();
            if end > buffer.len() {
                buffer.resize(end, 0);
            }
            buffer[offset..end].copy_from_slice(bytes);
        }
        if buffer.len() < total as usize {
            return None;
        }
        buffer.truncate(total as usize);
        Some(buffer)
    }
}

/// Default [`Reassembly`] keyed by first packet and offset.
///
/// Fragments are dropped once their transfer completes; only the delivered buffer
/// is kept, for the most recent [`RETAINED_COMPLETIONS`] transfers.
#[derive(Debug, Default)]
pub struct FragmentTable {
    pending: BTreeMap<u32, PendingTransfer>,
    completed: HashMap<u32, Vec<u8>>,
    completion_order: VecDeque<u32>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers still waiting for fragments
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Completed transfers still remembered
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// A chunk of an already delivered transfer: apply it to the delivered buffer
    /// and report the result only if it changed
    fn revise(&mut self, fragment: &TransferFragment, data: &[u8]) -> Option<Vec<u8>> {
        let delivered = self.completed.get_mut(&fragment.key)?;
        let offset = fragment.offset as usize;
        if offset > delivered.len() {
            trace!(
                "Transfer {}: late chunk at {} lies past its end",
                fragment.key,
                offset
            );
            return None;
        }

        let mut buffer = delivered[..offset].to_vec();
        buffer.extend_from_slice(data);
        if fragment.more && buffer.len() < delivered.len() {
            buffer.extend_from_slice(&delivered[buffer.len()..]);
        }
        if buffer == *delivered {
            trace!("Transfer {} re-completed with identical data", fragment.key);
            return None;
        }
        *delivered = buffer.clone();
        Some(buffer)
    }

    fn remember(&mut self, key: u32, buffer: Vec<u8>) {
        self.completed.insert(key, buffer);
        self.completion_order.push_back(key);
        while self.completion_order.len() > RETAINED_COMPLETIONS {
            if let Some(old) = self.completion_order.pop_front() {
                self.completed.remove(&old);
            }
        }
    }
}

impl Reassembly for FragmentTable {
    fn add(&mut self, fragment: &TransferFragment, data: &[u8]) -> Option<Vec<u8>> {
        if self.completed.contains_key(&fragment.key) {
            return self.revise(fragment, data);
        }

        let pending = self.pending.entry(fragment.key).or_default();
        if !data.is_empty() {
            // Same offset again is a retransmission and replaces the earlier copy
            pending.fragments.insert(fragment.offset, data.to_vec());
        }
        if !fragment.more {
            pending.total = Some(fragment.offset + data.len() as u32);
        }

        let buffer = match pending.total.and_then(|total| pending.assemble(total)) {
            Some(buffer) => buffer,
            None => {
                while self.pending.len() > RETAINED_PENDING {
                    if let Some((old, _)) = self.pending.pop_first() {
                        debug!("Transfer {} never completed, dropping its fragments", old);
                    }
                }
                return None;
            }
        };
        self.pending.remove(&fragment.key);
        self.remember(fragment.key, buffer.clone());
        Some(buffer)
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.completed.clear();
        self.completion_order.clear();
    }
}

/// Whether a chunk ending at `end` leaves the transfer open
fn expects_more(info: &EndpointInfo, length: u32, end: u32) -> bool {
    let mps = u32::from(info.max_packet_size);
    if length == 0 {
        return false;
    }
    match info.kind {
        EndpointType::Control => {
            let short = mps > 0 && length < mps;
            info.requested_transfer_length > 0 && end < info.requested_transfer_length && !short
        }
        EndpointType::Bulk | EndpointType::Interrupt => mps > 0 && length == mps,
        EndpointType::Isochronous | EndpointType::Unknown => false,
    }
}

/// Account a data chunk on its endpoint record and describe its fragment.
///
/// `standalone` data (isochronous) never joins other packets and leaves the
/// record untouched.
pub fn account_chunk(
    info: &mut EndpointInfo,
    frame: u32,
    pid: Pid,
    direction: Direction,
    length: u32,
    standalone: bool,
) -> TransferFragment {
    if standalone || info.kind == EndpointType::Isochronous {
        return TransferFragment {
            key: frame,
            offset: 0,
            length,
            kind: EndpointType::Isochronous,
            direction,
            more: false,
            status: UrbStatus::Complete,
        };
    }

    if let Some(last) = info.last_chunk.as_mut() {
        if last.pid == pid {
            debug!(
                "Frame {}: {} repeats the previous data PID, retransmission at offset {}",
                frame, pid, last.offset
            );
            last.acked = false;
            last.length = length;
            return TransferFragment {
                key: last.key,
                offset: last.offset,
                length,
                kind: info.kind,
                direction,
                more: last.more,
                status: UrbStatus::Complete,
            };
        }
    }

    let previous_key = info.active_transfer_key;
    let previous_requested = info.requested_transfer_length;
    let key = if info.in_transfer() {
        info.active_transfer_key
    } else {
        frame
    };
    let offset = info.transfer_offset;
    let end = offset + length;
    let more = expects_more(info, length, end);

    if more {
        info.active_transfer_key = key;
        info.transfer_offset = end;
    } else {
        debug!("Frame {}: transfer {} ends at {} bytes", frame, key, end);
        info.active_transfer_key = 0;
        info.transfer_offset = 0;
        info.requested_transfer_length = 0;
    }
    info.last_chunk = Some(LastChunk {
        pid,
        previous_key,
        previous_requested,
        key,
        offset,
        length,
        more,
        acked: false,
    });

    TransferFragment {
        key,
        offset,
        length,
        kind: info.kind,
        direction,
        more,
        status: UrbStatus::Complete,
    }
}

/// Apply a handshake's verdict on the last chunk. Returns the terminating
/// fragment when the handshake ends the transfer.
pub fn apply_outcome(
    info: &mut EndpointInfo,
    frame: u32,
    direction: Direction,
    outcome: DataOutcome,
) -> Option<TransferFragment> {
    match outcome {
        DataOutcome::Accepted => {
            if let Some(last) = info.last_chunk.as_mut() {
                last.acked = true;
            }
            None
        }
        DataOutcome::Rejected => {
            if let Some(last) = info.last_chunk.filter(|c| !c.acked) {
                debug!(
                    "Frame {}: chunk at offset {} rejected, rolling back",
                    frame, last.offset
                );
                info.active_transfer_key = last.previous_key;
                info.transfer_offset = last.offset;
                info.requested_transfer_length = last.previous_requested;
                info.last_chunk = None;
            }
            None
        }
        DataOutcome::Halted => terminate(info, frame, direction, UrbStatus::Stalled),
        DataOutcome::NotYet => {
            if let Some(last) = info.last_chunk.as_mut() {
                last.acked = true;
            }
            terminate(info, frame, direction, UrbStatus::NotYet)
        }
    }
}

/// Close a control data stage that is still open when the status stage begins.
/// With an unknown max packet size a short reply cannot be recognised by its
/// length, so the opposite-direction status token is what ends it.
pub fn end_data_stage(
    info: &mut EndpointInfo,
    frame: u32,
    direction: Direction,
) -> Option<TransferFragment> {
    if info.kind != EndpointType::Control || !info.in_transfer() {
        return None;
    }
    terminate(info, frame, direction, UrbStatus::Complete)
}

fn terminate(
    info: &mut EndpointInfo,
    frame: u32,
    direction: Direction,
    status: UrbStatus,
) -> Option<TransferFragment> {
    let unacked = info.last_chunk.filter(|c| !c.acked && direction == Direction::Out);

    let ending = match unacked {
        // Data the device never accepted is cut off
        Some(chunk) if chunk.more => Some((chunk.key, chunk.offset)),
        // Final chunk already completed its transfer
        Some(_) => None,
        None if info.in_transfer() => Some((info.active_transfer_key, info.transfer_offset)),
        None => None,
    };

    info.reset_transfer();

    let (key, offset) = ending?;
    debug!(
        "Frame {}: transfer {} terminated ({:?}) at {} bytes",
        frame, key, status, offset
    );
    Some(TransferFragment {
        key,
        offset,
        length: 0,
        kind: info.kind,
        direction,
        more: false,
        status,
    })
}

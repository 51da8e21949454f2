//! Transaction state machine
//!
//! Each packet resolves to exactly one [`State`], computed from the previous
//! packet's state and the current PID. The grammar follows USB 2.0 chapter 8
//! (plus the split-transaction rules of chapter 11 and the LPM addendum).
//! Anything the grammar does not allow resolves to [`State::Invalid`]; a SOF or
//! any addressed token always resynchronizes.
//!
//! PRE/ERR is the one deliberate exception: outside the three complete-split
//! contexts where ERR is a legal transaction translator response, it resolves
//! to [`State::Idle`] rather than `Invalid`. PRE legitimately shows up on
//! full-speed buses ahead of low-speed traffic and is not part of any
//! transaction.

use serde::Serialize;
use std::fmt;

use crate::pid::{Pid, SubPid};
use crate::types::{Direction, EndpointType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum State {
    /// No transaction in progress (e.g. after SOF)
    #[default]
    Idle,
    /// PID sequence the grammar does not allow
    Invalid,

    // Completed transactions
    OutAck,
    OutNak,
    OutStall,
    OutNyet,
    InAck,
    InNak,
    InStall,
    PingAck,
    PingNak,
    PingStall,
    SetupAck,

    // Transactions in progress
    Setup,
    SetupData0,
    Out,
    OutData0,
    OutData1,
    OutHsIsochronousMdata,
    In,
    InData0,
    InData1,
    InHsIsochronousData2,
    Ping,

    // Control split transactions
    SsplitControl,
    SsplitControlSetup,
    SsplitControlSetupData0,
    SsplitControlSetupAck,
    SsplitControlSetupNak,
    SsplitControlOut,
    SsplitControlOutData0,
    SsplitControlOutData1,
    SsplitControlOutAck,
    SsplitControlOutNak,
    SsplitControlIn,
    SsplitControlInAck,
    SsplitControlInNak,
    CsplitControl,
    CsplitControlSetup,
    CsplitControlSetupAck,
    CsplitControlSetupNyet,
    CsplitControlOut,
    CsplitControlOutAck,
    CsplitControlOutNak,
    CsplitControlOutStall,
    CsplitControlOutNyet,
    CsplitControlIn,
    CsplitControlInData0,
    CsplitControlInData1,
    CsplitControlInNak,
    CsplitControlInStall,
    CsplitControlInNyet,

    // Bulk split transactions
    SsplitBulk,
    SsplitBulkOut,
    SsplitBulkOutData0,
    SsplitBulkOutData1,
    SsplitBulkOutAck,
    SsplitBulkOutNak,
    SsplitBulkIn,
    SsplitBulkInAck,
    SsplitBulkInNak,
    CsplitBulk,
    CsplitBulkOut,
    CsplitBulkOutAck,
    CsplitBulkOutNak,
    CsplitBulkOutStall,
    CsplitBulkOutNyet,
    CsplitBulkIn,
    CsplitBulkInData0,
    CsplitBulkInData1,
    CsplitBulkInNak,
    CsplitBulkInStall,
    CsplitBulkInNyet,

    // Interrupt split transactions
    SsplitInterrupt,
    SsplitInterruptOut,
    SsplitInterruptOutData0,
    SsplitInterruptOutData1,
    SsplitInterruptIn,
    CsplitInterrupt,
    CsplitInterruptOut,
    CsplitInterruptOutAck,
    CsplitInterruptOutNak,
    CsplitInterruptOutStall,
    CsplitInterruptOutErr,
    CsplitInterruptOutNyet,
    CsplitInterruptIn,
    CsplitInterruptInMdata,
    CsplitInterruptInData0,
    CsplitInterruptInData1,
    CsplitInterruptInNak,
    CsplitInterruptInStall,
    CsplitInterruptInErr,
    CsplitInterruptInNyet,

    // Isochronous split transactions
    SsplitIsochronous,
    SsplitIsochronousOut,
    SsplitIsochronousOutData0,
    SsplitIsochronousIn,
    CsplitIsochronous,
    CsplitIsochronousIn,
    CsplitIsochronousInData0,
    CsplitIsochronousInMdata,
    CsplitIsochronousInErr,
    CsplitIsochronousInNyet,

    // Link Power Management (extended token)
    Ext,
    SubpidInvalid,
    SubpidNotReusable,
    SubpidReserved,
    SubpidLpm,
    SubpidLpmAck,
    SubpidLpmNyet,
    SubpidLpmStall,
}

/// Which side of the link transmitted the packet that produced a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Host,
    Device,
    /// The hub's transaction translator answering a split transaction
    Hub,
}

/// Phase of a split transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SplitPhase {
    Start,
    Complete,
}

/// What a handshake says about the data chunk it answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// Final recipient accepted the data
    Accepted,
    /// Data not accepted; the host will send it again
    Rejected,
    /// Endpoint halted, transfer is over
    Halted,
    /// High-speed NYET: accepted, but the endpoint cannot take more right now
    NotYet,
}

/// Compute the state reached by a standard PID.
///
/// Total over every `(State, Pid)` pair. SPLIT needs its three-byte payload and is
/// resolved through [`split_state`]; passed here it yields `Invalid`.
pub fn next_state(previous: State, pid: Pid) -> State {
    use State::*;

    match pid {
        Pid::Sof => Idle,
        Pid::Ping => Ping,
        Pid::Ext => Ext,
        Pid::Split => Invalid,
        Pid::Setup => match previous {
            SsplitControl => SsplitControlSetup,
            CsplitControl => CsplitControlSetup,
            _ => Setup,
        },
        Pid::Out => match previous {
            SsplitControl => SsplitControlOut,
            CsplitControl => CsplitControlOut,
            SsplitBulk => SsplitBulkOut,
            CsplitBulk => CsplitBulkOut,
            SsplitInterrupt => SsplitInterruptOut,
            CsplitInterrupt => CsplitInterruptOut,
            SsplitIsochronous => SsplitIsochronousOut,
            _ => Out,
        },
        Pid::In => match previous {
            SsplitControl => SsplitControlIn,
            CsplitControl => CsplitControlIn,
            SsplitBulk => SsplitBulkIn,
            CsplitBulk => CsplitBulkIn,
            SsplitInterrupt => SsplitInterruptIn,
            CsplitInterrupt => CsplitInterruptIn,
            SsplitIsochronous => SsplitIsochronousIn,
            CsplitIsochronous => CsplitIsochronousIn,
            _ => In,
        },
        Pid::Data0 => match previous {
            In => InData0,
            Out => OutData0,
            Setup => SetupData0,
            SsplitControlSetup => SsplitControlSetupData0,
            SsplitControlOut => SsplitControlOutData0,
            CsplitControlIn => CsplitControlInData0,
            SsplitBulkOut => SsplitBulkOutData0,
            CsplitBulkIn => CsplitBulkInData0,
            SsplitInterruptOut => SsplitInterruptOutData0,
            CsplitInterruptIn => CsplitInterruptInData0,
            SsplitIsochronousOut => SsplitIsochronousOutData0,
            CsplitIsochronousIn => CsplitIsochronousInData0,
            _ => Invalid,
        },
        Pid::Data1 => match previous {
            In => InData1,
            Out => OutData1,
            SsplitControlOut => SsplitControlOutData1,
            CsplitControlIn => CsplitControlInData1,
            SsplitBulkOut => SsplitBulkOutData1,
            CsplitBulkIn => CsplitBulkInData1,
            SsplitInterruptOut => SsplitInterruptOutData1,
            CsplitInterruptIn => CsplitInterruptInData1,
            _ => Invalid,
        },
        Pid::Data2 => match previous {
            In => InHsIsochronousData2,
            _ => Invalid,
        },
        Pid::Mdata => match previous {
            Out => OutHsIsochronousMdata,
            CsplitInterruptIn => CsplitInterruptInMdata,
            CsplitIsochronousIn => CsplitIsochronousInMdata,
            _ => Invalid,
        },
        Pid::Ack => match previous {
            InData0 | InData1 => InAck,
            OutData0 | OutData1 => OutAck,
            Ping => PingAck,
            SetupData0 => SetupAck,
            SsplitControlSetupData0 => SsplitControlSetupAck,
            CsplitControlSetup => CsplitControlSetupAck,
            SsplitControlOutData0 | SsplitControlOutData1 => SsplitControlOutAck,
            CsplitControlOut => CsplitControlOutAck,
            SsplitControlIn => SsplitControlInAck,
            SsplitBulkOutData0 | SsplitBulkOutData1 => SsplitBulkOutAck,
            CsplitBulkOut => CsplitBulkOutAck,
            SsplitBulkIn => SsplitBulkInAck,
            CsplitInterruptOut => CsplitInterruptOutAck,
            SubpidLpm => SubpidLpmAck,
            _ => Invalid,
        },
        Pid::Nak => match previous {
            In => InNak,
            OutData0 | OutData1 => OutNak,
            Ping => PingNak,
            SsplitControlSetupData0 => SsplitControlSetupNak,
            SsplitControlOutData0 | SsplitControlOutData1 => SsplitControlOutNak,
            SsplitControlIn => SsplitControlInNak,
            CsplitControlOut => CsplitControlOutNak,
            CsplitControlIn => CsplitControlInNak,
            SsplitBulkOutData0 | SsplitBulkOutData1 => SsplitBulkOutNak,
            SsplitBulkIn => SsplitBulkInNak,
            CsplitBulkOut => CsplitBulkOutNak,
            CsplitBulkIn => CsplitBulkInNak,
            CsplitInterruptOut => CsplitInterruptOutNak,
            CsplitInterruptIn => CsplitInterruptInNak,
            _ => Invalid,
        },
        Pid::Stall => match previous {
            In => InStall,
            OutData0 | OutData1 => OutStall,
            Ping => PingStall,
            CsplitControlOut => CsplitControlOutStall,
            CsplitControlIn => CsplitControlInStall,
            CsplitBulkOut => CsplitBulkOutStall,
            CsplitBulkIn => CsplitBulkInStall,
            CsplitInterruptOut => CsplitInterruptOutStall,
            CsplitInterruptIn => CsplitInterruptInStall,
            SubpidLpm => SubpidLpmStall,
            _ => Invalid,
        },
        Pid::Nyet => match previous {
            OutData0 | OutData1 => OutNyet,
            CsplitControlSetup => CsplitControlSetupNyet,
            CsplitControlOut => CsplitControlOutNyet,
            CsplitControlIn => CsplitControlInNyet,
            CsplitBulkOut => CsplitBulkOutNyet,
            CsplitBulkIn => CsplitBulkInNyet,
            CsplitInterruptOut => CsplitInterruptOutNyet,
            CsplitInterruptIn => CsplitInterruptInNyet,
            CsplitIsochronousIn => CsplitIsochronousInNyet,
            SubpidLpm => SubpidLpmNyet,
            _ => Invalid,
        },
        Pid::PreErr => match previous {
            CsplitInterruptOut => CsplitInterruptOutErr,
            CsplitInterruptIn => CsplitInterruptInErr,
            CsplitIsochronousIn => CsplitIsochronousInErr,
            _ => Idle,
        },
    }
}

/// State reached by the SubPID packet that follows an EXT token
pub fn next_extended_state(subpid: Option<SubPid>) -> State {
    match subpid {
        Some(SubPid::Lpm) => State::SubpidLpm,
        Some(SubPid::NotReusable(_)) => State::SubpidNotReusable,
        Some(SubPid::Reserved(_)) => State::SubpidReserved,
        None => State::SubpidInvalid,
    }
}

/// State reached by a SPLIT packet, from its SC bit and endpoint type field
pub fn split_state(phase: SplitPhase, kind: EndpointType) -> State {
    use State::*;

    match (phase, kind) {
        (SplitPhase::Start, EndpointType::Control) => SsplitControl,
        (SplitPhase::Start, EndpointType::Bulk) => SsplitBulk,
        (SplitPhase::Start, EndpointType::Interrupt) => SsplitInterrupt,
        (SplitPhase::Start, EndpointType::Isochronous) => SsplitIsochronous,
        (SplitPhase::Complete, EndpointType::Control) => CsplitControl,
        (SplitPhase::Complete, EndpointType::Bulk) => CsplitBulk,
        (SplitPhase::Complete, EndpointType::Interrupt) => CsplitInterrupt,
        (SplitPhase::Complete, EndpointType::Isochronous) => CsplitIsochronous,
        (_, EndpointType::Unknown) => Invalid,
    }
}

impl State {
    /// The next packet's first octet is a SubPID
    pub fn expects_subpid(&self) -> bool {
        *self == State::Ext
    }

    pub fn is_valid(&self) -> bool {
        !matches!(
            self,
            State::Invalid | State::SubpidInvalid | State::SubpidNotReusable | State::SubpidReserved
        )
    }

    /// State produced by a start-split packet itself
    pub fn is_split_start(&self) -> bool {
        matches!(
            self,
            State::SsplitControl | State::SsplitBulk | State::SsplitInterrupt | State::SsplitIsochronous
        )
    }

    /// State produced by a complete-split packet itself
    pub fn is_split_complete(&self) -> bool {
        matches!(
            self,
            State::CsplitControl | State::CsplitBulk | State::CsplitInterrupt | State::CsplitIsochronous
        )
    }

    /// State produced by a SPLIT packet (either phase)
    pub fn is_split_packet(&self) -> bool {
        self.is_split_start() || self.is_split_complete()
    }

    /// Phase of the split transaction this state belongs to, if any
    pub fn split_phase(&self) -> Option<SplitPhase> {
        use State::*;
        match self {
            SsplitControl
            | SsplitControlSetup
            | SsplitControlSetupData0
            | SsplitControlSetupAck
            | SsplitControlSetupNak
            | SsplitControlOut
            | SsplitControlOutData0
            | SsplitControlOutData1
            | SsplitControlOutAck
            | SsplitControlOutNak
            | SsplitControlIn
            | SsplitControlInAck
            | SsplitControlInNak
            | SsplitBulk
            | SsplitBulkOut
            | SsplitBulkOutData0
            | SsplitBulkOutData1
            | SsplitBulkOutAck
            | SsplitBulkOutNak
            | SsplitBulkIn
            | SsplitBulkInAck
            | SsplitBulkInNak
            | SsplitInterrupt
            | SsplitInterruptOut
            | SsplitInterruptOutData0
            | SsplitInterruptOutData1
            | SsplitInterruptIn
            | SsplitIsochronous
            | SsplitIsochronousOut
            | SsplitIsochronousOutData0
            | SsplitIsochronousIn => Some(SplitPhase::Start),
            CsplitControl
            | CsplitControlSetup
            | CsplitControlSetupAck
            | CsplitControlSetupNyet
            | CsplitControlOut
            | CsplitControlOutAck
            | CsplitControlOutNak
            | CsplitControlOutStall
            | CsplitControlOutNyet
            | CsplitControlIn
            | CsplitControlInData0
            | CsplitControlInData1
            | CsplitControlInNak
            | CsplitControlInStall
            | CsplitControlInNyet
            | CsplitBulk
            | CsplitBulkOut
            | CsplitBulkOutAck
            | CsplitBulkOutNak
            | CsplitBulkOutStall
            | CsplitBulkOutNyet
            | CsplitBulkIn
            | CsplitBulkInData0
            | CsplitBulkInData1
            | CsplitBulkInNak
            | CsplitBulkInStall
            | CsplitBulkInNyet
            | CsplitInterrupt
            | CsplitInterruptOut
            | CsplitInterruptOutAck
            | CsplitInterruptOutNak
            | CsplitInterruptOutStall
            | CsplitInterruptOutErr
            | CsplitInterruptOutNyet
            | CsplitInterruptIn
            | CsplitInterruptInMdata
            | CsplitInterruptInData0
            | CsplitInterruptInData1
            | CsplitInterruptInNak
            | CsplitInterruptInStall
            | CsplitInterruptInErr
            | CsplitInterruptInNyet
            | CsplitIsochronous
            | CsplitIsochronousIn
            | CsplitIsochronousInData0
            | CsplitIsochronousInMdata
            | CsplitIsochronousInErr
            | CsplitIsochronousInNyet => Some(SplitPhase::Complete),
            _ => None,
        }
    }

    /// Token (SETUP/OUT/IN/PING), split-prefixed or not
    pub fn is_token(&self) -> bool {
        use State::*;
        matches!(
            self,
            Setup
                | Out
                | In
                | Ping
                | SsplitControlSetup
                | SsplitControlOut
                | SsplitControlIn
                | CsplitControlSetup
                | CsplitControlOut
                | CsplitControlIn
                | SsplitBulkOut
                | SsplitBulkIn
                | CsplitBulkOut
                | CsplitBulkIn
                | SsplitInterruptOut
                | SsplitInterruptIn
                | CsplitInterruptOut
                | CsplitInterruptIn
                | SsplitIsochronousOut
                | SsplitIsochronousIn
                | CsplitIsochronousIn
        )
    }

    /// DATA0 carrying the 8-byte SETUP request
    pub fn is_setup_data(&self) -> bool {
        matches!(self, State::SetupData0 | State::SsplitControlSetupData0)
    }

    /// Data stage packet sent by the host (SETUP data excluded)
    pub fn is_data_from_host(&self) -> bool {
        use State::*;
        matches!(
            self,
            OutData0
                | OutData1
                | OutHsIsochronousMdata
                | SsplitControlOutData0
                | SsplitControlOutData1
                | SsplitBulkOutData0
                | SsplitBulkOutData1
                | SsplitInterruptOutData0
                | SsplitInterruptOutData1
                | SsplitIsochronousOutData0
        )
    }

    /// Data packet sent by the device (relayed by the hub for complete splits)
    pub fn is_data_from_device(&self) -> bool {
        use State::*;
        matches!(
            self,
            InData0
                | InData1
                | InHsIsochronousData2
                | CsplitControlInData0
                | CsplitControlInData1
                | CsplitBulkInData0
                | CsplitBulkInData1
                | CsplitInterruptInMdata
                | CsplitInterruptInData0
                | CsplitInterruptInData1
                | CsplitIsochronousInData0
                | CsplitIsochronousInMdata
        )
    }

    pub fn is_data(&self) -> bool {
        self.is_setup_data() || self.is_data_from_host() || self.is_data_from_device()
    }

    /// Data that can only belong to an isochronous stream
    pub fn is_isochronous_data(&self) -> bool {
        use State::*;
        matches!(
            self,
            OutHsIsochronousMdata
                | InHsIsochronousData2
                | SsplitIsochronousOutData0
                | CsplitIsochronousInData0
                | CsplitIsochronousInMdata
        )
    }

    /// Direction of the data stage for data states
    pub fn data_direction(&self) -> Option<Direction> {
        if self.is_setup_data() || self.is_data_from_host() {
            Some(Direction::Out)
        } else if self.is_data_from_device() {
            Some(Direction::In)
        } else {
            None
        }
    }

    /// Extended token or LPM transaction in progress
    pub fn is_lpm(&self) -> bool {
        use State::*;
        matches!(
            self,
            Ext | SubpidInvalid
                | SubpidNotReusable
                | SubpidReserved
                | SubpidLpm
                | SubpidLpmAck
                | SubpidLpmNyet
                | SubpidLpmStall
        )
    }

    /// Handshakes, including ERR responses of the transaction translator
    pub fn is_handshake(&self) -> bool {
        use State::*;
        matches!(
            self,
            OutAck
                | OutNak
                | OutStall
                | OutNyet
                | InAck
                | InNak
                | InStall
                | PingAck
                | PingNak
                | PingStall
                | SetupAck
                | SsplitControlSetupAck
                | SsplitControlSetupNak
                | SsplitControlOutAck
                | SsplitControlOutNak
                | SsplitControlInAck
                | SsplitControlInNak
                | CsplitControlSetupAck
                | CsplitControlSetupNyet
                | CsplitControlOutAck
                | CsplitControlOutNak
                | CsplitControlOutStall
                | CsplitControlOutNyet
                | CsplitControlInNak
                | CsplitControlInStall
                | CsplitControlInNyet
                | SsplitBulkOutAck
                | SsplitBulkOutNak
                | SsplitBulkInAck
                | SsplitBulkInNak
                | CsplitBulkOutAck
                | CsplitBulkOutNak
                | CsplitBulkOutStall
                | CsplitBulkOutNyet
                | CsplitBulkInNak
                | CsplitBulkInStall
                | CsplitBulkInNyet
                | CsplitInterruptOutAck
                | CsplitInterruptOutNak
                | CsplitInterruptOutStall
                | CsplitInterruptOutErr
                | CsplitInterruptOutNyet
                | CsplitInterruptInNak
                | CsplitInterruptInStall
                | CsplitInterruptInErr
                | CsplitInterruptInNyet
                | CsplitIsochronousInErr
                | CsplitIsochronousInNyet
                | SubpidLpmAck
                | SubpidLpmNyet
                | SubpidLpmStall
        )
    }

    /// Who transmitted the packet that produced this state
    pub fn origin(&self) -> Option<Origin> {
        use State::*;

        if !self.is_valid() || *self == Idle {
            return None;
        }
        if self.is_split_packet()
            || self.is_token()
            || self.is_setup_data()
            || self.is_data_from_host()
            || matches!(self, Ext | SubpidLpm | InAck)
        {
            return Some(Origin::Host);
        }
        if self.is_data_from_device() {
            return Some(Origin::Device);
        }
        if self.is_handshake() {
            return Some(if self.split_phase().is_some() {
                Origin::Hub
            } else {
                Origin::Device
            });
        }
        None
    }

    /// Effect of a handshake on the data chunk it answers, with the endpoint
    /// direction it applies to. `None` when the handshake does not answer data
    /// (IN NAK, PING ACK, ...) or only reports on the transaction translator.
    pub fn data_outcome(&self) -> Option<(Direction, DataOutcome)> {
        use State::*;

        match self {
            InAck => Some((Direction::In, DataOutcome::Accepted)),
            OutAck | CsplitControlOutAck | CsplitBulkOutAck | CsplitInterruptOutAck => {
                Some((Direction::Out, DataOutcome::Accepted))
            }
            OutNak
            | SsplitControlOutNak
            | SsplitBulkOutNak
            | CsplitControlOutNak
            | CsplitBulkOutNak
            | CsplitInterruptOutNak
            | CsplitInterruptOutErr => Some((Direction::Out, DataOutcome::Rejected)),
            OutStall | PingStall | CsplitControlOutStall | CsplitBulkOutStall
            | CsplitInterruptOutStall => Some((Direction::Out, DataOutcome::Halted)),
            InStall | CsplitControlInStall | CsplitBulkInStall | CsplitInterruptInStall => {
                Some((Direction::In, DataOutcome::Halted))
            }
            OutNyet => Some((Direction::Out, DataOutcome::NotYet)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.variant_name()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variant_name())
    }
}

macro_rules! state_names {
    ($($variant:ident),* $(,)?) => {
        /// Every state with its name, in declaration order
        pub const STATE_NAMES: &[(State, &str)] = &[$((State::$variant, stringify!($variant))),*];

        impl State {
            fn variant_name(&self) -> &'static str {
                match self {
                    $(State::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

state_names!(
    Idle,
    Invalid,
    OutAck,
    OutNak,
    OutStall,
    OutNyet,
    InAck,
    InNak,
    InStall,
    PingAck,
    PingNak,
    PingStall,
    SetupAck,
    Setup,
    SetupData0,
    Out,
    OutData0,
    OutData1,
    OutHsIsochronousMdata,
    In,
    InData0,
    InData1,
    InHsIsochronousData2,
    Ping,
    SsplitControl,
    SsplitControlSetup,
    SsplitControlSetupData0,
    SsplitControlSetupAck,
    SsplitControlSetupNak,
    SsplitControlOut,
    SsplitControlOutData0,
    SsplitControlOutData1,
    SsplitControlOutAck,
    SsplitControlOutNak,
    SsplitControlIn,
    SsplitControlInAck,
    SsplitControlInNak,
    CsplitControl,
    CsplitControlSetup,
    CsplitControlSetupAck,
    CsplitControlSetupNyet,
    CsplitControlOut,
    CsplitControlOutAck,
    CsplitControlOutNak,
    CsplitControlOutStall,
    CsplitControlOutNyet,
    CsplitControlIn,
    CsplitControlInData0,
    CsplitControlInData1,
    CsplitControlInNak,
    CsplitControlInStall,
    CsplitControlInNyet,
    SsplitBulk,
    SsplitBulkOut,
    SsplitBulkOutData0,
    SsplitBulkOutData1,
    SsplitBulkOutAck,
    SsplitBulkOutNak,
    SsplitBulkIn,
    SsplitBulkInAck,
    SsplitBulkInNak,
    CsplitBulk,
    CsplitBulkOut,
    CsplitBulkOutAck,
    CsplitBulkOutNak,
    CsplitBulkOutStall,
    CsplitBulkOutNyet,
    CsplitBulkIn,
    CsplitBulkInData0,
    CsplitBulkInData1,
    CsplitBulkInNak,
    CsplitBulkInStall,
    CsplitBulkInNyet,
    SsplitInterrupt,
    SsplitInterruptOut,
    SsplitInterruptOutData0,
    SsplitInterruptOutData1,
    SsplitInterruptIn,
    CsplitInterrupt,
    CsplitInterruptOut,
    CsplitInterruptOutAck,
    CsplitInterruptOutNak,
    CsplitInterruptOutStall,
    CsplitInterruptOutErr,
    CsplitInterruptOutNyet,
    CsplitInterruptIn,
    CsplitInterruptInMdata,
    CsplitInterruptInData0,
    CsplitInterruptInData1,
    CsplitInterruptInNak,
    CsplitInterruptInStall,
    CsplitInterruptInErr,
    CsplitInterruptInNyet,
    SsplitIsochronous,
    SsplitIsochronousOut,
    SsplitIsochronousOutData0,
    SsplitIsochronousIn,
    CsplitIsochronous,
    CsplitIsochronousIn,
    CsplitIsochronousInData0,
    CsplitIsochronousInMdata,
    CsplitIsochronousInErr,
    CsplitIsochronousInNyet,
    Ext,
    SubpidInvalid,
    SubpidNotReusable,
    SubpidReserved,
    SubpidLpm,
    SubpidLpmAck,
    SubpidLpmNyet,
    SubpidLpmStall,
);

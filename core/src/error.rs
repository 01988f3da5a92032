//! Error kinds surfaced by the core. None of these ever unwind out of the
//! orchestrator's main loop: they are reported through a callback, a
//! status register, or simply by degrading gracefully (open-bus reads,
//! dropped writes, a trace that stops recording).

use std::fmt;

/// Reported via the illegal-opcode trap callback. The core keeps running
/// unless the callback asks it to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalOpcode {
    pub opcode: u8,
    pub pc: u16,
}

impl fmt::Display for IllegalOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal opcode {:#04x} at {:#06x}", self.opcode, self.pc)
    }
}

impl std::error::Error for IllegalOpcode {}

/// Why a host message was rejected instead of applied. Carries a short
/// explanation string for the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRejection {
    InvalidInTimelineMode,
    RequiresHaltedCpu,
    HardwareNotPresent,
    DiscSlotLocked,
    InvalidSnapshot,
}

impl fmt::Display for MessageRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MessageRejection::InvalidInTimelineMode => "not valid in the current timeline mode",
            MessageRejection::RequiresHaltedCpu => "requires the CPU to be halted",
            MessageRejection::HardwareNotPresent => "hardware not present on this machine",
            MessageRejection::DiscSlotLocked => "disc image is locked by a pending access",
            MessageRejection::InvalidSnapshot => "snapshot could not be decoded",
        };
        write!(f, "{text}")
    }
}

impl std::error::Error for MessageRejection {}

/// Why a snapshot could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    NotCloneable(&'static str),
    RecordingRefused,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::NotCloneable(reason) => {
                write!(f, "machine state cannot be cloned: {reason}")
            }
            SnapshotError::RecordingRefused => write!(f, "recording refused for this machine"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Disc I/O conditions. These are never escalated as Rust errors at the
/// bus level; the WD1770 reports them on its status register. This type
/// exists for the disc-backend trait, whose methods return `Option`/
/// `bool` for the hot path but may want a richer reason for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscIoError {
    SectorNotFound,
    WriteProtected,
    ImageInaccessible,
}

impl fmt::Display for DiscIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiscIoError::SectorNotFound => "sector not found",
            DiscIoError::WriteProtected => "disc is write protected",
            DiscIoError::ImageInaccessible => "disc image inaccessible",
        };
        write!(f, "{text}")
    }
}

impl std::error::Error for DiscIoError {}

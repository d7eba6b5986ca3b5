//! Error types for flashprobe-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // SPI errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// SPI operation timed out
    SpiTimeout,
    /// Opcode is not supported by the programmer
    OpcodeNotSupported,

    // Chip errors
    /// Flash chip not found (JEDEC ID read failed or unknown)
    ChipNotFound,
    /// Flash chip detected but not supported
    ChipNotSupported,
    /// JEDEC ID does not match expected value
    JedecIdMismatch,

    // Operation errors
    /// Erase operation failed
    EraseError,
    /// Write/program operation failed
    WriteError,
    /// Verify operation failed (data mismatch)
    VerifyError,
    /// Operation timed out
    Timeout,

    // Address/size errors
    /// Address is beyond flash chip size
    AddressOutOfBounds,
    /// Operation requires aligned address or size
    InvalidAlignment,
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Protection errors
    /// Flash chip is write protected
    WriteProtected,
    /// Specific region is protected
    RegionProtected,

    // Programmer errors
    /// Programmer is not ready (not initialized or busy)
    ProgrammerNotReady,
    /// General programmer error
    ProgrammerError,

    // I/O errors
    /// Read operation failed
    ReadError,
    /// I/O error occurred
    IoError,

    // Protocol/command errors
    /// A command's write or read length was invalid for its opcode
    InvalidLength,
    /// An opcode is not a recognized value for its slot
    InvalidOpcode,
    /// An address is structurally invalid (e.g. wrong width for the mode in effect)
    InvalidAddress,
    /// Access to a region was denied by the region permission table
    AccessDenied,
    /// A transaction with the programmer/controller failed at the transport level
    TransactionError,
    /// A fixed-capacity scratch structure ran out of room
    OutOfMemory,
    /// The chip/programmer configuration is internally inconsistent and must
    /// not be used (e.g. an eraser whose regions don't cover the chip)
    Misconfiguration,
    /// The hardware reported a condition from which recovery is not possible
    FatalHardware,
    /// A layout/region description (FMAP, IFD, or layout file) could not be
    /// parsed or applied; see `crate::layout::LayoutError` for the detail.
    LayoutError,
}

/// What the planner/operation driver should do when a given [`Error`] kind
/// is returned from a processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Abort the whole operation immediately.
    Fail,
    /// Log and skip this unit, continuing with the rest of the plan.
    Ignore,
}

impl Error {
    /// The propagation policy for this error kind: whether a driver running
    /// a multi-unit plan should abort on it or skip the unit and continue.
    ///
    /// Only region/skip-safe conditions are `Ignore`; anything that leaves
    /// the chip state or transport in an unknown condition is `Fail`.
    pub const fn error_action(&self) -> ErrorAction {
        match self {
            Self::RegionProtected | Self::AccessDenied | Self::WriteProtected => {
                ErrorAction::Ignore
            }
            _ => ErrorAction::Fail,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::SpiTimeout => write!(f, "SPI operation timed out"),
            Self::OpcodeNotSupported => write!(f, "SPI opcode not supported by programmer"),
            Self::ChipNotFound => write!(f, "flash chip not found"),
            Self::ChipNotSupported => write!(f, "flash chip not supported"),
            Self::JedecIdMismatch => write!(f, "JEDEC ID mismatch"),
            Self::EraseError => write!(f, "erase operation failed"),
            Self::WriteError => write!(f, "write operation failed"),
            Self::VerifyError => write!(f, "verify failed: data mismatch"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::WriteProtected => write!(f, "flash chip is write protected"),
            Self::RegionProtected => write!(f, "region is protected"),
            Self::ProgrammerNotReady => write!(f, "programmer not ready"),
            Self::ProgrammerError => write!(f, "programmer error"),
            Self::ReadError => write!(f, "read operation failed"),
            Self::IoError => write!(f, "I/O error"),
            Self::InvalidLength => write!(f, "invalid command length"),
            Self::InvalidOpcode => write!(f, "invalid or unrecognized opcode"),
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::AccessDenied => write!(f, "access denied by region permissions"),
            Self::TransactionError => write!(f, "transaction with programmer failed"),
            Self::OutOfMemory => write!(f, "fixed-capacity buffer exhausted"),
            Self::Misconfiguration => write!(f, "chip or programmer configuration is invalid"),
            Self::FatalHardware => write!(f, "unrecoverable hardware condition"),
            Self::LayoutError => write!(f, "layout/region description error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

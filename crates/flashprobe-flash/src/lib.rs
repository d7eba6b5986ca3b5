//! High-level flash programming abstraction
//!
//! This crate provides a unified abstraction for flash programming that hides
//! the differences between SPI-based and opaque programmers. The CLI should
//! only interact with types from this crate, never directly with `SpiMaster`
//! or `OpaqueMaster`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CLI (bin/flashprobe)                    │
//! │  - Only imports flashprobe-flash and flashprobe-core (chip db)  │
//! │  - Never sees SpiMaster or OpaqueMaster                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     flashprobe-flash (this crate)              │
//! │  - FlashHandle: Unified abstraction over Flash + Programmer │
//! │  - ProgrammerRegistry: Opens programmers by name             │
//! │  - Hides SpiMaster/OpaqueMaster from users                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    flashprobe-core         │   │  Programmer crates       │
//! │  - FlashDevice trait     │   │  - ch341a, ftdi, etc.    │
//! │  - SpiFlashDevice        │   │  - Implement SpiMaster   │
//! │  - OpaqueFlashDevice     │   │    or OpaqueMaster       │
//! │  - Chip database         │   │                          │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use flashprobe_flash::{FlashHandle, open_flash};
//! use flashprobe_core::chip::ChipDatabase;
//!
//! let db = ChipDatabase::new();
//! // ... load chip database
//!
//! // Open any programmer type with a simple string
//! let handle = open_flash("ch341a", &db)?;
//!
//! // Use the handle - same interface for all programmer types
//! let mut buffer = vec![0u8; handle.size() as usize];
//! handle.read(0, &mut buffer)?;
//! ```

mod handle;
mod registry;

pub use handle::{ChipInfo, FlashHandle};
pub use registry::{
    available_programmers, open_flash, open_spi_programmer, parse_programmer_params,
    programmer_names_short, BoxedSpiMaster, ProgrammerInfo, ProgrammerParams,
};

// Re-export core types that CLI needs
pub use flashprobe_core::flash::FlashDevice;
pub use flashprobe_core::layout::Layout;

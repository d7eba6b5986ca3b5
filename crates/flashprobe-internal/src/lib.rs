//! flashprobe-internal - Intel chipset internal flash programmer
//!
//! This crate provides support for the Intel ICH/PCH internal SPI controller
//! and the AMD SPI100 controller, driven directly over PCI/MMIO rather than
//! through an external programmer device.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod amd_enable;
pub mod amd_pci;
pub mod amd_spi100;
pub mod chipset;
pub mod controller;
pub mod ec_lpc;
pub mod error;
pub mod ich_regs;
pub mod ichspi;
pub mod intel_pci;
pub mod lock;
pub mod pci;
pub mod physmap;
pub mod programmer;

use chipset::ChipsetEnable;
use error::InternalError;

/// One Intel chipset match found on the PCI bus: which entry in the
/// chipset-enable table matched, and where the matching LPC/ISA bridge
/// lives in PCI config space.
#[derive(Debug, Clone, Copy)]
pub struct DetectedChipset {
    /// The matching chipset-enable table entry.
    pub enable: &'static ChipsetEnable,
    /// PCI bus of the LPC/ISA bridge.
    pub bus: u8,
    /// PCI device (slot) of the LPC/ISA bridge.
    pub device: u8,
    /// PCI function of the LPC/ISA bridge.
    pub function: u8,
    /// Revision ID read from the bridge.
    pub revision_id: u8,
}

impl DetectedChipset {
    /// The chipset generation this entry maps to.
    pub fn chipset_type(&self) -> chipset::IchChipset {
        self.enable.chipset
    }

    /// Log a warning if this chipset's test status calls for one.
    pub fn log_warnings(&self) {
        if self.enable.status.should_warn() {
            if let Some(msg) = self.enable.status.message() {
                log::warn!("{}", msg);
            }
        }
    }
}

/// Detect a single supported Intel chipset on the PCI bus.
///
/// Returns `Ok(None)` if no supported chipset is present, and
/// `Err(InternalError::MultipleChipsets)` if more than one matched (the
/// caller would need to disambiguate via programmer options).
#[cfg(all(feature = "std", target_os = "linux"))]
pub fn detect_chipset() -> Result<Option<DetectedChipset>, InternalError> {
    pci::find_intel_chipset()
}

#[cfg(not(all(feature = "std", target_os = "linux")))]
pub fn detect_chipset() -> Result<Option<DetectedChipset>, InternalError> {
    Err(InternalError::NotSupported(
        "chipset detection only supported on Linux",
    ))
}

//! Flash chip type definitions

#[cfg(feature = "alloc")]
use alloc::{string::String, vec::Vec};

use super::features::Features;

/// Maximum number of distinct region bands a single eraser can describe.
///
/// Mirrors the upstream convention of at most a handful of differently
/// sized regions per erase function (e.g. a chip with uniform 4K sectors
/// plus a larger boot block at the top).
pub const MAX_ERASE_REGIONS: usize = 5;

/// One contiguous band of same-size erase blocks within an [`EraseBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct EraseRegion {
    /// Size of each block in this region, in bytes
    pub size: u32,
    /// Number of blocks of this size in this region
    pub count: u32,
}

impl EraseRegion {
    /// Create a new erase region
    pub const fn new(size: u32, count: u32) -> Self {
        Self { size, count }
    }
}

/// Erase block definition (an "eraser": one opcode plus the region layout it erases)
///
/// Represents a single erase function supported by a flash chip. The common
/// case is a single region of uniformly-sized blocks (`size` then applies to
/// every block this eraser can erase); chips with irregular layouts (e.g. a
/// larger block at the top of the chip) describe up to [`MAX_ERASE_REGIONS`]
/// regions via [`EraseBlock::with_regions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct EraseBlock {
    /// SPI opcode for this erase size
    pub opcode: u8,
    /// Size in bytes of the first (or only) region this eraser covers
    pub size: u32,
    regions: [EraseRegion; MAX_ERASE_REGIONS],
    region_count: u8,
}

impl EraseBlock {
    /// Create a new, uniform erase block definition: one region of `size`-byte
    /// blocks with an unspecified count (the caller only cares about `size`).
    pub const fn new(opcode: u8, size: u32) -> Self {
        Self {
            opcode,
            size,
            regions: [EraseRegion::new(size, 0); MAX_ERASE_REGIONS],
            region_count: 0,
        }
    }

    /// Create a uniform erase block: one region of `count` blocks of `size` bytes each.
    pub fn with_count(opcode: u8, size: u32, count: u32) -> Self {
        Self::with_regions(opcode, &[EraseRegion::new(size, count)])
    }

    /// Create an erase block with an explicit region layout.
    ///
    /// `regions` is truncated to [`MAX_ERASE_REGIONS`] entries; a chip
    /// definition needing more than that is a database error and should be
    /// caught by [`FlashChip::self_check`] rather than silently accepted here.
    pub fn with_regions(opcode: u8, regions: &[EraseRegion]) -> Self {
        let mut arr = [EraseRegion::new(0, 0); MAX_ERASE_REGIONS];
        let n = regions.len().min(MAX_ERASE_REGIONS);
        arr[..n].copy_from_slice(&regions[..n]);
        let size = regions.first().map(|r| r.size).unwrap_or(0);
        Self {
            opcode,
            size,
            regions: arr,
            region_count: n as u8,
        }
    }

    /// The region bands making up this eraser, smallest-address-first.
    ///
    /// Empty when this `EraseBlock` was built with [`EraseBlock::new`] (the
    /// uniform shorthand) rather than [`EraseBlock::with_regions`].
    pub fn regions(&self) -> &[EraseRegion] {
        &self.regions[..self.region_count as usize]
    }

    /// Total number of blocks across all regions, or 0 if built via [`EraseBlock::new`].
    pub fn block_count(&self) -> u32 {
        self.regions().iter().map(|r| r.count).sum()
    }

    /// Total bytes covered by this eraser's regions, or 0 if built via [`EraseBlock::new`].
    pub fn covered_bytes(&self) -> u64 {
        self.regions()
            .iter()
            .map(|r| r.size as u64 * r.count as u64)
            .sum()
    }

    /// True if every region uses the same block size as `self.size`
    /// (the common, non-irregular case).
    pub fn is_uniform(&self) -> bool {
        self.regions().iter().all(|r| r.size == self.size)
    }

    /// `Some(size)` if this eraser is uniform (see [`EraseBlock::is_uniform`]), else `None`.
    pub fn uniform_size(&self) -> Option<u32> {
        if self.is_uniform() {
            Some(self.size)
        } else {
            None
        }
    }
}

/// Which bus a chip is reached over.
///
/// This crate's chip database only ever populates SPI entries (parallel/LPC/
/// FWH parts are a dead product category this corpus does not carry chip
/// tables for), so it is kept as a standalone type used by the transport
/// layer's bus/master compatibility check
/// ([`crate::master::bustype_compatible`]) rather than a field threaded
/// through every [`FlashChip`] literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bustype {
    /// Memory-mapped parallel flash.
    Parallel,
    /// Low Pin Count bus.
    Lpc,
    /// Firmware Hub bus.
    Fwh,
    /// Serial Peripheral Interface.
    Spi,
    /// Reached only through a dedicated external programmer, not a chipset bus.
    Programmer,
}

/// Write granularity
///
/// Determines how the write/verify engine decides whether a given span of
/// the target image needs an erase before it can be programmed, and how it
/// chunks a write into individual program operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteGranularity {
    /// Can write individual bits (1->0 only); no separate erase step needed
    /// as long as every target bit is a subset of the current bits.
    Bit,
    /// Can write individual bytes (1->0 only, same rule as `Bit` but at byte
    /// resolution — only used by a couple of chips that can't do bit writes).
    Byte,
    /// Must write full pages
    #[default]
    Page,
    /// Must write in fixed-size chunks other than a "page" in the usual
    /// sense (e.g. AAI word-program chips, or chips with odd page sizes
    /// like 264/528/1056 bytes). The payload is the chunk size in bytes.
    NByteChunk(u16),
    /// Like `Byte`, but an erase is implicitly required before every write
    /// regardless of whether the target bits are a subset of current bits
    /// (some EEPROM-like parts re-erase silently on every byte write).
    ByteImplicitErase,
}

/// Test status for a chip operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum TestStatus {
    /// Not tested
    #[default]
    Untested,
    /// Tested and working
    Ok,
    /// Tested but has issues
    Bad,
    /// Not applicable for this chip
    Na,
}

/// Test results for various chip operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipTestStatus {
    /// Probe/identification
    pub probe: TestStatus,
    /// Read operation
    pub read: TestStatus,
    /// Erase operation
    pub erase: TestStatus,
    /// Write/program operation
    pub write: TestStatus,
    /// Write protection
    pub wp: TestStatus,
}

/// Flash chip definition (owned version for runtime use)
///
/// This structure contains all the information needed to identify and
/// interact with a specific flash chip model. Uses owned types (String, Vec)
/// for runtime flexibility.
#[derive(Debug, Clone)]
#[cfg(feature = "alloc")]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashChip {
    /// Vendor name (e.g., "Winbond")
    pub vendor: String,
    /// Chip model name (e.g., "W25Q128FV")
    pub name: String,
    /// JEDEC manufacturer ID (first byte of RDID response)
    pub jedec_manufacturer: u8,
    /// JEDEC device ID (second and third bytes of RDID response)
    pub jedec_device: u16,
    /// Total flash size in bytes
    pub total_size: u32,
    /// Page size in bytes (for programming)
    pub page_size: u16,
    /// Feature flags
    #[cfg_attr(feature = "std", serde(default))]
    pub features: Features,
    /// Minimum operating voltage in millivolts
    #[cfg_attr(feature = "std", serde(default = "default_voltage_min"))]
    pub voltage_min_mv: u16,
    /// Maximum operating voltage in millivolts
    #[cfg_attr(feature = "std", serde(default = "default_voltage_max"))]
    pub voltage_max_mv: u16,
    /// Write granularity
    #[cfg_attr(feature = "std", serde(default))]
    pub write_granularity: WriteGranularity,
    /// Available erase block sizes (smallest to largest)
    pub erase_blocks: Vec<EraseBlock>,
    /// Test status
    #[cfg_attr(feature = "std", serde(default))]
    pub tested: ChipTestStatus,
}

#[cfg(feature = "std")]
fn default_voltage_min() -> u16 {
    2700
}

#[cfg(feature = "std")]
fn default_voltage_max() -> u16 {
    3600
}

/// Flash chip definition (static/const version for no_std)
///
/// This structure uses static references for zero-cost embedded use.
#[derive(Debug, Clone, Copy)]
#[cfg(not(feature = "alloc"))]
pub struct FlashChip {
    /// Vendor name (e.g., "Winbond")
    pub vendor: &'static str,
    /// Chip model name (e.g., "W25Q128FV")
    pub name: &'static str,
    /// JEDEC manufacturer ID (first byte of RDID response)
    pub jedec_manufacturer: u8,
    /// JEDEC device ID (second and third bytes of RDID response)
    pub jedec_device: u16,
    /// Total flash size in bytes
    pub total_size: u32,
    /// Page size in bytes (for programming)
    pub page_size: u16,
    /// Feature flags
    pub features: Features,
    /// Minimum operating voltage in millivolts
    pub voltage_min_mv: u16,
    /// Maximum operating voltage in millivolts
    pub voltage_max_mv: u16,
    /// Write granularity
    pub write_granularity: WriteGranularity,
    /// Available erase block sizes (smallest to largest)
    pub erase_blocks: &'static [EraseBlock],
    /// Test status
    pub tested: ChipTestStatus,
}

impl FlashChip {
    /// Get the JEDEC ID as a 24-bit value (manufacturer << 16 | device)
    pub fn jedec_id(&self) -> u32 {
        ((self.jedec_manufacturer as u32) << 16) | (self.jedec_device as u32)
    }

    /// Check if this chip matches the given JEDEC ID
    pub fn matches_jedec_id(&self, manufacturer: u8, device: u16) -> bool {
        self.jedec_manufacturer == manufacturer && self.jedec_device == device
    }

    /// Check if this chip requires 4-byte addressing
    pub fn requires_4byte_addr(&self) -> bool {
        self.total_size > 16 * 1024 * 1024
    }

    /// Get the smallest erase block size
    pub fn min_erase_size(&self) -> Option<u32> {
        self.erase_blocks().first().map(|eb| eb.size)
    }

    /// Get the largest erase block size (excluding chip erase)
    pub fn max_erase_size(&self) -> Option<u32> {
        self.erase_blocks()
            .iter()
            .filter(|eb| eb.size < self.total_size)
            .map(|eb| eb.size)
            .max()
    }

    /// Find an erase block that matches the given size
    pub fn erase_block_for_size(&self, size: u32) -> Option<&EraseBlock> {
        self.erase_blocks().iter().find(|eb| eb.size == size)
    }

    /// Check if a given address and length are aligned to an erase block boundary
    pub fn is_erase_aligned(&self, addr: u32, len: u32) -> bool {
        if let Some(min_erase) = self.min_erase_size() {
            addr.is_multiple_of(min_erase) && len.is_multiple_of(min_erase)
        } else {
            false
        }
    }

    /// Get vendor name as a string slice
    #[cfg(feature = "alloc")]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Get chip name as a string slice
    #[cfg(feature = "alloc")]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get erase blocks as a slice
    #[cfg(feature = "alloc")]
    pub fn erase_blocks(&self) -> &[EraseBlock] {
        &self.erase_blocks
    }

    /// Get vendor name as a string slice
    #[cfg(not(feature = "alloc"))]
    pub fn vendor(&self) -> &str {
        self.vendor
    }

    /// Get chip name as a string slice
    #[cfg(not(feature = "alloc"))]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Get erase blocks as a slice
    #[cfg(not(feature = "alloc"))]
    pub fn erase_blocks(&self) -> &[EraseBlock] {
        self.erase_blocks
    }

    /// Validate this chip's static data, per the startup self-check
    /// invariants: every eraser with an explicit region layout must cover
    /// exactly the chip's total size, and no two erasers may share an
    /// opcode. A chip definition that fails this is unusable and must be
    /// rejected before any operation is attempted against it, not caught
    /// midway through an erase.
    pub fn self_check(&self) -> crate::error::Result<()> {
        use crate::error::Error;

        let blocks = self.erase_blocks();
        for (i, eb) in blocks.iter().enumerate() {
            if eb.region_count == 0 {
                continue;
            }
            if eb.covered_bytes() != self.total_size as u64 {
                return Err(Error::Misconfiguration);
            }
            for other in &blocks[i + 1..] {
                if other.opcode == eb.opcode {
                    return Err(Error::Misconfiguration);
                }
            }
        }
        Ok(())
    }
}

/// JEDEC manufacturer IDs
pub mod manufacturer {
    /// AMD/Spansion
    pub const AMD: u8 = 0x01;
    /// Atmel
    pub const ATMEL: u8 = 0x1F;
    /// EON
    pub const EON: u8 = 0x1C;
    /// Fujitsu
    pub const FUJITSU: u8 = 0x04;
    /// GigaDevice
    pub const GIGADEVICE: u8 = 0xC8;
    /// Intel
    pub const INTEL: u8 = 0x89;
    /// ISSI
    pub const ISSI: u8 = 0x9D;
    /// Macronix
    pub const MACRONIX: u8 = 0xC2;
    /// Micron
    pub const MICRON: u8 = 0x20;
    /// PMC
    pub const PMC: u8 = 0x9D;
    /// Sanyo
    pub const SANYO: u8 = 0x62;
    /// SST
    pub const SST: u8 = 0xBF;
    /// ST (now Micron)
    pub const ST: u8 = 0x20;
    /// Winbond
    pub const WINBOND: u8 = 0xEF;
    /// XMC
    pub const XMC: u8 = 0x20;
}

//! Transport masters, unified.
//!
//! A flash chip is reached through exactly one of three transport shapes:
//! a memory-mapped parallel/LPC/FWH window addressed by byte/word/long
//! primitives ([`ParMaster`]), a software-sequenced SPI opcode menu
//! ([`crate::programmer::SpiMaster`]), or an opaque whole-device
//! read/write/erase interface backing a hardware-sequencing controller or an
//! EC proxy ([`crate::programmer::OpaqueMaster`]).
//!
//! [`crate::programmer::SpiMaster`] and [`crate::programmer::OpaqueMaster`]
//! already exist as traits a concrete transport implements; [`Master`] is a
//! tagged sum type tying all three kinds together at one dispatch point,
//! favoring a plain enum over boxed function pointers. A
//! [`crate::flash::FlashContext`] holds exactly one `Master` at a time.

use crate::chip::Bustype;
use crate::error::Result;
use crate::programmer::{OpaqueMaster, SpiMaster};

/// Primitive parallel/LPC/FWH access at a byte address inside a mapped
/// window.
///
/// The core never converts between widths itself; each chip driver picks
/// the primitive its chip needs. Implementations back this with a raw
/// volatile memory access into the mapped window.
pub trait ParMaster {
    /// Read a single byte at `chipaddr`.
    fn read_byte(&mut self, chipaddr: u32) -> u8;
    /// Read a 16-bit word at `chipaddr`.
    fn read_word(&mut self, chipaddr: u32) -> u16;
    /// Read a 32-bit long at `chipaddr`.
    fn read_long(&mut self, chipaddr: u32) -> u32;
    /// Write a single byte at `chipaddr`.
    fn write_byte(&mut self, chipaddr: u32, value: u8);
    /// Write a 16-bit word at `chipaddr`.
    fn write_word(&mut self, chipaddr: u32, value: u16);
    /// Write a 32-bit long at `chipaddr`.
    fn write_long(&mut self, chipaddr: u32, value: u32);

    /// Size in bytes of the mapped window backing this master.
    fn window_size(&self) -> u32;

    /// Which bus kinds this mapped window can serve. A parallel master
    /// typically answers one of `Parallel`, `Lpc`, or `Fwh` depending on
    /// how the window was established, never more than one.
    fn bustype(&self) -> Bustype;
}

/// Which kind of transport a [`Master`] wraps, without borrowing the
/// contained value — useful for logging/diagnostics that only need to know
/// the shape, not drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterKind {
    /// Memory-mapped parallel/LPC/FWH access.
    Parallel,
    /// Software-sequenced SPI via an opcode menu.
    Spi,
    /// Opaque whole-device read/write/erase (hardware-sequenced or EC-proxied).
    Opaque,
}

/// The transport master active for a [`crate::flash::FlashContext`]: exactly
/// one of a parallel window, a software-sequenced SPI controller, or an
/// opaque hardware-sequenced/EC-proxied backend.
///
/// Generic over the concrete implementation of each trait rather than
/// boxing them, so a `no_std` build pays no allocation cost; callers that
/// need to store heterogeneous masters behind one type (the CLI's
/// programmer registry) do so with a further `Box<dyn FlashDevice>` at a
/// higher layer (see `flashprobe-flash::FlashHandle`), not here.
pub enum Master<P, S, O>
where
    P: ParMaster,
    S: SpiMaster,
    O: OpaqueMaster,
{
    /// Parallel/LPC/FWH transport.
    Parallel(P),
    /// SPI transport, driven through an opcode menu.
    Spi(S),
    /// Opaque hardware-sequenced or EC-proxied transport.
    Opaque(O),
}

impl<P, S, O> Master<P, S, O>
where
    P: ParMaster,
    S: SpiMaster,
    O: OpaqueMaster,
{
    /// Which kind of transport this is, without needing to match on the
    /// payload.
    pub fn kind(&self) -> MasterKind {
        match self {
            Self::Parallel(_) => MasterKind::Parallel,
            Self::Spi(_) => MasterKind::Spi,
            Self::Opaque(_) => MasterKind::Opaque,
        }
    }
}

/// Validate the invariant that a chip's declared `bustype` intersects the
/// bus set the active master can serve.
///
/// A `Parallel` master only ever serves one of `Parallel`/`Lpc`/`Fwh` (the
/// window it happens to have mapped); `Spi` and `Opaque` masters serve `Spi`
/// (hardware-sequenced or EC-proxied opaque masters are still logically SPI
/// NOR from the chip's point of view, just accessed without raw opcodes).
pub fn bustype_compatible(master_kind: MasterKind, chip_bustype: Bustype) -> bool {
    match master_kind {
        MasterKind::Parallel => matches!(
            chip_bustype,
            Bustype::Parallel | Bustype::Lpc | Bustype::Fwh
        ),
        MasterKind::Spi | MasterKind::Opaque => matches!(chip_bustype, Bustype::Spi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_master_is_compatible_with_parallel_lpc_fwh_only() {
        assert!(bustype_compatible(MasterKind::Parallel, Bustype::Parallel));
        assert!(bustype_compatible(MasterKind::Parallel, Bustype::Lpc));
        assert!(bustype_compatible(MasterKind::Parallel, Bustype::Fwh));
        assert!(!bustype_compatible(MasterKind::Parallel, Bustype::Spi));
    }

    #[test]
    fn spi_and_opaque_masters_only_serve_spi_chips() {
        assert!(bustype_compatible(MasterKind::Spi, Bustype::Spi));
        assert!(bustype_compatible(MasterKind::Opaque, Bustype::Spi));
        assert!(!bustype_compatible(MasterKind::Spi, Bustype::Parallel));
        assert!(!bustype_compatible(MasterKind::Opaque, Bustype::Lpc));
    }
}

//! Software-sequencing opcode menu: pure logic, no hardware access.
//!
//! A software-sequenced SPI controller does not emit an arbitrary opcode
//! byte; it picks one of up to 8 programmed slots (plus up to 2 preopcode
//! slots) and tells the hardware which slot to fire. This module models
//! that menu and the steps a command issue takes to drive it, independent
//! of any register layout, so it is unit-testable without a chipset:
//!
//! 1. resolve the first byte of the write array to a menu slot
//! 2. if missing and the menu isn't locked down, reprogram a slot with a
//!    best-guess type inferred from `(writecnt, readcnt)`
//! 3. classify the slot's type and validate `(writecnt, readcnt)` against it
//!
//! Steps 4-6 (BBAR-relative addressing, region permission checks, register
//! programming, cycle polling) are hardware-specific and live in
//! `flashprobe-internal::ichspi`, which drives this menu rather than
//! duplicating its decisions.

use crate::error::{Error, Result};

/// Number of programmable opcode slots in the menu.
pub const MAX_OPCODES: usize = 8;

/// Number of preopcode slots (typically WREN and EWSR).
pub const MAX_PREOPCODES: usize = 2;

/// The slot reprogrammed when a required opcode is missing and the menu is
/// not locked. Real controllers reuse a slot by convention rather than
/// tracking an LRU scheme; slot 2 is the default table's sector-erase entry.
pub const REPROGRAM_SLOT: usize = 2;

/// Maximum opcodes in a multi-command chain passed to [`plan_multicommand`].
pub const MAX_CHAIN: usize = MAX_OPCODES;

/// An opcode's read/write and address-carrying shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeType {
    /// A read with no address phase (e.g. RDSR, RDID).
    ReadNoAddr,
    /// A write with no address phase (e.g. WRSR, WREN).
    WriteNoAddr,
    /// A read preceded by a 3-byte address (e.g. READ).
    ReadAddr,
    /// A write preceded by a 3-byte address (e.g. page program, erase).
    WriteAddr,
}

/// Which preopcode, if any, the controller emits atomically before a slot's
/// main cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomicPreop {
    /// No atomic pairing.
    #[default]
    None,
    /// Paired with `preop[0]` (conventionally WREN).
    Preop0,
    /// Paired with `preop[1]` (conventionally EWSR).
    Preop1,
}

/// One programmed opcode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpcodeSlot {
    /// The SPI opcode byte, or `0x00` for an unprogrammed slot.
    pub byte: u8,
    /// The slot's read/write/address shape.
    pub ty: OpcodeType,
    /// Whether this slot is atomically preceded by a preopcode.
    pub atomic: AtomicPreop,
}

impl Default for OpcodeType {
    fn default() -> Self {
        Self::WriteNoAddr
    }
}

/// The software-sequencing opcode menu: up to 2 preopcodes plus 8 main
/// opcode slots, either read back from locked-down hardware or programmed
/// by the core at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeMenu {
    /// Preopcode bytes, conventionally `[WREN, EWSR]`.
    pub preop: [u8; MAX_PREOPCODES],
    /// The 8 programmable opcode slots.
    pub opcode: [OpcodeSlot; MAX_OPCODES],
}

impl OpcodeMenu {
    /// Find the slot index programmed with `byte`, if any.
    pub fn find(&self, byte: u8) -> Option<usize> {
        self.opcode.iter().position(|slot| slot.byte == byte)
    }

    /// Whether `byte` is one of the two preopcodes.
    pub fn is_preop(&self, byte: u8) -> bool {
        self.preop.contains(&byte)
    }

    /// Index of `byte` within the preopcode table, if it is one.
    pub fn preop_index(&self, byte: u8) -> Option<usize> {
        self.preop.iter().position(|&p| p == byte)
    }
}

/// Best-guess opcode type for a slot missing from the menu, inferred from
/// the shape of the command that needed it.
///
/// A command with no read phase (`readcnt == 0`) is a write; it carries a
/// 3-byte address when the write array is at least 4 bytes long (opcode +
/// address), otherwise it's address-less. A command with a read phase is a
/// read; `writecnt == 1` (opcode only) means no address, `writecnt == 4`
/// (opcode + 3-byte address) means address-carrying. Any other combination
/// can't be classified and is rejected, matching the strict validation step
/// 3 would apply to it anyway.
pub fn infer_type(writecnt: usize, readcnt: usize) -> Result<OpcodeType> {
    if readcnt == 0 {
        if writecnt >= 4 {
            Ok(OpcodeType::WriteAddr)
        } else {
            Ok(OpcodeType::WriteNoAddr)
        }
    } else if writecnt == 1 {
        Ok(OpcodeType::ReadNoAddr)
    } else if writecnt == 4 {
        Ok(OpcodeType::ReadAddr)
    } else {
        Err(Error::InvalidLength)
    }
}

/// Validate `(writecnt, readcnt)` against a slot's classified type.
pub fn validate_length(ty: OpcodeType, writecnt: usize, readcnt: usize) -> Result<()> {
    let ok = match ty {
        OpcodeType::WriteAddr => writecnt >= 4 && readcnt == 0,
        OpcodeType::WriteNoAddr => readcnt == 0,
        OpcodeType::ReadAddr => writecnt == 4,
        OpcodeType::ReadNoAddr => writecnt == 1,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidLength)
    }
}

/// The outcome of resolving one `send_command` call against the menu:
/// which slot answers it, and the preopcode (if any) the controller must
/// fire atomically first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Index into `OpcodeMenu::opcode` that will issue the cycle.
    pub slot: usize,
    /// The opcode byte that slot carries (equal to `writearr[0]`).
    pub opcode: u8,
    /// The slot's classified type.
    pub ty: OpcodeType,
    /// The preopcode byte to fire atomically before this cycle, if any.
    pub atomic_preop: Option<u8>,
}

/// Resolve and validate one command against the menu: find `writearr[0]`'s
/// slot, reprogramming [`REPROGRAM_SLOT`] with an
/// inferred type if it's missing and the menu isn't locked, then validate
/// `(writecnt, readcnt)` against the slot's type.
///
/// Returns `Err(Error::InvalidOpcode)` if the opcode is missing and the menu
/// is locked (nothing can be reprogrammed), and `Err(Error::InvalidLength)`
/// if the lengths don't fit the type. Never panics and never mutates `menu`
/// on an error path.
pub fn resolve_command(
    menu: &mut OpcodeMenu,
    locked: bool,
    writearr: &[u8],
    readcnt: usize,
) -> Result<ResolvedCommand> {
    let &opcode_byte = writearr.first().ok_or(Error::InvalidLength)?;
    let writecnt = writearr.len();

    let slot = match menu.find(opcode_byte) {
        Some(idx) => idx,
        None => {
            if locked {
                return Err(Error::InvalidOpcode);
            }
            let ty = infer_type(writecnt, readcnt)?;
            menu.opcode[REPROGRAM_SLOT] = OpcodeSlot {
                byte: opcode_byte,
                ty,
                atomic: AtomicPreop::None,
            };
            REPROGRAM_SLOT
        }
    };

    let entry = menu.opcode[slot];
    validate_length(entry.ty, writecnt, readcnt)?;

    Ok(ResolvedCommand {
        slot,
        opcode: entry.byte,
        ty: entry.ty,
        atomic_preop: match entry.atomic {
            AtomicPreop::None => None,
            AtomicPreop::Preop0 => Some(menu.preop[0]),
            AtomicPreop::Preop1 => Some(menu.preop[1]),
        },
    })
}

/// One command in a resolved multi-command chain: its opcode byte, and the
/// index into `OpcodeMenu::preop` of the preopcode it's atomically paired
/// with, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedCommand {
    /// The opcode byte for this step.
    pub opcode: u8,
    /// Index into `OpcodeMenu::preop` this step is atomically paired with.
    pub atomic_preop_index: Option<usize>,
}

/// Pair preopcode+opcode runs in a multi-command chain: if `chain[i]` is a
/// preopcode and `chain[i+1]`
/// is listed in the opcode menu, the pair is marked atomic and consumed
/// together; an isolated preopcode (nothing follows it, or what follows is
/// itself a preopcode, or what follows isn't in the menu at all) is a
/// contract error (`Error::InvalidOpcode`), never silently dropped.
pub fn plan_multicommand(
    menu: &OpcodeMenu,
    chain: &[u8],
) -> Result<heapless::Vec<PairedCommand, MAX_CHAIN>> {
    let mut out = heapless::Vec::new();
    let mut i = 0;
    while i < chain.len() {
        let byte = chain[i];
        if let Some(preop_idx) = menu.preop_index(byte) {
            let next = *chain.get(i + 1).ok_or(Error::InvalidOpcode)?;
            if menu.is_preop(next) || menu.find(next).is_none() {
                return Err(Error::InvalidOpcode);
            }
            out.push(PairedCommand {
                opcode: next,
                atomic_preop_index: Some(preop_idx),
            })
            .map_err(|_| Error::OutOfMemory)?;
            i += 2;
        } else {
            out.push(PairedCommand {
                opcode: byte,
                atomic_preop_index: None,
            })
            .map_err(|_| Error::OutOfMemory)?;
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    fn default_menu() -> OpcodeMenu {
        OpcodeMenu {
            preop: [opcodes::WREN, opcodes::EWSR],
            opcode: [
                OpcodeSlot {
                    byte: opcodes::PP,
                    ty: OpcodeType::WriteAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::READ,
                    ty: OpcodeType::ReadAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::SE_20,
                    ty: OpcodeType::WriteAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::RDSR,
                    ty: OpcodeType::ReadNoAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::REMS,
                    ty: OpcodeType::ReadAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::WRSR,
                    ty: OpcodeType::WriteNoAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::RDID,
                    ty: OpcodeType::ReadNoAddr,
                    atomic: AtomicPreop::None,
                },
                OpcodeSlot {
                    byte: opcodes::CE_C7,
                    ty: OpcodeType::WriteNoAddr,
                    atomic: AtomicPreop::None,
                },
            ],
        }
    }

    #[test]
    fn resolves_existing_opcode_without_mutating_menu() {
        let mut menu = default_menu();
        let before = menu;
        let writearr = [opcodes::SE_20, 0x00, 0x10, 0x00];
        let resolved = resolve_command(&mut menu, false, &writearr, 0).unwrap();
        assert_eq!(resolved.slot, 2);
        assert_eq!(resolved.opcode, opcodes::SE_20);
        assert_eq!(resolved.ty, OpcodeType::WriteAddr);
        assert_eq!(menu, before);
    }

    #[test]
    fn reprograms_missing_opcode_scenario_3() {
        // Menu is missing JEDEC_BE_D8 entirely; not locked.
        let mut menu = default_menu();
        let writearr = [opcodes::BE_D8, 0x00, 0x01, 0x00]; // writecnt=4
        let resolved = resolve_command(&mut menu, false, &writearr, 0).unwrap();
        assert_eq!(resolved.slot, REPROGRAM_SLOT);
        assert_eq!(resolved.opcode, opcodes::BE_D8);
        assert_eq!(resolved.ty, OpcodeType::WriteAddr);
        assert_eq!(menu.opcode[REPROGRAM_SLOT].byte, opcodes::BE_D8);
        assert_eq!(menu.opcode[REPROGRAM_SLOT].ty, OpcodeType::WriteAddr);
    }

    #[test]
    fn locked_menu_refuses_to_reprogram() {
        let mut menu = default_menu();
        let writearr = [opcodes::BE_D8, 0x00, 0x01, 0x00];
        assert_eq!(
            resolve_command(&mut menu, true, &writearr, 0).unwrap_err(),
            Error::InvalidOpcode
        );
    }

    #[test]
    fn wrong_length_for_opcode_type_is_invalid_length() {
        let mut menu = default_menu();
        // RDSR is ReadNoAddr (writecnt must be 1); give it 2.
        let writearr = [opcodes::RDSR, 0x00];
        assert_eq!(
            resolve_command(&mut menu, false, &writearr, 1).unwrap_err(),
            Error::InvalidLength
        );
    }

    #[test]
    fn empty_write_array_is_invalid_length_never_panics() {
        let mut menu = default_menu();
        assert_eq!(
            resolve_command(&mut menu, false, &[], 0).unwrap_err(),
            Error::InvalidLength
        );
    }

    #[test]
    fn infer_type_matches_strict_validation_rules() {
        assert_eq!(infer_type(4, 0).unwrap(), OpcodeType::WriteAddr);
        assert_eq!(infer_type(1, 0).unwrap(), OpcodeType::WriteNoAddr);
        assert_eq!(infer_type(1, 4).unwrap(), OpcodeType::ReadNoAddr);
        assert_eq!(infer_type(4, 4).unwrap(), OpcodeType::ReadAddr);
        assert_eq!(infer_type(2, 2).unwrap_err(), Error::InvalidLength);
    }

    #[test]
    fn multicommand_pairs_wren_with_following_opcode() {
        let menu = default_menu();
        let chain = [opcodes::WREN, opcodes::PP];
        let plan = plan_multicommand(&menu, &chain).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].opcode, opcodes::PP);
        assert_eq!(plan[0].atomic_preop_index, Some(0));
    }

    #[test]
    fn isolated_trailing_preopcode_is_a_contract_error() {
        let menu = default_menu();
        let chain = [opcodes::PP, opcodes::WREN];
        assert_eq!(
            plan_multicommand(&menu, &chain).unwrap_err(),
            Error::InvalidOpcode
        );
    }

    #[test]
    fn two_consecutive_preopcodes_is_a_contract_error() {
        let menu = default_menu();
        let chain = [opcodes::WREN, opcodes::EWSR, opcodes::PP];
        assert_eq!(
            plan_multicommand(&menu, &chain).unwrap_err(),
            Error::InvalidOpcode
        );
    }

    #[test]
    fn non_atomic_commands_pass_through_unpaired() {
        let menu = default_menu();
        let chain = [opcodes::RDSR, opcodes::RDID];
        let plan = plan_multicommand(&menu, &chain).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|p| p.atomic_preop_index.is_none()));
    }
}

//! Intel chipset PCI ID database and detection
//!
//! This module contains the PCI device IDs for Intel ICH/PCH LPC interface
//! bridges and their corresponding `IchChipset` mapping.

use crate::chipset::{ChipsetEnable, IchChipset, TestStatus, B_LS, B_PFLS};

/// Intel PCI Vendor ID
pub const INTEL_VID: u16 = 0x8086;

/// Intel chipset enable database, one representative LPC/ISA bridge device
/// ID per supported generation.
///
/// Real hardware exposes many device IDs per generation (one per SKU); this
/// table carries the most common bridge ID for each, matching how the
/// generation (not the exact SKU) decides which SPI register layout to use.
pub static INTEL_CHIPSETS: &[ChipsetEnable] = &[
    ChipsetEnable::new(
        INTEL_VID,
        0x2640,
        B_PFLS,
        TestStatus::Untested,
        "Intel",
        "ICH6",
        IchChipset::Ich6,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x27b8,
        B_PFLS,
        TestStatus::Ok,
        "Intel",
        "ICH7",
        IchChipset::Ich7,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x2810,
        B_PFLS,
        TestStatus::Ok,
        "Intel",
        "ICH8",
        IchChipset::Ich8,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x2918,
        B_PFLS,
        TestStatus::Ok,
        "Intel",
        "ICH9",
        IchChipset::Ich9,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x3a16,
        B_PFLS,
        TestStatus::Ok,
        "Intel",
        "ICH10",
        IchChipset::Ich10,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x3b00,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "5 Series (Ibex Peak)",
        IchChipset::Series5IbexPeak,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x1c44,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "6 Series (Cougar Point)",
        IchChipset::Series6CougarPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x1e44,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "7 Series (Panther Point)",
        IchChipset::Series7PantherPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x0f1c,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "Bay Trail",
        IchChipset::BayTrail,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x8c44,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "8 Series (Lynx Point)",
        IchChipset::Series8LynxPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x9c43,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "8 Series LP (Lynx Point LP)",
        IchChipset::Series8LynxPointLp,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x8d44,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "8 Series (Wellsburg)",
        IchChipset::Series8Wellsburg,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x8cc4,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "9 Series (Wildcat Point)",
        IchChipset::Series9WildcatPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x9cc3,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "9 Series LP (Wildcat Point LP)",
        IchChipset::Series9WildcatPointLp,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0xa142,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "100 Series (Sunrise Point)",
        IchChipset::Series100SunrisePoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0xa1c1,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "C620 (Lewisburg)",
        IchChipset::C620Lewisburg,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0xa304,
        B_LS,
        TestStatus::Ok,
        "Intel",
        "300 Series (Cannon Point)",
        IchChipset::Series300CannonPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x06a1,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "500 Series (Tiger Point)",
        IchChipset::Series500TigerPoint,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x5ae8,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "Apollo Lake",
        IchChipset::ApolloLake,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x31e8,
        B_LS,
        TestStatus::Untested,
        "Intel",
        "Gemini Lake",
        IchChipset::GeminiLake,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x4b00,
        B_LS,
        TestStatus::Depends,
        "Intel",
        "Elkhart Lake",
        IchChipset::ElkhartLake,
    ),
    ChipsetEnable::new(
        INTEL_VID,
        0x4d87,
        B_LS,
        TestStatus::Depends,
        "Intel",
        "Meteor Lake",
        IchChipset::MeteorLake,
    ),
];

/// Find a matching Intel chipset entry.
///
/// Matches on vendor/device ID; `revision_id` is accepted for parity with
/// the AMD lookup but unused since no Intel entry currently needs revision
/// matching (`ChipsetEnable::revision` is always `None` in this table).
pub fn find_chipset(
    vendor_id: u16,
    device_id: u16,
    revision_id: Option<u8>,
) -> Option<&'static ChipsetEnable> {
    let _ = revision_id;
    INTEL_CHIPSETS
        .iter()
        .find(|entry| entry.vendor_id == vendor_id && entry.device_id == device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_chipset() {
        let found = find_chipset(INTEL_VID, 0x2918, Some(0)).unwrap();
        assert_eq!(found.device_name, "ICH9");
        assert_eq!(found.chipset, IchChipset::Ich9);
    }

    #[test]
    fn rejects_unknown_device() {
        assert!(find_chipset(INTEL_VID, 0xffff, None).is_none());
    }

    #[test]
    fn rejects_wrong_vendor() {
        assert!(find_chipset(0x1002, 0x2918, None).is_none());
    }

    #[test]
    fn table_entries_are_all_intel() {
        assert!(INTEL_CHIPSETS.iter().all(|e| e.vendor_id == INTEL_VID));
    }
}

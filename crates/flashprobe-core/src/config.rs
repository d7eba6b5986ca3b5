//! Programmer configuration string parsing.
//!
//! The CLI (an external collaborator per spec.md §1) accepts a programmer
//! spec as a single opaque string, e.g. `"internal:ich_spi_mode=hwseq"` or
//! `"serprog:dev=/dev/ttyUSB0"`. Each concrete transport crate is free to
//! parse its own sub-options (see `flashprobe-flash::registry`,
//! `flashprobe-linux-spi::parse_options`, `flashprobe-internal::InternalOptions`),
//! but the full option vocabulary spec.md §6 names — `bus`, `freq`, `size`,
//! `spi_write_256_chunksize`, `spi_blacklist`, `spi_ignorelist`, `emulate`,
//! `erase_to_zero`, `fwh_idsel`, `speed`, `ich_spi_mode` — is common enough
//! across transports that it is parsed once here, so both the CLI and any
//! embedder get the same grammar without re-deriving it.
//!
//! This module only tokenizes and type-checks; it has no opinion on which
//! keys a given transport actually honors.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::chip::Bustype;
use crate::error::{Error, Result};

/// `name:key1=value1,key2=value2` split into the canonical programmer name
/// and its raw key/value pairs, plus typed accessors for the option
/// vocabulary spec.md §6 names.
///
/// Unrecognized keys are kept in `raw` rather than rejected — per-transport
/// parsers (e.g. `serprog`'s `dev=`/`ip=`) read their own keys straight out
/// of `raw` rather than duplicating them here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammerParams {
    /// Canonical programmer name, e.g. `"internal"`, `"serprog"`.
    pub name: String,
    /// Every `key=value` pair, in the order they appeared.
    pub raw: Vec<(String, String)>,
}

/// `type=` values naming the kind of external programmer being addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammerType {
    /// Embedded Controller flash-update proxy.
    Ec,
    /// Platform Controller Hub.
    Pd,
    /// Sensor hub.
    Sh,
    /// Fingerprint MCU.
    Fp,
    /// Touchpad MCU.
    Tp,
}

/// `ich_spi_mode=` values selecting how the chipset's SPI controller is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IchSpiMode {
    /// Probe hardware lock-down state and pick automatically.
    #[default]
    Auto,
    /// Force hardware sequencing (opaque whole-device interface only).
    Hwseq,
    /// Force software sequencing (opcode-menu SPI).
    Swseq,
}

fn parse_size_suffix(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("auto") {
        return None;
    }
    let (digits, mult) = if let Some(d) = s.strip_suffix(['k', 'K']) {
        (d, 1024u64)
    } else if let Some(d) = s.strip_suffix(['m', 'M']) {
        (d, 1024 * 1024)
    } else {
        (s, 1)
    };
    digits.trim().parse::<u64>().ok().map(|n| n * mult)
}

fn parse_freq_suffix(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, mult) = if let Some(d) = s.strip_suffix("hz").or_else(|| s.strip_suffix("Hz")) {
        (d, 1u64)
    } else if let Some(d) = s.strip_suffix("khz").or_else(|| s.strip_suffix("kHz")) {
        (d, 1_000)
    } else if let Some(d) = s.strip_suffix("mhz").or_else(|| s.strip_suffix("MHz")) {
        (d, 1_000_000)
    } else {
        (s, 1)
    };
    digits.trim().parse::<u64>().ok().map(|n| n * mult)
}

fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

impl ProgrammerParams {
    /// Parse `"name"` or `"name:key1=value1,key2=value2"`.
    ///
    /// Each `opt` must be `key=value`; a bare flag with no `=` is rejected,
    /// since every option spec.md §6 names carries a value.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
        let mut raw = Vec::new();
        if !opts_str.is_empty() {
            for opt in opts_str.split(',') {
                let (key, value) = opt.split_once('=').ok_or(Error::InvalidAddress)?;
                raw.push((key.to_string(), value.to_string()));
            }
        }
        Ok(Self {
            name: name.to_string(),
            raw,
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `dev=` — device path/descriptor for a transport.
    pub fn dev(&self) -> Option<&str> {
        self.get("dev")
    }

    /// `type=ec|pd|sh|fp|tp`.
    pub fn programmer_type(&self) -> Option<ProgrammerType> {
        match self.get("type")? {
            "ec" => Some(ProgrammerType::Ec),
            "pd" => Some(ProgrammerType::Pd),
            "sh" => Some(ProgrammerType::Sh),
            "fp" => Some(ProgrammerType::Fp),
            "tp" => Some(ProgrammerType::Tp),
            _ => None,
        }
    }

    /// `bus=parallel|lpc|fwh|spi`, or a `+`-joined subset (e.g. `lpc+fwh`).
    /// Returns an empty `Vec` if the key is absent.
    pub fn bus(&self) -> Vec<Bustype> {
        let Some(raw) = self.get("bus") else {
            return Vec::new();
        };
        raw.split('+')
            .filter_map(|tok| match tok {
                "parallel" => Some(Bustype::Parallel),
                "lpc" => Some(Bustype::Lpc),
                "fwh" => Some(Bustype::Fwh),
                "spi" => Some(Bustype::Spi),
                _ => None,
            })
            .collect()
    }

    /// `block=` — erase block size override, bytes.
    pub fn block(&self) -> Option<u32> {
        self.get("block")?.parse().ok()
    }

    /// `freq=` — bus clock, normalized to Hz (accepts `hz`/`khz`/`mhz` suffixes).
    pub fn freq(&self) -> Option<u64> {
        parse_freq_suffix(self.get("freq")?)
    }

    /// `size=` — chip size override in bytes (accepts `k`/`m` suffix, or the
    /// literal `auto`, which returns `None` just like an absent key).
    pub fn size(&self) -> Option<u64> {
        parse_size_suffix(self.get("size")?)
    }

    /// `spi_write_256_chunksize=` — page-program chunk size override.
    pub fn spi_write_256_chunksize(&self) -> Option<u32> {
        self.get("spi_write_256_chunksize")?.parse().ok()
    }

    /// `spi_blacklist=` — hex-encoded opcodes never to be issued.
    pub fn spi_blacklist(&self) -> Option<Vec<u8>> {
        parse_hex_bytes(self.get("spi_blacklist")?)
    }

    /// `spi_ignorelist=` — hex-encoded opcodes issued normally but whose
    /// errors are ignored.
    pub fn spi_ignorelist(&self) -> Option<Vec<u8>> {
        parse_hex_bytes(self.get("spi_ignorelist")?)
    }

    /// `emulate=` — dummy-programmer chip name to emulate.
    pub fn emulate(&self) -> Option<&str> {
        self.get("emulate")
    }

    /// `erase_to_zero=yes|no` — whether the emulated/real erased value is
    /// `0x00` instead of the usual `0xFF`.
    pub fn erase_to_zero(&self) -> Option<bool> {
        match self.get("erase_to_zero")? {
            "yes" => Some(true),
            "no" => Some(false),
            _ => None,
        }
    }

    /// `fwh_idsel=` — 48-bit hex FWH IDSEL routing value.
    pub fn fwh_idsel(&self) -> Option<u64> {
        let raw = self.get("fwh_idsel")?;
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        u64::from_str_radix(raw, 16).ok()
    }

    /// `speed=` — programmer-specific link speed, raw string (units vary by
    /// transport, unlike `freq`).
    pub fn speed(&self) -> Option<&str> {
        self.get("speed")
    }

    /// `ich_spi_mode=auto|hwseq|swseq`.
    pub fn ich_spi_mode(&self) -> Option<IchSpiMode> {
        match self.get("ich_spi_mode")? {
            "auto" => Some(IchSpiMode::Auto),
            "hwseq" => Some(IchSpiMode::Hwseq),
            "swseq" => Some(IchSpiMode::Swseq),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_has_no_options() {
        let p = ProgrammerParams::parse("internal").unwrap();
        assert_eq!(p.name, "internal");
        assert!(p.raw.is_empty());
    }

    #[test]
    fn rejects_bare_flag_without_value() {
        assert_eq!(
            ProgrammerParams::parse("internal:foo").unwrap_err(),
            Error::InvalidAddress
        );
    }

    #[test]
    fn parses_size_with_suffix() {
        let p = ProgrammerParams::parse("dummy:size=16m").unwrap();
        assert_eq!(p.size(), Some(16 * 1024 * 1024));
        let p = ProgrammerParams::parse("dummy:size=4k").unwrap();
        assert_eq!(p.size(), Some(4096));
        let p = ProgrammerParams::parse("dummy:size=auto").unwrap();
        assert_eq!(p.size(), None);
    }

    #[test]
    fn parses_freq_with_suffix() {
        let p = ProgrammerParams::parse("internal:freq=33mhz").unwrap();
        assert_eq!(p.freq(), Some(33_000_000));
        let p = ProgrammerParams::parse("internal:freq=100khz").unwrap();
        assert_eq!(p.freq(), Some(100_000));
    }

    #[test]
    fn parses_bus_subset() {
        let p = ProgrammerParams::parse("internal:bus=lpc+fwh").unwrap();
        assert_eq!(p.bus(), alloc::vec![Bustype::Lpc, Bustype::Fwh]);
    }

    #[test]
    fn parses_spi_blacklist_hex() {
        let p = ProgrammerParams::parse("internal:spi_blacklist=0x06d8").unwrap();
        assert_eq!(p.spi_blacklist(), Some(alloc::vec![0x06, 0xd8]));
    }

    #[test]
    fn parses_ich_spi_mode() {
        let p = ProgrammerParams::parse("internal:ich_spi_mode=hwseq").unwrap();
        assert_eq!(p.ich_spi_mode(), Some(IchSpiMode::Hwseq));
    }

    #[test]
    fn parses_fwh_idsel_hex() {
        let p = ProgrammerParams::parse("internal:fwh_idsel=0x1234567890ab").unwrap();
        assert_eq!(p.fwh_idsel(), Some(0x1234567890ab));
    }

    #[test]
    fn multiple_options_all_parse() {
        let p = ProgrammerParams::parse(
            "internal:bus=spi,freq=50mhz,erase_to_zero=no,ich_spi_mode=auto",
        )
        .unwrap();
        assert_eq!(p.bus(), alloc::vec![Bustype::Spi]);
        assert_eq!(p.freq(), Some(50_000_000));
        assert_eq!(p.erase_to_zero(), Some(false));
        assert_eq!(p.ich_spi_mode(), Some(IchSpiMode::Auto));
    }
}

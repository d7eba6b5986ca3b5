//! Embedded Controller flash-update protocol.
//!
//! Some platforms keep both the core firmware and the on-board Embedded
//! Controller's own firmware in the same SPI NOR, with the EC holding a
//! read-only (RO) and a read-write (RW) copy of itself and running one of
//! the two at any given time. Overwriting the copy the EC is *currently
//! executing from* is unsafe, so updating such a chip is a small state
//! machine: arm the EC, jump it off of whichever copy is about to be
//! overwritten, run the plan, and if the plan still touched the (formerly)
//! running copy because the image replaces both, jump again and run a
//! second pass.
//!
//! This module is transport-agnostic: [`EcTransport`] is the wire-protocol
//! seam (a concrete implementation speaks the real EC host command
//! protocol over LPC/I2C/etc., see `flashprobe-internal`), and
//! [`EcUpdateSession`] drives the prepare/jump/finish state machine purely
//! in terms of that trait plus address-range arithmetic, so the sequencing
//! is unit-testable against a fake transport.

use crate::error::{Error, Result};

/// Which firmware copy the EC is currently executing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcImage {
    /// Not yet determined (no successful `get_version` call has happened).
    Unknown,
    /// Running from the read-only copy.
    Ro,
    /// Running from the read-write copy.
    Rw,
}

/// The flash offset/size of one EC firmware copy, as reported by
/// `FLASH_REGION_INFO` (or parsed from an in-image Flash Map).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcRegion {
    /// First byte of the region within the chip.
    pub offset: u32,
    /// Size of the region in bytes.
    pub size: u32,
}

impl EcRegion {
    /// Whether `[addr, addr+len)` overlaps this region at all.
    pub fn overlaps(&self, addr: u32, len: u32) -> bool {
        if len == 0 || self.size == 0 {
            return false;
        }
        let a_end = addr.saturating_add(len);
        let r_end = self.offset.saturating_add(self.size);
        addr < r_end && self.offset < a_end
    }
}

/// The two EC firmware copies and their flash offsets. Modeled against
/// exactly RO/RW, with the selection logic factored through [`EcImage`]
/// rather than a literal `bool` so a third slot could be added later
/// without reshaping the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcLayout {
    /// The read-only copy's region.
    pub ro: EcRegion,
    /// The read-write copy's region.
    pub rw: EcRegion,
}

impl EcLayout {
    /// The region backing a given image.
    pub fn region(&self, image: EcImage) -> Option<EcRegion> {
        match image {
            EcImage::Ro => Some(self.ro),
            EcImage::Rw => Some(self.rw),
            EcImage::Unknown => None,
        }
    }

    /// The image that is *not* `image` (RO<->RW); used to pick a jump
    /// target away from the currently-running copy. Returns `None` for
    /// `EcImage::Unknown` (nothing to jump away from).
    pub fn other(&self, image: EcImage) -> Option<EcImage> {
        match image {
            EcImage::Ro => Some(EcImage::Rw),
            EcImage::Rw => Some(EcImage::Ro),
            EcImage::Unknown => None,
        }
    }
}

/// Reboot target for [`EcTransport::reboot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootTarget {
    /// Jump to the read-only copy without a full reset.
    JumpRo,
    /// Jump to the read-write copy without a full reset.
    JumpRw,
    /// A full cold reboot.
    Cold,
}

/// Transport-agnostic seam for the EC host command protocol. A concrete
/// implementation (LPC, I2C, ...) speaks the real request/response framing;
/// this trait only exposes the handful of commands the update protocol
/// actually drives.
pub trait EcTransport {
    /// `GET_VERSION`: which image the EC is currently running.
    fn get_version(&mut self) -> Result<EcImage>;

    /// `FLASH_REGION_INFO` (or equivalent): the RO/RW layout.
    fn region_info(&mut self) -> Result<EcLayout>;

    /// `REBOOT_EC`: ask the EC to jump to a different image, or cold reboot.
    fn reboot(&mut self, target: RebootTarget) -> Result<()>;

    /// `FLASH_PROTECT`: set or clear soft write protection. Failure here is
    /// non-fatal (the hardware WP pin may be asserted) — callers must not
    /// treat an `Err` as aborting the whole operation, only as "protection
    /// did not change".
    fn set_write_protect(&mut self, enabled: bool) -> Result<()>;

    /// `GET_FEATURES`: whether RWSIG (the signed-RW-image boot check) is
    /// enabled on this EC.
    fn rwsig_enabled(&mut self) -> Result<bool>;
}

/// Which phase an [`EcUpdateSession`] is currently in, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcPhase {
    /// Before `prepare()` has run.
    NotStarted,
    /// Prepared: write protection handled, layout fetched, jumped off the
    /// running image.
    Prepared,
    /// First pass has run.
    FirstPassDone,
    /// A second pass is required and has not yet run.
    NeedsSecondPass,
    /// Second pass has run.
    SecondPassDone,
    /// `finish()` has run; the session is complete.
    Finished,
}

/// Driver state for one EC flash-update operation, carried across the
/// prepare / first-pass / inter-pass-jump / second-pass / finish sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcUpdateSession {
    phase: EcPhase,
    layout: Option<EcLayout>,
    /// The image that was running when `prepare()` was called.
    initial_image: EcImage,
    /// Set by `record_unit_result` when a unit overlapping the running image
    /// was denied during the first pass.
    needs_second_pass: bool,
    /// Whether the caller asked for an RW->RO preference at finish time if
    /// RWSIG isn't in play.
    try_latest_after: bool,
}

impl EcUpdateSession {
    /// A fresh, not-yet-started session.
    pub const fn new() -> Self {
        Self {
            phase: EcPhase::NotStarted,
            layout: None,
            initial_image: EcImage::Unknown,
            needs_second_pass: false,
            try_latest_after: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> EcPhase {
        self.phase
    }

    /// The image that was running when the session was prepared.
    pub fn initial_image(&self) -> EcImage {
        self.initial_image
    }

    /// Whether a second pass has been determined necessary.
    pub fn needs_second_pass(&self) -> bool {
        self.needs_second_pass
    }

    /// **Prepare**: disable soft write protection if enabled, fetch the
    /// RO/RW layout, probe the running image, and jump away from it so the
    /// first pass can freely overwrite the now-inactive copy.
    ///
    /// `set_write_protect` failures are intentionally swallowed here (the
    /// WP pin may be hardware-asserted); everything else propagates.
    pub fn prepare<T: EcTransport>(&mut self, transport: &mut T) -> Result<()> {
        if self.phase != EcPhase::NotStarted {
            return Err(Error::Misconfiguration);
        }

        let _ = transport.set_write_protect(false);

        let layout = transport.region_info()?;
        let running = transport.get_version()?;
        if running == EcImage::Unknown {
            return Err(Error::FatalHardware);
        }

        if let Some(jump_to) = layout.other(running) {
            let target = match jump_to {
                EcImage::Ro => RebootTarget::JumpRo,
                EcImage::Rw => RebootTarget::JumpRw,
                EcImage::Unknown => unreachable!("other() never returns Unknown for a known image"),
            };
            transport.reboot(target)?;
        }

        self.layout = Some(layout);
        self.initial_image = running;
        self.phase = EcPhase::Prepared;
        Ok(())
    }

    /// Record the outcome of one processing unit from the first pass:
    /// `addr`/`len` is the unit's range, `denied` is whether the engine
    /// reported `AccessDenied` for it. A denial is expected precisely when
    /// the unit overlaps the image that was running at prepare time (that
    /// copy is still live even after the jump, from the chip's perspective —
    /// only execution moved, not the bytes), and marks `needs_second_pass`.
    pub fn record_unit_result(&mut self, addr: u32, len: u32, denied: bool) -> Result<()> {
        if self.phase != EcPhase::Prepared && self.phase != EcPhase::FirstPassDone {
            return Err(Error::Misconfiguration);
        }
        if !denied {
            return Ok(());
        }
        let layout = self.layout.ok_or(Error::Misconfiguration)?;
        let running_region = layout
            .region(self.initial_image)
            .ok_or(Error::Misconfiguration)?;
        if running_region.overlaps(addr, len) {
            self.needs_second_pass = true;
        }
        Ok(())
    }

    /// Mark the first pass complete.
    pub fn finish_first_pass(&mut self) {
        if self.phase == EcPhase::Prepared {
            self.phase = if self.needs_second_pass {
                EcPhase::NeedsSecondPass
            } else {
                EcPhase::FirstPassDone
            };
        }
    }

    /// **Inter-pass jump**: pick a newly-written copy to jump to, preferring
    /// RO over RW, re-probe the running image, and return the image the
    /// caller should now treat as the live copy (the one the second pass
    /// must still avoid touching, since the chip bytes for the *other* one
    /// were fully rewritten in pass one).
    pub fn jump_for_second_pass<T: EcTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<EcImage> {
        if self.phase != EcPhase::NeedsSecondPass {
            return Err(Error::Misconfiguration);
        }

        // Prefer jumping to RO first, then RW.
        transport.reboot(RebootTarget::JumpRo)?;
        let running = transport.get_version()?;
        self.initial_image = running;
        Ok(running)
    }

    /// Mark the second pass complete.
    pub fn finish_second_pass(&mut self) -> Result<()> {
        if self.phase != EcPhase::NeedsSecondPass {
            return Err(Error::Misconfiguration);
        }
        self.phase = EcPhase::SecondPassDone;
        Ok(())
    }

    /// Ask for an RW->RO jump preference at `finish()` time when RWSIG is
    /// not in play.
    pub fn set_try_latest_after(&mut self, value: bool) {
        self.try_latest_after = value;
    }

    /// **Finish**: for an RWSIG-enabled EC, cold reboot and let the
    /// signed-image check run; otherwise, if requested, attempt an RW->RO
    /// jump.
    pub fn finish<T: EcTransport>(&mut self, transport: &mut T) -> Result<()> {
        let done = matches!(self.phase, EcPhase::FirstPassDone | EcPhase::SecondPassDone);
        if !done {
            return Err(Error::Misconfiguration);
        }

        if transport.rwsig_enabled()? {
            transport.reboot(RebootTarget::Cold)?;
        } else if self.try_latest_after {
            transport.reboot(RebootTarget::JumpRo)?;
        }

        self.phase = EcPhase::Finished;
        Ok(())
    }
}

impl Default for EcUpdateSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEc {
        running: EcImage,
        layout: EcLayout,
        rwsig: bool,
        wp_calls: u32,
        reboot_log: [Option<RebootTarget>; 8],
        reboot_count: usize,
    }

    impl FakeEc {
        fn new(running: EcImage) -> Self {
            Self {
                running,
                layout: EcLayout {
                    ro: EcRegion { offset: 0, size: 0x1000 },
                    rw: EcRegion { offset: 0x1000, size: 0x1000 },
                },
                rwsig: false,
                wp_calls: 0,
                reboot_log: [None; 8],
                reboot_count: 0,
            }
        }
    }

    impl EcTransport for FakeEc {
        fn get_version(&mut self) -> Result<EcImage> {
            Ok(self.running)
        }
        fn region_info(&mut self) -> Result<EcLayout> {
            Ok(self.layout)
        }
        fn reboot(&mut self, target: RebootTarget) -> Result<()> {
            self.reboot_log[self.reboot_count] = Some(target);
            self.reboot_count += 1;
            self.running = match target {
                RebootTarget::JumpRo => EcImage::Ro,
                RebootTarget::JumpRw => EcImage::Rw,
                RebootTarget::Cold => self.running,
            };
            Ok(())
        }
        fn set_write_protect(&mut self, _enabled: bool) -> Result<()> {
            self.wp_calls += 1;
            Ok(())
        }
        fn rwsig_enabled(&mut self) -> Result<bool> {
            Ok(self.rwsig)
        }
    }

    #[test]
    fn prepare_jumps_off_the_running_image() {
        let mut ec = FakeEc::new(EcImage::Rw);
        let mut session = EcUpdateSession::new();
        session.prepare(&mut ec).unwrap();
        assert_eq!(session.initial_image(), EcImage::Rw);
        assert_eq!(ec.reboot_log[0], Some(RebootTarget::JumpRo));
        assert_eq!(ec.running, EcImage::Ro);
    }

    #[test]
    fn overlap_with_running_image_triggers_second_pass() {
        let mut ec = FakeEc::new(EcImage::Rw);
        let mut session = EcUpdateSession::new();
        session.prepare(&mut ec).unwrap();

        // RO range write succeeds.
        session.record_unit_result(0, 0x1000, false).unwrap();
        // RW range write denied (still the image that was running).
        session.record_unit_result(0x1000, 0x1000, true).unwrap();
        session.finish_first_pass();

        assert!(session.needs_second_pass());
        assert_eq!(session.phase(), EcPhase::NeedsSecondPass);
    }

    #[test]
    fn non_overlapping_denial_does_not_trigger_second_pass() {
        let mut ec = FakeEc::new(EcImage::Rw);
        let mut session = EcUpdateSession::new();
        session.prepare(&mut ec).unwrap();

        // A denial on the RO range (not the running image) shouldn't
        // request a second pass.
        session.record_unit_result(0, 0x1000, true).unwrap();
        session.finish_first_pass();

        assert!(!session.needs_second_pass());
        assert_eq!(session.phase(), EcPhase::FirstPassDone);
    }

    #[test]
    fn full_two_pass_sequence() {
        let mut ec = FakeEc::new(EcImage::Rw);
        let mut session = EcUpdateSession::new();

        session.prepare(&mut ec).unwrap();
        session.record_unit_result(0x1000, 0x1000, true).unwrap();
        session.finish_first_pass();
        assert!(session.needs_second_pass());

        let now_running = session.jump_for_second_pass(&mut ec).unwrap();
        assert_eq!(now_running, EcImage::Ro);

        session.record_unit_result(0x1000, 0x1000, false).unwrap();
        session.finish_second_pass().unwrap();
        assert_eq!(session.phase(), EcPhase::SecondPassDone);

        session.finish(&mut ec).unwrap();
        assert_eq!(session.phase(), EcPhase::Finished);
    }

    #[test]
    fn rwsig_enabled_ec_cold_reboots_at_finish() {
        let mut ec = FakeEc::new(EcImage::Rw);
        ec.rwsig = true;
        let mut session = EcUpdateSession::new();
        session.prepare(&mut ec).unwrap();
        session.record_unit_result(0, 0x1000, false).unwrap();
        session.finish_first_pass();
        session.finish(&mut ec).unwrap();
        assert_eq!(ec.reboot_log[ec.reboot_count - 1], Some(RebootTarget::Cold));
    }

    #[test]
    fn finish_without_completed_pass_is_rejected() {
        let mut ec = FakeEc::new(EcImage::Rw);
        let mut session = EcUpdateSession::new();
        session.prepare(&mut ec).unwrap();
        assert_eq!(session.finish(&mut ec), Err(Error::Misconfiguration));
    }

    #[test]
    fn region_overlap_matches_half_open_interval_semantics() {
        let r = EcRegion { offset: 0x1000, size: 0x1000 };
        assert!(r.overlaps(0x1FFF, 1));
        assert!(!r.overlaps(0x2000, 1));
        assert!(r.overlaps(0x0F00, 0x200)); // straddles start
        assert!(!r.overlaps(0, 0x1000)); // ends exactly at region start
    }
}

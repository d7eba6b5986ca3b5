//! LPC-backed transport for the Embedded Controller host command protocol.
//!
//! Implements [`flashprobe_core::ec::EcTransport`] against the `cros_ec`-style
//! LPC interface: an 8-bit command port and data port pair, with command
//! arguments/response placed in a small shared memory window. Access to the
//! I/O ports goes through `/dev/port`, matching the privileged-access style
//! `physmap::PhysMap` already uses for `/dev/mem`.
//!
//! Only the handful of host commands the update-protocol state machine in
//! `flashprobe_core::ec` actually needs are implemented here (`GET_VERSION`,
//! `REBOOT_EC`, `FLASH_REGION_INFO`, `FLASH_PROTECT`, `GET_FEATURES`). Full
//! flash data movement over the EC's own read/write/erase commands is a
//! separate, vendor-specific programmer driver and is not this transport's
//! job.

use flashprobe_core::ec::{EcImage, EcLayout, EcRegion, EcTransport, RebootTarget};
use flashprobe_core::error::{Error as CoreError, Result as CoreResult};

use crate::error::InternalError;

/// Standard `cros_ec` LPC command port.
const EC_LPC_ADDR_HOST_CMD: u16 = 0x66;
/// Standard `cros_ec` LPC data port.
const EC_LPC_ADDR_HOST_DATA: u16 = 0x62;
/// Host command arguments/response shared memory window.
const EC_LPC_ADDR_HOST_ARGS: u16 = 0x800;
/// Host command parameter buffer, immediately after the args struct.
const EC_LPC_ADDR_HOST_PARAM: u16 = 0x804;

/// Status bit: EC is busy processing the previous command.
const EC_LPC_STATUS_BUSY: u8 = 1 << 0;

/// Command protocol version this transport speaks (v3 framing, matching
/// every `cros_ec` target shipped after ~2015).
const EC_HOST_REQUEST_VERSION: u8 = 3;

const EC_CMD_GET_VERSION: u16 = 0x0002;
const EC_CMD_REBOOT_EC: u16 = 0x00D2;
const EC_CMD_FLASH_REGION_INFO: u16 = 0x0016;
const EC_CMD_FLASH_PROTECT: u16 = 0x0015;
const EC_CMD_GET_FEATURES: u16 = 0x000D;

const EC_REBOOT_JUMP_RO: u8 = 4;
const EC_REBOOT_JUMP_RW: u8 = 5;
const EC_REBOOT_COLD: u8 = 2;

const EC_IMAGE_UNKNOWN: u32 = 0;
const EC_IMAGE_RO: u32 = 1;
const EC_IMAGE_RW: u32 = 2;

/// Bit in the `FLASH_PROTECT` response/feature flags indicating RWSIG
/// (signed-RW-image boot verification) is compiled into this EC.
const EC_FEATURE_RWSIG: u32 = 1 << 21;

const FLASH_PROTECT_RO_NOW: u32 = 1 << 1;

const FLASH_REGION_RO: u32 = 0;
const FLASH_REGION_RW: u32 = 1;

/// Maximum time to wait for the EC to finish processing a command.
const COMMAND_TIMEOUT_MS: u32 = 1000;

/// Raw I/O-port access via `/dev/port`, privileged like `PhysMap`'s use of
/// `/dev/mem`.
#[cfg(all(feature = "std", target_os = "linux"))]
struct PortIo {
    file: std::fs::File,
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl PortIo {
    fn open() -> Result<Self, InternalError> {
        use std::fs::OpenOptions;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/port")
            .map_err(|_| InternalError::Io("failed to open /dev/port"))?;
        Ok(Self { file })
    }

    fn read8(&mut self, port: u16) -> Result<u8, InternalError> {
        use std::io::{Read, Seek, SeekFrom};
        self.file
            .seek(SeekFrom::Start(port as u64))
            .map_err(|_| InternalError::Io("seek on /dev/port failed"))?;
        let mut buf = [0u8; 1];
        self.file
            .read_exact(&mut buf)
            .map_err(|_| InternalError::Io("read on /dev/port failed"))?;
        Ok(buf[0])
    }

    fn write8(&mut self, port: u16, value: u8) -> Result<(), InternalError> {
        use std::io::{Seek, SeekFrom, Write};
        self.file
            .seek(SeekFrom::Start(port as u64))
            .map_err(|_| InternalError::Io("seek on /dev/port failed"))?;
        self.file
            .write_all(&[value])
            .map_err(|_| InternalError::Io("write on /dev/port failed"))?;
        Ok(())
    }
}

/// LPC transport for the EC host command protocol.
#[cfg(all(feature = "std", target_os = "linux"))]
pub struct EcLpcTransport {
    io: PortIo,
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl EcLpcTransport {
    /// Open the LPC transport. Requires the ability to access `/dev/port`
    /// (typically root).
    pub fn new() -> Result<Self, InternalError> {
        Ok(Self { io: PortIo::open()? })
    }

    fn wait_not_busy(&mut self) -> CoreResult<()> {
        for _ in 0..COMMAND_TIMEOUT_MS {
            let status = self
                .io
                .read8(EC_LPC_ADDR_HOST_CMD)
                .map_err(|_| CoreError::TransactionError)?;
            if status & EC_LPC_STATUS_BUSY == 0 {
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        Err(CoreError::Timeout)
    }

    /// Send a v3 host command with an 8-byte little-endian parameter blob
    /// and read back an 8-byte little-endian response (enough for every
    /// command this transport actually issues).
    fn command(&mut self, command: u16, params: &[u8]) -> CoreResult<[u8; 8]> {
        self.wait_not_busy()?;

        // Minimal v3 request header: version, checksum, command, size.
        // Checksum is the byte-sum of the whole request (header + params)
        // such that the total sum mod 256 is zero, per the real protocol.
        let mut header = [0u8; 8];
        header[0] = EC_HOST_REQUEST_VERSION;
        header[2] = (command & 0xFF) as u8;
        header[3] = (command >> 8) as u8;
        header[4] = params.len() as u8;

        let mut sum: u8 = 0;
        for &b in header.iter().chain(params.iter()) {
            sum = sum.wrapping_add(b);
        }
        header[1] = 0u8.wrapping_sub(sum);

        for (i, &b) in header.iter().enumerate() {
            self.io
                .write8(EC_LPC_ADDR_HOST_ARGS + i as u16, b)
                .map_err(|_| CoreError::TransactionError)?;
        }
        for (i, &b) in params.iter().enumerate() {
            self.io
                .write8(EC_LPC_ADDR_HOST_PARAM + i as u16, b)
                .map_err(|_| CoreError::TransactionError)?;
        }

        self.io
            .write8(EC_LPC_ADDR_HOST_CMD, 0)
            .map_err(|_| CoreError::TransactionError)?;

        self.wait_not_busy()?;

        let status = self
            .io
            .read8(EC_LPC_ADDR_HOST_DATA)
            .map_err(|_| CoreError::TransactionError)?;
        if status != 0 {
            return Err(CoreError::TransactionError);
        }

        let mut resp = [0u8; 8];
        for (i, slot) in resp.iter_mut().enumerate() {
            *slot = self
                .io
                .read8(EC_LPC_ADDR_HOST_PARAM + i as u16)
                .map_err(|_| CoreError::TransactionError)?;
        }
        Ok(resp)
    }
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl EcTransport for EcLpcTransport {
    fn get_version(&mut self) -> CoreResult<EcImage> {
        let resp = self.command(EC_CMD_GET_VERSION, &[])?;
        let current_image = u32::from_le_bytes([resp[0], resp[1], resp[2], resp[3]]);
        Ok(match current_image {
            EC_IMAGE_RO => EcImage::Ro,
            EC_IMAGE_RW => EcImage::Rw,
            EC_IMAGE_UNKNOWN => EcImage::Unknown,
            _ => EcImage::Unknown,
        })
    }

    fn region_info(&mut self) -> CoreResult<EcLayout> {
        let ro_resp = self.command(
            EC_CMD_FLASH_REGION_INFO,
            &FLASH_REGION_RO.to_le_bytes(),
        )?;
        let rw_resp = self.command(
            EC_CMD_FLASH_REGION_INFO,
            &FLASH_REGION_RW.to_le_bytes(),
        )?;

        let ro = EcRegion {
            offset: u32::from_le_bytes([ro_resp[0], ro_resp[1], ro_resp[2], ro_resp[3]]),
            size: u32::from_le_bytes([ro_resp[4], ro_resp[5], ro_resp[6], ro_resp[7]]),
        };
        let rw = EcRegion {
            offset: u32::from_le_bytes([rw_resp[0], rw_resp[1], rw_resp[2], rw_resp[3]]),
            size: u32::from_le_bytes([rw_resp[4], rw_resp[5], rw_resp[6], rw_resp[7]]),
        };
        Ok(EcLayout { ro, rw })
    }

    fn reboot(&mut self, target: RebootTarget) -> CoreResult<()> {
        let subcmd = match target {
            RebootTarget::JumpRo => EC_REBOOT_JUMP_RO,
            RebootTarget::JumpRw => EC_REBOOT_JUMP_RW,
            RebootTarget::Cold => EC_REBOOT_COLD,
        };
        self.command(EC_CMD_REBOOT_EC, &[subcmd, 0])?;
        Ok(())
    }

    fn set_write_protect(&mut self, enabled: bool) -> CoreResult<()> {
        let flags: u32 = if enabled { FLASH_PROTECT_RO_NOW } else { 0 };
        let mut params = [0u8; 8];
        params[4..8].copy_from_slice(&flags.to_le_bytes());
        self.command(EC_CMD_FLASH_PROTECT, &params)?;
        Ok(())
    }

    fn rwsig_enabled(&mut self) -> CoreResult<bool> {
        let resp = self.command(EC_CMD_GET_FEATURES, &[])?;
        let flags0 = u32::from_le_bytes([resp[0], resp[1], resp[2], resp[3]]);
        Ok(flags0 & EC_FEATURE_RWSIG != 0)
    }
}

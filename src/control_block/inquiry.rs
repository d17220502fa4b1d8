// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! INQUIRY (6) — CDB filler plus the identity parser for its response.
//!
//! CDB layout (SPC):
//!   [0] = 0x12 (INQUIRY)
//!   [1] = EVPD (bit 0); always 0 here, standard inquiry only
//!   [2] = Page Code (0 when EVPD=0)
//!   [3] = reserved
//!   [4] = Allocation Length (u8)
//!   [5] = Control

use std::fmt;

use anyhow::{Result, bail};

use crate::control_block::CDB6_LEN;

pub const INQUIRY_OPCODE: u8 = 0x12;

/// Bytes of standard INQUIRY data requested; enough to cover the
/// peripheral byte, manufacturer and model fields.
pub const INQUIRY_ALLOCATION_LEN: u8 = 0x20;

/// Fill a **Standard INQUIRY (EVPD=0)** CDB: `12 00 00 00 20 00`.
#[inline]
pub fn fill_inquiry(cdb: &mut [u8; CDB6_LEN]) {
    cdb.fill(0);
    cdb[0] = INQUIRY_OPCODE;
    cdb[4] = INQUIRY_ALLOCATION_LEN;
}

/// Peripheral device type, low 5 bits of INQUIRY byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Disk,                   // 0x00
    Tape,                   // 0x01
    Printer,                // 0x02
    Processor,              // 0x03
    Worm,                   // 0x04
    CdRom,                  // 0x05
    Scanner,                // 0x06
    OpticalDisk,            // 0x07
    MediaChanger,           // 0x08
    Communication,          // 0x09
    StorageArrayController, // 0x0C
    Unknown(u8),
}

impl From<u8> for DeviceType {
    fn from(value: u8) -> Self {
        match value & 0x1F {
            0x00 => DeviceType::Disk,
            0x01 => DeviceType::Tape,
            0x02 => DeviceType::Printer,
            0x03 => DeviceType::Processor,
            0x04 => DeviceType::Worm,
            0x05 => DeviceType::CdRom,
            0x06 => DeviceType::Scanner,
            0x07 => DeviceType::OpticalDisk,
            0x08 => DeviceType::MediaChanger,
            0x09 => DeviceType::Communication,
            0x0C => DeviceType::StorageArrayController,
            other => DeviceType::Unknown(other),
        }
    }
}

impl DeviceType {
    /// Only direct-access and optical-memory devices accept FORMAT UNIT
    /// in this design; everything else is a hard stop.
    #[inline]
    pub fn supports_format_unit(&self) -> bool {
        matches!(self, DeviceType::Disk | DeviceType::OpticalDisk)
    }

    pub fn description(&self) -> &'static str {
        match *self {
            DeviceType::Disk => "Disk",
            DeviceType::Tape => "Tape",
            DeviceType::Printer => "Printer",
            DeviceType::Processor => "Processor",
            DeviceType::Worm => "WORM",
            DeviceType::CdRom => "CDROM",
            DeviceType::Scanner => "Scanner",
            DeviceType::OpticalDisk => "Optical disk",
            DeviceType::MediaChanger => "Media changer",
            DeviceType::Communication => "Communication",
            DeviceType::StorageArrayController => "Storage array controller",
            DeviceType::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Whether the addressed logical unit is actually there, from the
/// peripheral qualifier in the top 3 bits of INQUIRY byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LunPresence {
    Present,             // 000
    SupportedNotPresent, // 001
    NotSupported,        // 011
    Indeterminate(u8),
}

impl From<u8> for LunPresence {
    fn from(value: u8) -> Self {
        match (value >> 5) & 0x07 {
            0b000 => LunPresence::Present,
            0b001 => LunPresence::SupportedNotPresent,
            0b011 => LunPresence::NotSupported,
            other => LunPresence::Indeterminate(other),
        }
    }
}

/// Bus address of the device behind a channel, reported out-of-band by
/// the transport rather than by INQUIRY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    pub scsi_id: i32,
    pub lun: i32,
    pub host_no: i32,
    pub channel: i32,
}

/// Everything the workflow knows about the device before asking the
/// user to confirm. Derived once from the INQUIRY payload, immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub lun_presence: LunPresence,
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub model: String,
    pub address: Option<DeviceAddress>,
}

/// Parse a standard INQUIRY payload (the first `INQUIRY_ALLOCATION_LEN`
/// bytes) into a `DeviceIdentity`. The bus address is filled in later.
pub fn parse_inquiry(buf: &[u8]) -> Result<DeviceIdentity> {
    if buf.len() < INQUIRY_ALLOCATION_LEN as usize {
        bail!("INQUIRY buffer too short: {}", buf.len());
    }
    let b0 = buf[0];

    Ok(DeviceIdentity {
        lun_presence: LunPresence::from(b0),
        device_type: DeviceType::from(b0),
        manufacturer: trim_ascii(&buf[8..16]),
        model: trim_ascii(&buf[16..32]),
        address: None,
    })
}

fn trim_ascii(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(peripheral: u8) -> Vec<u8> {
        let mut b = vec![0u8; INQUIRY_ALLOCATION_LEN as usize];
        b[0] = peripheral;
        b[8..16].copy_from_slice(b"SEAGATE ");
        b[16..32].copy_from_slice(b"ST39102LW       ");
        b
    }

    #[test]
    fn inquiry_cdb_bytes() {
        let mut cdb = [0xFFu8; CDB6_LEN];
        fill_inquiry(&mut cdb);
        assert_eq!(cdb, [0x12, 0x00, 0x00, 0x00, 0x20, 0x00]);
    }

    #[test]
    fn parse_present_disk() {
        let id = parse_inquiry(&payload(0x00)).expect("WTF");
        assert_eq!(id.lun_presence, LunPresence::Present);
        assert_eq!(id.device_type, DeviceType::Disk);
        assert!(id.device_type.supports_format_unit());
        assert_eq!(id.manufacturer, "SEAGATE");
        assert_eq!(id.model, "ST39102LW");
    }

    #[test]
    fn qualifier_001_is_supported_not_present() {
        let id = parse_inquiry(&payload(0b001_00000)).expect("WTF");
        assert_eq!(id.lun_presence, LunPresence::SupportedNotPresent);
    }

    #[test]
    fn qualifier_011_is_not_supported() {
        let id = parse_inquiry(&payload(0b011_00000)).expect("WTF");
        assert_eq!(id.lun_presence, LunPresence::NotSupported);
    }

    #[test]
    fn tape_does_not_support_format_unit() {
        let id = parse_inquiry(&payload(0x01)).expect("WTF");
        assert_eq!(id.device_type, DeviceType::Tape);
        assert!(!id.device_type.supports_format_unit());
    }

    #[test]
    fn optical_disk_supports_format_unit() {
        let id = parse_inquiry(&payload(0x07)).expect("WTF");
        assert_eq!(id.device_type, DeviceType::OpticalDisk);
        assert!(id.device_type.supports_format_unit());
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(parse_inquiry(&[0u8; 31]).is_err());
    }
}

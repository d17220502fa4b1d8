// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};

/// Fixed-format sense data needs the bytes up to and including the ASCQ.
pub const FIXED_MIN_LEN: usize = 14;

/// Sense key, the high-level error class in byte 2 of fixed-format sense.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SenseKey {
    NoSense,        // 0x0
    RecoveredError, // 0x1
    NotReady,       // 0x2
    MediumError,    // 0x3
    HardwareError,  // 0x4
    IllegalRequest, // 0x5
    UnitAttention,  // 0x6
    DataProtect,    // 0x7
    BlankCheck,     // 0x8
    VendorSpecific, // 0x9
    CopyAborted,    // 0xA
    AbortedCommand, // 0xB
    Equal,          // 0xC (obsolete)
    VolumeOverflow, // 0xD
    Miscompare,     // 0xE
    Reserved(u8),   // 0xF
}

impl From<u8> for SenseKey {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0x0 => SenseKey::NoSense,
            0x1 => SenseKey::RecoveredError,
            0x2 => SenseKey::NotReady,
            0x3 => SenseKey::MediumError,
            0x4 => SenseKey::HardwareError,
            0x5 => SenseKey::IllegalRequest,
            0x6 => SenseKey::UnitAttention,
            0x7 => SenseKey::DataProtect,
            0x8 => SenseKey::BlankCheck,
            0x9 => SenseKey::VendorSpecific,
            0xA => SenseKey::CopyAborted,
            0xB => SenseKey::AbortedCommand,
            0xC => SenseKey::Equal,
            0xD => SenseKey::VolumeOverflow,
            0xE => SenseKey::Miscompare,
            other => SenseKey::Reserved(other),
        }
    }
}

impl SenseKey {
    pub fn description(&self) -> &'static str {
        match *self {
            SenseKey::NoSense => "No sense",
            SenseKey::RecoveredError => "Recovered error",
            SenseKey::NotReady => "Not ready",
            SenseKey::MediumError => "Medium error",
            SenseKey::HardwareError => "Hardware error",
            SenseKey::IllegalRequest => "Illegal request",
            SenseKey::UnitAttention => "Unit attention",
            SenseKey::DataProtect => "Data protect",
            SenseKey::BlankCheck => "Blank check",
            SenseKey::VendorSpecific => "Vendor specific",
            SenseKey::CopyAborted => "Copy aborted",
            SenseKey::AbortedCommand => "Aborted command",
            SenseKey::Equal => "Equal (obsolete)",
            SenseKey::VolumeOverflow => "Volume overflow",
            SenseKey::Miscompare => "Miscompare",
            SenseKey::Reserved(_) => "Reserved",
        }
    }
}

impl fmt::Debug for SenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Fixed-format sense data as carried in the 16-byte envelope sense buffer.
///
/// The buffer truncates the full SPC layout, so only the fields through
/// the ASCQ are modeled; FRU and sense-key-specific bytes never fit.
#[derive(Default, PartialEq, Clone)]
pub struct SenseData {
    pub valid: bool,        // bit7 of byte0
    pub response_code: u8,  // low-7 bits of byte0
    pub sense_key: u8,      // low-4 bits of byte2
    pub ili: bool,          // bit5 of byte2
    pub eom: bool,          // bit6 of byte2
    pub filemark: bool,     // bit7 of byte2
    pub information: u32,   // bytes 3-6
    pub additional_len: u8, // byte7
    pub cmd_specific: u32,  // bytes 8-11
    pub asc: u8,            // Additional Sense Code
    pub ascq: u8,           // Additional Sense Code Qualifier
}

impl SenseData {
    /// Parse fixed-format sense data (response codes 0x70/0x71).
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIXED_MIN_LEN {
            return Err(anyhow!(
                "sense buffer too small: {} < {FIXED_MIN_LEN}",
                buf.len()
            ));
        }

        let valid = buf[0] & 0x80 != 0;
        let response_code = buf[0] & 0x7F;
        if response_code != 0x70 && response_code != 0x71 {
            bail!("not fixed-format sense data: response code {response_code:#04x}");
        }

        let filemark = buf[2] & 0x80 != 0;
        let eom = buf[2] & 0x40 != 0;
        let ili = buf[2] & 0x20 != 0;
        let sense_key = buf[2] & 0x0F;

        let information = u32::from_be_bytes(
            buf[3..7]
                .try_into()
                .context("failed to read Information field (bytes 3‥6)")?,
        );

        let additional_len = buf[7];

        let cmd_specific = u32::from_be_bytes(
            buf[8..12]
                .try_into()
                .context("failed to read Cmd-specific field (bytes 8‥11)")?,
        );

        Ok(Self {
            valid,
            response_code,
            sense_key,
            ili,
            eom,
            filemark,
            information,
            additional_len,
            cmd_specific,
            asc: buf[12],
            ascq: buf[13],
        })
    }

    pub fn key(&self) -> SenseKey {
        SenseKey::from(self.sense_key)
    }

    /// True when the device reports the command succeeded after an
    /// internal retry.
    pub fn is_recovered(&self) -> bool {
        self.key() == SenseKey::RecoveredError
    }
}

impl fmt::Debug for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseData")
            .field("valid", &self.valid)
            .field(
                "response_code",
                &format_args!("{:#04x}", self.response_code),
            )
            .field("sense_key", &self.key())
            .field("filemark", &self.filemark)
            .field("eom", &self.eom)
            .field("ili", &self.ili)
            .field("information", &self.information)
            .field("additional_len", &self.additional_len)
            .field("cmd_specific", &self.cmd_specific)
            .field("asc", &format_args!("{:#04x}", self.asc))
            .field("ascq", &format_args!("{:#04x}", self.ascq))
            .field("description", &asc_ascq_to_str(self.asc, self.ascq))
            .finish()
    }
}

/// Return the SPC description for a given ASC/ASCQ pair.
///
/// * If the pair is not present in the official table, returns `"UNSPECIFIED /
///   vendor specific"`.
#[inline]
pub fn asc_ascq_to_str(asc: u8, ascq: u8) -> &'static str {
    hot_table(asc, ascq).unwrap_or("UNSPECIFIED / vendor specific")
}

fn hot_table(asc: u8, ascq: u8) -> Option<&'static str> {
    Some(match (asc, ascq) {
        (0x00, 0x00) => "No additional sense information",
        (0x04, 0x01) => "Logical unit is in process of becoming ready",
        (0x04, 0x04) => "Not ready – LUN not ready, format in progress",
        (0x17, 0x01) => "Recovered data with retries",
        (0x18, 0x00) => "Recovered data with ECC",
        (0x1A, 0x00) => "Illegal request – parameter list length error",
        (0x20, 0x00) => "Illegal request – invalid command operation code",
        (0x24, 0x00) => "Illegal request – invalid field in CDB",
        (0x25, 0x00) => "Illegal request – logical unit not supported",
        (0x26, 0x00) => "Illegal request – invalid field in parameter list",
        (0x31, 0x00) => "Medium error – medium format corrupted",
        (0x31, 0x01) => "Medium error – format command failed",
        (0x3A, 0x00) => "Medium not present",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_sense(key: u8, asc: u8, ascq: u8) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0] = 0x70;
        buf[2] = key;
        buf[7] = 0x08;
        buf[12] = asc;
        buf[13] = ascq;
        buf
    }

    #[test]
    fn parse_recovered_error() {
        let sense = SenseData::parse(&fixed_sense(0x01, 0x17, 0x01)).expect("WTF");
        assert!(sense.is_recovered());
        assert_eq!(sense.key(), SenseKey::RecoveredError);
        assert_eq!(asc_ascq_to_str(sense.asc, sense.ascq), "Recovered data with retries");
    }

    #[test]
    fn parse_rejects_non_fixed_format() {
        let mut buf = fixed_sense(0x03, 0x31, 0x00);
        buf[0] = 0x72; // descriptor format
        assert!(SenseData::parse(&buf).is_err());
    }

    #[test]
    fn parse_rejects_short_buffers() {
        assert!(SenseData::parse(&[0x70; 13]).is_err());
    }

    #[test]
    fn zeroed_buffer_is_not_sense_data() {
        assert!(SenseData::parse(&[0u8; 16]).is_err());
    }
}

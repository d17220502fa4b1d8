// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use zerocopy::{
    FromBytes as ZFromBytes, I32, Immutable, IntoBytes, KnownLayout, NativeEndian, U16,
};

use crate::{
    envelope::{
        HEADER_LEN, SG_MAX_SENSE,
        sense::SenseData,
    },
    status::{DriverStatus, HostStatus, OutcomeCategory, TargetStatus, classify},
};

/// Response envelope header.
///
/// Layout (native-endian, offsets in bytes):
///   [0..4]   pack_id       — correlation id of the request being answered
///   [4]      target_status — masked status reported by the device
///   [5..7]   host_status   — host adapter tier
///   [7..9]   driver_status — driver tier (low nibble code, high nibble hints)
///   [9..25]  sense_buffer
///   [25..36] reserved
/// The inbound payload follows immediately.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ResponseHeader {
    pub pack_id: I32<NativeEndian>,
    pub target_status: u8,
    pub host_status: U16<NativeEndian>,
    pub driver_status: U16<NativeEndian>,
    pub sense_buffer: [u8; SG_MAX_SENSE],
    reserved: [u8; 11],
}

const _: () = assert!(size_of::<ResponseHeader>() == HEADER_LEN);

impl ResponseHeader {
    pub fn new(
        pack_id: i32,
        target_status: u8,
        host_status: u16,
        driver_status: u16,
        sense: &[u8],
    ) -> Self {
        let mut sense_buffer = [0u8; SG_MAX_SENSE];
        let n = sense.len().min(SG_MAX_SENSE);
        sense_buffer[..n].copy_from_slice(&sense[..n]);
        Self {
            pack_id: I32::new(pack_id),
            target_status,
            host_status: U16::new(host_status),
            driver_status: U16::new(driver_status),
            sense_buffer,
            reserved: [0u8; 11],
        }
    }
}

/// Response shorter than the fixed envelope header.
#[derive(Debug, Error)]
#[error("malformed response envelope: {len} bytes, header needs {HEADER_LEN}")]
pub struct MalformedResponse {
    pub len: usize,
}

/// A decoded response: header fields plus whatever payload followed them.
/// Constructed fresh per transaction and discarded after classification.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub header: ResponseHeader,
    pub payload: Bytes,
}

impl ResponseEnvelope {
    pub fn pack_id(&self) -> i32 {
        self.header.pack_id.get()
    }

    pub fn target_status(&self) -> TargetStatus {
        TargetStatus::from(self.header.target_status)
    }

    pub fn host_status(&self) -> HostStatus {
        HostStatus::from(self.header.host_status.get())
    }

    pub fn driver_status(&self) -> DriverStatus {
        DriverStatus(self.header.driver_status.get())
    }

    /// Fixed-format sense data, when the buffer holds any.
    pub fn sense(&self) -> Option<SenseData> {
        SenseData::parse(&self.header.sense_buffer).ok()
    }

    /// Run the three-tier status classification for this response.
    pub fn classify(&self) -> OutcomeCategory {
        classify(
            self.target_status(),
            self.host_status(),
            self.driver_status(),
            &self.header.sense_buffer,
        )
    }
}

/// Decode a response envelope out of a raw reply buffer.
pub fn decode_response(buf: &[u8]) -> Result<ResponseEnvelope, MalformedResponse> {
    let (header, payload) = ResponseHeader::read_from_prefix(buf)
        .map_err(|_| MalformedResponse { len: buf.len() })?;
    Ok(ResponseEnvelope {
        header,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Serialize a response envelope; the counterpart of `decode_response`,
/// used by loopback channels and tests.
pub fn encode_response(header: &ResponseHeader, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I32, Immutable, IntoBytes, KnownLayout, NativeEndian, U32,
};

use crate::{control_block::CDB6_LEN, envelope::HEADER_LEN};

/// Request envelope header.
///
/// Layout (native-endian, offsets in bytes):
///   [0..4]  reply_len    — budget for the whole reply, header included
///   [4..8]  pack_id      — correlation id echoed back by the channel
///   [8]     twelve_byte  — 1 when the payload starts with a 12-byte CDB
///   [9..36] reserved
/// The CDB and any outbound parameter data follow immediately.
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RequestHeader {
    pub reply_len: U32<NativeEndian>,
    pub pack_id: I32<NativeEndian>,
    pub twelve_byte: u8,
    reserved: [u8; 27],
}

const _: () = assert!(size_of::<RequestHeader>() == HEADER_LEN);

/// Builder for request envelopes.
///
/// The reply budget must cover at least the response header; `build`
/// refuses envelopes that could not possibly carry their own reply.
#[derive(Debug, Default)]
pub struct RequestEnvelopeBuilder {
    header: RequestHeader,
    payload: Vec<u8>,
}

impl RequestEnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply-length budget for this transaction, in bytes
    /// (response header included).
    pub fn reply_budget(mut self, bytes: u32) -> Self {
        self.header.reply_len.set(bytes);
        self
    }

    /// Set the correlation id the channel is expected to echo back.
    pub fn pack_id(mut self, id: i32) -> Self {
        self.header.pack_id.set(id);
        self
    }

    /// Mark the payload as starting with a 12-byte CDB.
    pub fn twelve_byte(mut self) -> Self {
        self.header.twelve_byte = 1;
        self
    }

    /// Set the 6-byte CDB; it must be the first thing in the payload.
    pub fn cdb(mut self, cdb: &[u8; CDB6_LEN]) -> Self {
        self.payload.extend_from_slice(cdb);
        self
    }

    /// Append outbound parameter data after the CDB.
    pub fn append_data(mut self, more: &[u8]) -> Self {
        self.payload.extend_from_slice(more);
        self
    }

    /// Serialize header + payload into one contiguous buffer.
    pub fn build(self) -> Result<BytesMut> {
        if (self.header.reply_len.get() as usize) < HEADER_LEN {
            bail!(
                "reply budget {} below envelope header size {HEADER_LEN}",
                self.header.reply_len.get()
            );
        }
        if self.payload.is_empty() {
            bail!("request envelope carries no CDB");
        }
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(self.header.as_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

/// Encode a request envelope in one call.
pub fn encode_request(
    pack_id: i32,
    reply_budget: u32,
    twelve_byte: bool,
    payload: &[u8],
) -> Result<BytesMut> {
    let mut builder = RequestEnvelopeBuilder::new()
        .pack_id(pack_id)
        .reply_budget(reply_budget)
        .append_data(payload);
    if twelve_byte {
        builder = builder.twelve_byte();
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_fixed() {
        let buf = encode_request(7, 0x40, false, &[0x12, 0, 0, 0, 0x20, 0]).expect("WTF");
        assert_eq!(buf.len(), HEADER_LEN + 6);
        assert_eq!(&buf[0..4], &0x40u32.to_ne_bytes());
        assert_eq!(&buf[4..8], &7i32.to_ne_bytes());
        assert_eq!(buf[8], 0);
        assert!(buf[9..HEADER_LEN].iter().all(|&b| b == 0));
        assert_eq!(&buf[HEADER_LEN..], &[0x12, 0, 0, 0, 0x20, 0]);
    }

    #[test]
    fn reply_budget_below_header_is_rejected() {
        let err = encode_request(0, (HEADER_LEN - 1) as u32, false, &[0x04; 6]);
        assert!(err.is_err());
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(encode_request(0, HEADER_LEN as u32, false, &[]).is_err());
    }
}

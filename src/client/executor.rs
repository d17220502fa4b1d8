// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    io,
    sync::atomic::{AtomicI32, Ordering},
    time::Duration,
};

use bytes::BytesMut;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    client::channel::Channel,
    control_block::CDB6_LEN,
    envelope::{
        HEADER_LEN,
        request::RequestEnvelopeBuilder,
        response::{ResponseEnvelope, decode_response},
        sense::SenseData,
    },
    status::{DriverStatus, HostStatus, OutcomeCategory, TargetStatus},
};

/// Everything that can terminate a single transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to write request envelope to the channel")]
    TransportWriteFailed(#[source] io::Error),

    #[error("failed to read response envelope from the channel")]
    TransportReadFailed(#[source] io::Error),

    #[error("malformed response envelope ({0} bytes)")]
    MalformedResponse(usize),

    #[error(
        "command rejected: {category:?} (target {target:?}, host {host:?}, \
         driver {driver:?})"
    )]
    CommandRejected {
        category: OutcomeCategory,
        target: TargetStatus,
        host: HostStatus,
        driver: DriverStatus,
        sense: Option<SenseData>,
    },
}

/// One command ready to be driven through a channel: the CDB, any
/// outbound parameter data, the reply budget and an optional
/// outstanding-command timeout.
///
/// The reply budget always covers the response header; constructors
/// only ever add expected payload bytes on top of it.
#[derive(Debug, Clone)]
pub struct Transaction {
    cdb: [u8; CDB6_LEN],
    data_out: Vec<u8>,
    reply_len: u32,
    timeout: Option<Duration>,
}

impl Transaction {
    pub fn new(cdb: [u8; CDB6_LEN]) -> Self {
        Self {
            cdb,
            data_out: Vec::new(),
            reply_len: HEADER_LEN as u32,
            timeout: None,
        }
    }

    /// Attach outbound parameter data (sent right after the CDB).
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data_out = data;
        self
    }

    /// Expect `bytes` of inbound payload on top of the response header.
    pub fn with_reply_payload(mut self, bytes: u32) -> Self {
        self.reply_len = HEADER_LEN as u32 + bytes;
        self
    }

    /// Raise the channel timeout before this command is written.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.cdb[0]
    }

    #[inline]
    pub fn reply_budget(&self) -> u32 {
        self.reply_len
    }
}

/// Drive one transaction through the channel: encode, write, read,
/// decode, classify.
///
/// A correlation-id mismatch between request and response is logged and
/// tolerated; the channel is used strictly one-in-one-out, so a
/// mismatch cannot corrupt subsequent transactions. `RecoveredError`
/// outcomes are logged and treated as success; only `FatalError`
/// rejects the command.
pub async fn execute<C: Channel>(
    chan: &mut C,
    pack_ids: &AtomicI32,
    txn: &Transaction,
) -> Result<ResponseEnvelope, TransactionError> {
    let pack_id = pack_ids.fetch_add(1, Ordering::SeqCst);

    if let Some(timeout) = txn.timeout {
        chan.set_timeout(timeout)
            .await
            .map_err(TransactionError::TransportWriteFailed)?;
    }

    let request = RequestEnvelopeBuilder::new()
        .pack_id(pack_id)
        .reply_budget(txn.reply_len)
        .cdb(&txn.cdb)
        .append_data(&txn.data_out)
        .build()
        .expect("reply budget always covers the header by construction");

    debug!(
        opcode = txn.opcode(),
        pack_id,
        request_len = request.len(),
        reply_budget = txn.reply_len,
        "sending command"
    );

    let written = chan
        .write(&request)
        .await
        .map_err(TransactionError::TransportWriteFailed)?;
    if written < request.len() {
        return Err(TransactionError::TransportWriteFailed(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {written} of {} bytes", request.len()),
        )));
    }

    let mut buf = BytesMut::zeroed(txn.reply_len as usize);
    let received = chan
        .read(&mut buf)
        .await
        .map_err(TransactionError::TransportReadFailed)?;
    if received == 0 {
        return Err(TransactionError::TransportReadFailed(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "channel returned no response envelope",
        )));
    }

    let envelope = decode_response(&buf[..received])
        .map_err(|e| TransactionError::MalformedResponse(e.len))?;

    if envelope.pack_id() != pack_id {
        // This shouldn't happen on a one-in-one-out channel.
        warn!(
            wanted = pack_id,
            got = envelope.pack_id(),
            "correlation id mismatch on response envelope"
        );
    }

    let category = envelope.classify();
    match category {
        OutcomeCategory::Clean => {
            debug!(opcode = txn.opcode(), category = ?category, "command successful");
            Ok(envelope)
        },
        OutcomeCategory::RecoveredError => {
            warn!(
                opcode = txn.opcode(),
                category = ?category,
                sense = ?envelope.sense(),
                "recovered error, continuing"
            );
            Ok(envelope)
        },
        OutcomeCategory::FatalError => Err(TransactionError::CommandRejected {
            category,
            target: envelope.target_status(),
            host: envelope.host_status(),
            driver: envelope.driver_status(),
            sense: envelope.sense(),
        }),
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared test doubles: a scripted channel and canned envelopes.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use setblocksize_rs::{
    client::channel::Channel,
    control_block::inquiry::{DeviceAddress, DeviceIdentity, INQUIRY_ALLOCATION_LEN},
    envelope::response::{ResponseHeader, encode_response},
    state_machine::common::ConfirmGate,
};

/// A channel scripted with queued response envelopes; records every
/// write and timeout change for call-shape assertions.
#[derive(Default)]
pub struct MockChannel {
    pub written: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub timeouts: Vec<Duration>,
    pub address: Option<DeviceAddress>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&mut self, bytes: Vec<u8>) {
        self.responses.push_back(bytes);
    }
}

impl Channel for MockChannel {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.push(buf.to_vec());
        Ok(buf.len())
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rsp = self.responses.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted response left")
        })?;
        let n = rsp.len().min(buf.len());
        buf[..n].copy_from_slice(&rsp[..n]);
        Ok(n)
    }

    async fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }

    async fn address(&mut self) -> io::Result<Option<DeviceAddress>> {
        Ok(self.address)
    }
}

/// A confirmation gate with a fixed answer and a shared call counter.
pub struct AutoConfirm {
    pub answer: bool,
    pub calls: Arc<AtomicUsize>,
}

impl AutoConfirm {
    pub fn yes() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                answer: true,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    pub fn no() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                answer: false,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl ConfirmGate for AutoConfirm {
    async fn confirm(&mut self, _identity: &DeviceIdentity) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

/// Serialize a response envelope with the given status triple and sense.
pub fn response_bytes(
    pack_id: i32,
    target: u8,
    host: u16,
    driver: u16,
    sense: &[u8],
    payload: &[u8],
) -> Vec<u8> {
    let header = ResponseHeader::new(pack_id, target, host, driver, sense);
    encode_response(&header, payload).to_vec()
}

/// An all-good response envelope carrying `payload`.
pub fn good_response(pack_id: i32, payload: &[u8]) -> Vec<u8> {
    response_bytes(pack_id, 0, 0, 0, &[], payload)
}

/// A standard INQUIRY payload with the given peripheral byte.
pub fn inquiry_payload(peripheral: u8) -> Vec<u8> {
    let mut b = vec![0u8; INQUIRY_ALLOCATION_LEN as usize];
    b[0] = peripheral;
    b[8..16].copy_from_slice(b"SEAGATE ");
    b[16..32].copy_from_slice(b"ST39102LW       ");
    b
}

/// Fixed-format sense data with the given key/ASC/ASCQ.
pub fn fixed_sense(key: u8, asc: u8, ascq: u8) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0] = 0x70;
    buf[2] = key;
    buf[7] = 0x08;
    buf[12] = asc;
    buf[13] = ascq;
    buf
}

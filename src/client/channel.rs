// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{io, time::Duration};

use crate::control_block::inquiry::DeviceAddress;

/// A bidirectional byte channel to a device that speaks the envelope
/// protocol. The channel is expected to already be open in exclusive
/// mode; opening and closing belong to the embedding caller.
///
/// The protocol is strictly synchronous one-in-one-out: a `write` of a
/// request envelope is always followed by exactly one `read` of its
/// response before the next command is issued.
pub trait Channel: Send {
    /// Write a full request envelope. Returns the number of bytes the
    /// transport accepted.
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Read the next response envelope into `buf`, returning how many
    /// bytes arrived.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Out-of-band control: set the outstanding-command timeout for
    /// subsequent writes. Needed before FORMAT UNIT, which legitimately
    /// runs far longer than any default.
    fn set_timeout(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Bus address of the device behind this channel, when the
    /// transport can report one.
    fn address(
        &mut self,
    ) -> impl Future<Output = io::Result<Option<DeviceAddress>>> + Send {
        async { Ok(None) }
    }
}

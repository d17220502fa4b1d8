// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Channel implementation over a Linux sg character device node.
//!
//! The sg driver's v2 read/write interface carries exactly the envelope
//! layout this crate encodes; timeouts and bus addressing go through
//! ioctls. Reads and writes are plain blocking syscalls bridged onto
//! the runtime with `spawn_blocking`.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::{fd::AsRawFd, unix::fs::OpenOptionsExt},
    path::Path,
    sync::Arc,
    time::Duration,
};

use tokio::task;
use tracing::debug;

use crate::{client::channel::Channel, control_block::inquiry::DeviceAddress};

// see scsi/sg.h
const SG_SET_TIMEOUT: libc::c_ulong = 0x2201;
const SG_GET_TIMEOUT: libc::c_ulong = 0x2202;
const SG_GET_SCSI_ID: libc::c_ulong = 0x2276;

/// Jiffies per second assumed by the sg timeout ioctls.
const SG_HZ: u64 = 100;

#[repr(C)]
#[derive(Default)]
struct SgScsiId {
    host_no: libc::c_int,
    channel: libc::c_int,
    scsi_id: libc::c_int,
    lun: libc::c_int,
    scsi_type: libc::c_int,
    h_cmd_per_lun: libc::c_short,
    d_queue_depth: libc::c_short,
    unused: [libc::c_int; 2],
}

/// An exclusively opened sg device node.
pub struct SgChannel {
    file: Arc<File>,
}

impl SgChannel {
    /// Open `path` read-write and exclusive, then probe it with
    /// `SG_GET_TIMEOUT` to make sure it really is an sg node before any
    /// command is built for it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_EXCL)
            .open(path)?;

        let rc = unsafe { libc::ioctl(file.as_raw_fd(), SG_GET_TIMEOUT) };
        if rc < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not answer sg ioctls", path.display()),
            ));
        }
        debug!(path = %path.display(), default_timeout_jiffies = rc, "sg device opened");

        Ok(Self {
            file: Arc::new(file),
        })
    }
}

impl Channel for SgChannel {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = Arc::clone(&self.file);
        let buf = buf.to_vec();
        task::spawn_blocking(move || (&*file).write(&buf))
            .await
            .map_err(io::Error::other)?
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = Arc::clone(&self.file);
        let len = buf.len();
        let data = task::spawn_blocking(move || {
            let mut tmp = vec![0u8; len];
            let n = (&*file).read(&mut tmp)?;
            tmp.truncate(n);
            Ok::<_, io::Error>(tmp)
        })
        .await
        .map_err(io::Error::other)??;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    async fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let jiffies = libc::c_int::try_from(timeout.as_secs() * SG_HZ)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "timeout too large"))?;
        let rc =
            unsafe { libc::ioctl(self.file.as_raw_fd(), SG_SET_TIMEOUT, &jiffies) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        debug!(jiffies, "sg timeout updated");
        Ok(())
    }

    async fn address(&mut self) -> io::Result<Option<DeviceAddress>> {
        let mut id = SgScsiId::default();
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SG_GET_SCSI_ID, &mut id) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Some(DeviceAddress {
            scsi_id: id.scsi_id,
            lun: id.lun,
            host_no: id.host_no,
            channel: id.channel,
        }))
    }
}

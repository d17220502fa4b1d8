// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fixed-size header framing for the SCSI passthrough channel.
//!
//! Every command travels as a request envelope (header + CDB + optional
//! outbound parameter data) and comes back as a response envelope
//! (header + inbound payload). Both headers share one compile-time size
//! so reply budgets can be computed as `HEADER_LEN + expected payload`.

/// Builds request envelopes (reply budget, correlation id, CDB, data).
pub mod request;
/// Decodes response envelopes (status triple, sense buffer, payload).
pub mod response;
/// Fixed-format sense-data parsing and ASC/ASCQ descriptions.
pub mod sense;

/// Envelope header size, shared by requests and responses.
pub const HEADER_LEN: usize = 36;

/// Size of the sense buffer carried in every response header.
pub const SG_MAX_SENSE: usize = 16;

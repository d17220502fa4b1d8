//! This crate reformats a SCSI disk with a new logical block size over a
//! generic passthrough channel, the way the classic `setblocksize` tool did.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, command-line parsing, and logging.
pub mod cfg;
/// Channel abstraction over the passthrough device and the transaction
/// executor driving single commands through it.
pub mod client;
/// Implements the SCSI commands (control blocks) the workflow issues.
pub mod control_block;
/// Encodes and decodes the envelope that frames every command and response.
pub mod envelope;
/// Contains the gated state machine for the reformat sequence.
pub mod state_machine;
/// Classifies the three-tier (host/driver/target) status plus sense data.
pub mod status;

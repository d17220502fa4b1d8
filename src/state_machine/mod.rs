//! This module contains the state machine driving the reformat sequence.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Common structures and traits for state machines.
pub mod common;
/// State machine for the gated INQUIRY → MODE SELECT → FORMAT UNIT run.
pub mod format_states;

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The gated reformat sequence as an explicit state machine:
//! `Init → Inquired → Validated → ModeSet → Formatted → Done`, with
//! every failure routing to a single abort reason.
//!
//! Gate order in `Inquired → Validated` is deliberate: an absent LUN is
//! checked before the device type (type is meaningless on an absent
//! unit), and the type check is a hard stop the user cannot override —
//! only then is the confirmation gate asked.

use std::{fmt, pin::Pin, sync::atomic::AtomicI32, time::Duration};

use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::{
        channel::Channel,
        executor::{Transaction, TransactionError, execute},
    },
    control_block::{
        CDB6_LEN,
        format_unit::fill_format_unit,
        inquiry::{
            DeviceIdentity, DeviceType, INQUIRY_ALLOCATION_LEN, LunPresence,
            fill_inquiry, parse_inquiry,
        },
        mode_select::{block_size_param_list, fill_mode_select6_simple},
    },
    envelope::response::ResponseEnvelope,
    state_machine::common::{ConfirmGate, StateMachine, StateMachineCtx, Transition},
    status::OutcomeCategory,
};

/// Which transaction of the sequence an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inquiry,
    ModeSelect,
    FormatUnit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Stage::Inquiry => write!(f, "INQUIRY"),
            Stage::ModeSelect => write!(f, "MODE SELECT"),
            Stage::FormatUnit => write!(f, "FORMAT UNIT"),
        }
    }
}

/// Every way the workflow can abort. All variants are terminal; nothing
/// is retried inside the core.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{stage} transaction failed")]
    Transaction {
        stage: Stage,
        #[source]
        source: TransactionError,
    },

    #[error("logical unit is supported but not present")]
    LunAbsent,

    #[error("logical unit is not supported by this device")]
    LunUnsupported,

    #[error("cannot determine the status of the logical unit")]
    LunIndeterminate,

    #[error("device type {0} does not support the FORMAT UNIT command")]
    UnsupportedDeviceType(DeviceType),

    #[error("user declined to reformat the device")]
    UserDeclined,

    #[error("confirmation gate failed")]
    ConfirmFailed(#[source] anyhow::Error),

    #[error("workflow cancelled before completion")]
    Cancelled,
}

/// What a finished workflow hands back to the caller.
#[derive(Debug)]
pub struct FormatReport {
    pub identity: DeviceIdentity,
    pub outcomes: Vec<(Stage, OutcomeCategory)>,
}

#[derive(Debug)]
pub struct FormatCtx<'a, C, G> {
    chan: &'a mut C,
    confirm: G,
    pack_ids: AtomicI32,
    block_size: u16,
    format_timeout: Duration,

    inquiry_payload: Option<Bytes>,
    identity: Option<DeviceIdentity>,
    outcomes: Vec<(Stage, OutcomeCategory)>,
    state: Option<FormatStates>,
}

impl<'a, C, G> FormatCtx<'a, C, G>
where
    C: Channel,
    G: ConfirmGate,
{
    pub fn new(
        chan: &'a mut C,
        confirm: G,
        block_size: u16,
        format_timeout: Duration,
    ) -> Self {
        Self {
            chan,
            confirm,
            pack_ids: AtomicI32::new(0),
            block_size,
            format_timeout,
            inquiry_payload: None,
            identity: None,
            outcomes: Vec::new(),
            state: Some(FormatStates::Init(Init)),
        }
    }

    fn record(&mut self, stage: Stage, rsp: &ResponseEnvelope) {
        let category = rsp.classify();
        info!(stage = %stage, category = ?category, "stage complete");
        self.outcomes.push((stage, category));
    }

    async fn run_inquiry(&mut self) -> Result<(), WorkflowError> {
        let mut cdb = [0u8; CDB6_LEN];
        fill_inquiry(&mut cdb);

        let txn =
            Transaction::new(cdb).with_reply_payload(INQUIRY_ALLOCATION_LEN as u32);
        let rsp = execute(self.chan, &self.pack_ids, &txn).await.map_err(|source| {
            WorkflowError::Transaction {
                stage: Stage::Inquiry,
                source,
            }
        })?;

        self.record(Stage::Inquiry, &rsp);
        self.inquiry_payload = Some(rsp.payload);
        Ok(())
    }

    async fn validate(&mut self) -> Result<(), WorkflowError> {
        let payload = self
            .inquiry_payload
            .take()
            .expect("inquiry payload is stored before validation");

        let mut identity =
            parse_inquiry(&payload).map_err(|_| WorkflowError::Transaction {
                stage: Stage::Inquiry,
                source: TransactionError::MalformedResponse(payload.len()),
            })?;

        match identity.lun_presence {
            LunPresence::Present => {},
            LunPresence::SupportedNotPresent => return Err(WorkflowError::LunAbsent),
            LunPresence::NotSupported => return Err(WorkflowError::LunUnsupported),
            LunPresence::Indeterminate(_) => {
                return Err(WorkflowError::LunIndeterminate);
            },
        }

        if !identity.device_type.supports_format_unit() {
            return Err(WorkflowError::UnsupportedDeviceType(identity.device_type));
        }

        identity.address = match self.chan.address().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "cannot determine bus address of the device");
                None
            },
        };

        info!(
            manufacturer = %identity.manufacturer,
            model = %identity.model,
            device_type = %identity.device_type,
            "device validated"
        );

        let answer = self
            .confirm
            .confirm(&identity)
            .await
            .map_err(WorkflowError::ConfirmFailed)?;
        self.identity = Some(identity);
        if !answer {
            return Err(WorkflowError::UserDeclined);
        }
        Ok(())
    }

    async fn run_mode_select(&mut self) -> Result<(), WorkflowError> {
        let mut cdb = [0u8; CDB6_LEN];
        fill_mode_select6_simple(&mut cdb);

        let txn = Transaction::new(cdb)
            .with_data(block_size_param_list(self.block_size).to_vec());
        let rsp = execute(self.chan, &self.pack_ids, &txn).await.map_err(|source| {
            WorkflowError::Transaction {
                stage: Stage::ModeSelect,
                source,
            }
        })?;

        self.record(Stage::ModeSelect, &rsp);
        Ok(())
    }

    async fn run_format_unit(&mut self) -> Result<(), WorkflowError> {
        let mut cdb = [0u8; CDB6_LEN];
        fill_format_unit(&mut cdb);

        // Formatting legitimately runs far longer than any default
        // timeout; once the command is on the wire there is no safe way
        // to abort it.
        let txn = Transaction::new(cdb).with_timeout(self.format_timeout);
        info!(
            timeout_secs = self.format_timeout.as_secs(),
            "sending FORMAT UNIT; do not interrupt or power down the device"
        );
        let rsp = execute(self.chan, &self.pack_ids, &txn).await.map_err(|source| {
            WorkflowError::Transaction {
                stage: Stage::FormatUnit,
                source,
            }
        })?;

        self.record(Stage::FormatUnit, &rsp);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Init;
#[derive(Debug)]
pub struct Inquired;
#[derive(Debug)]
pub struct Validated;
#[derive(Debug)]
pub struct ModeSet;
#[derive(Debug)]
pub struct Formatted;

#[derive(Debug)]
pub enum FormatStates {
    Init(Init),
    Inquired(Inquired),
    Validated(Validated),
    ModeSet(ModeSet),
    Formatted(Formatted),
}

type FormatStepOut = Transition<FormatStates, Result<(), WorkflowError>>;

impl<'ctx, C, G> StateMachine<FormatCtx<'ctx, C, G>, FormatStepOut> for Init
where
    C: Channel,
    G: ConfirmGate,
{
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FormatStepOut> + Send + 'a>>
    where
        Self: 'a,
        FormatCtx<'ctx, C, G>: 'a;

    fn step<'a>(&'a self, ctx: &'a mut FormatCtx<'ctx, C, G>) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx.run_inquiry().await {
                Ok(()) => Transition::Next(FormatStates::Inquired(Inquired), Ok(())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

impl<'ctx, C, G> StateMachine<FormatCtx<'ctx, C, G>, FormatStepOut> for Inquired
where
    C: Channel,
    G: ConfirmGate,
{
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FormatStepOut> + Send + 'a>>
    where
        Self: 'a,
        FormatCtx<'ctx, C, G>: 'a;

    fn step<'a>(&'a self, ctx: &'a mut FormatCtx<'ctx, C, G>) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx.validate().await {
                Ok(()) => Transition::Next(FormatStates::Validated(Validated), Ok(())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

impl<'ctx, C, G> StateMachine<FormatCtx<'ctx, C, G>, FormatStepOut> for Validated
where
    C: Channel,
    G: ConfirmGate,
{
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FormatStepOut> + Send + 'a>>
    where
        Self: 'a,
        FormatCtx<'ctx, C, G>: 'a;

    fn step<'a>(&'a self, ctx: &'a mut FormatCtx<'ctx, C, G>) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx.run_mode_select().await {
                Ok(()) => Transition::Next(FormatStates::ModeSet(ModeSet), Ok(())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

impl<'ctx, C, G> StateMachine<FormatCtx<'ctx, C, G>, FormatStepOut> for ModeSet
where
    C: Channel,
    G: ConfirmGate,
{
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FormatStepOut> + Send + 'a>>
    where
        Self: 'a,
        FormatCtx<'ctx, C, G>: 'a;

    fn step<'a>(&'a self, ctx: &'a mut FormatCtx<'ctx, C, G>) -> Self::StepResult<'a> {
        Box::pin(async move {
            match ctx.run_format_unit().await {
                Ok(()) => Transition::Next(FormatStates::Formatted(Formatted), Ok(())),
                Err(e) => Transition::Done(Err(e)),
            }
        })
    }
}

impl<'ctx, C, G> StateMachine<FormatCtx<'ctx, C, G>, FormatStepOut> for Formatted
where
    C: Channel,
    G: ConfirmGate,
{
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = FormatStepOut> + Send + 'a>>
    where
        Self: 'a,
        FormatCtx<'ctx, C, G>: 'a;

    fn step<'a>(&'a self, _ctx: &'a mut FormatCtx<'ctx, C, G>) -> Self::StepResult<'a> {
        Box::pin(async move { Transition::Done(Ok(())) })
    }
}

impl<'ctx, C, G> StateMachineCtx<FormatCtx<'ctx, C, G>, FormatReport, WorkflowError>
    for FormatCtx<'ctx, C, G>
where
    C: Channel,
    G: ConfirmGate,
{
    async fn execute(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<FormatReport, WorkflowError> {
        debug!("Loop FORMAT");

        loop {
            // Cancellation is only honoured between steps; once FORMAT
            // UNIT is on the wire the step runs to completion.
            if cancel.is_cancelled() {
                error!("format workflow cancelled");
                return Err(WorkflowError::Cancelled);
            }

            let state = self.state.take().expect("state must be set FormatCtx");
            let tr = match state {
                FormatStates::Init(s) => s.step(self).await,
                FormatStates::Inquired(s) => s.step(self).await,
                FormatStates::Validated(s) => s.step(self).await,
                FormatStates::ModeSet(s) => s.step(self).await,
                FormatStates::Formatted(s) => s.step(self).await,
            };

            match tr {
                Transition::Next(next, r) => {
                    if let Err(e) = r {
                        error!(error = %e, "format workflow aborted");
                        return Err(e);
                    }
                    self.state = Some(next);
                },
                Transition::Stay(Ok(_)) => {},
                Transition::Stay(Err(e)) => {
                    error!(error = %e, "format workflow aborted");
                    return Err(e);
                },
                Transition::Done(r) => {
                    if let Err(e) = r {
                        error!(error = %e, "format workflow aborted");
                        return Err(e);
                    }
                    let identity = self
                        .identity
                        .take()
                        .expect("identity is recorded before the workflow finishes");
                    return Ok(FormatReport {
                        identity,
                        outcomes: std::mem::take(&mut self.outcomes),
                    });
                },
            }
        }
    }
}

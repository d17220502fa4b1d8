// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::control_block::inquiry::DeviceIdentity;

pub enum Transition<S, R> {
    Next(S, R),
    Stay(R),
    Done(R),
}

pub trait StateMachine<Ctx, Resp>: Sized {
    type StepResult<'a>: Future<Output = Resp> + Send + 'a
    where
        Self: 'a,
        Resp: 'a,
        Ctx: 'a;

    fn step<'a>(&'a self, ctx: &'a mut Ctx) -> Self::StepResult<'a>;
}

pub trait StateMachineCtx<Ctx, Out = (), Err = anyhow::Error>: Sized {
    fn execute(
        &mut self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Out, Err>>;
}

/// Human-confirmation gate: asked exactly once, after the device has
/// been validated and before anything destructive is sent.
pub trait ConfirmGate: Send {
    fn confirm(
        &mut self,
        identity: &DeviceIdentity,
    ) -> impl Future<Output = Result<bool>> + Send;
}

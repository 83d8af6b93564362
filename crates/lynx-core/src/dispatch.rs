// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
Sending planned batches to a session and getting the results back in order.

Two dispatchers exist. [`SyncDispatch`] runs each batch as a blocking
call and is used when the run has a single image. [`AsyncDispatch`]
submits every batch before anything is awaited, so the server can work
on several requests while [`collect`] waits on them one at a time in
submission order. [`DispatchMode`] picks between them from the number
of inputs.
*/

use crate::{
    batcher::Batch,
    session::{InferSession, ResultSet, RunOptions},
    LynxError,
};

/// A request produced by a [`Dispatch`], waiting to be collected.
#[derive(Debug)]
pub enum Pending<H> {
    /// The request was run synchronously and already has its result.
    Ready { batch: usize, result: ResultSet },

    /// The request is in flight on the session.
    InFlight { batch: usize, handle: H },
}

impl<H> Pending<H> {
    /// The index of the batch this request was built from.
    pub fn batch(&self) -> usize {
        match self {
            Pending::Ready { batch, .. } | Pending::InFlight { batch, .. } => *batch,
        }
    }
}

/// Turns planned batches into requests on a session.
pub trait Dispatch {
    /// Configure `session` for `options`, then bind and send every
    /// batch in order. The returned requests are in the same order as
    /// `batches`.
    fn dispatch<S: InferSession>(
        &self,
        session: &mut S,
        batches: &[Batch<'_>],
        options: RunOptions,
    ) -> Result<Vec<Pending<S::Pending>>, LynxError>;
}

/// Runs every batch as a blocking call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncDispatch;

impl Dispatch for SyncDispatch {
    fn dispatch<S: InferSession>(
        &self,
        session: &mut S,
        batches: &[Batch<'_>],
        options: RunOptions,
    ) -> Result<Vec<Pending<S::Pending>>, LynxError> {
        configure(session, options)?;

        let mut pending = Vec::with_capacity(batches.len());
        for batch in batches {
            bind(session, batch)?;

            log::debug!("running batch {} on {:?}", batch.index(), session.model_name());
            let result = session.run().map_err(|source| LynxError::Submit {
                batch: batch.index(),
                source,
            })?;

            pending.push(Pending::Ready {
                batch: batch.index(),
                result,
            });
        }

        Ok(pending)
    }
}

/// Submits every batch without waiting, keeping one handle per batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncDispatch;

impl Dispatch for AsyncDispatch {
    fn dispatch<S: InferSession>(
        &self,
        session: &mut S,
        batches: &[Batch<'_>],
        options: RunOptions,
    ) -> Result<Vec<Pending<S::Pending>>, LynxError> {
        configure(session, options)?;

        let mut pending = Vec::with_capacity(batches.len());
        for batch in batches {
            bind(session, batch)?;

            log::debug!(
                "submitting batch {} to {:?}",
                batch.index(),
                session.model_name()
            );
            let handle = session.submit().map_err(|source| LynxError::Submit {
                batch: batch.index(),
                source,
            })?;

            pending.push(Pending::InFlight {
                batch: batch.index(),
                handle,
            });
        }

        Ok(pending)
    }
}

/// Selects the dispatcher for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Async,
}

impl DispatchMode {
    /// A single image is run synchronously, anything else asynchronously.
    pub fn for_inputs(count: usize) -> Self {
        if count == 1 {
            DispatchMode::Sync
        } else {
            DispatchMode::Async
        }
    }
}

impl Dispatch for DispatchMode {
    fn dispatch<S: InferSession>(
        &self,
        session: &mut S,
        batches: &[Batch<'_>],
        options: RunOptions,
    ) -> Result<Vec<Pending<S::Pending>>, LynxError> {
        match self {
            DispatchMode::Sync => SyncDispatch.dispatch(session, batches, options),
            DispatchMode::Async => AsyncDispatch.dispatch(session, batches, options),
        }
    }
}

/// Resolve `pending` in order, waiting on each request in turn.
pub fn collect<S: InferSession>(
    session: &mut S,
    pending: Vec<Pending<S::Pending>>,
) -> Result<Vec<ResultSet>, LynxError> {
    let mut results = Vec::with_capacity(pending.len());

    for request in pending {
        let result = match request {
            Pending::Ready { result, .. } => result,
            Pending::InFlight { batch, handle } => {
                log::debug!("waiting for batch {}", batch);
                session
                    .resolve(handle)
                    .map_err(|source| LynxError::Resolve { batch, source })?
            }
        };

        results.push(result);
    }

    Ok(results)
}

fn configure<S: InferSession>(session: &mut S, options: RunOptions) -> Result<(), LynxError> {
    session
        .set_run_options(options)
        .map_err(|source| LynxError::Configure {
            batch_size: options.batch_size,
            top_k: options.top_k,
            source,
        })
}

/// Rebind every slot of `batch`, discarding whatever the previous batch left behind.
fn bind<S: InferSession>(session: &mut S, batch: &Batch<'_>) -> Result<(), LynxError> {
    session.reset_input().map_err(|source| LynxError::Reset {
        batch: batch.index(),
        source,
    })?;

    for (slot, payload) in batch.payloads().enumerate() {
        session
            .bind_input(payload)
            .map_err(|source| LynxError::Bind {
                batch: batch.index(),
                slot,
                source,
            })?;
    }

    Ok(())
}

// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 14 October 2026

/*!
The seam between the batching core and a remote model.
*/

use crate::model::ModelConfig;

/// Per-run request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of slots in every request.
    pub batch_size: usize,

    /// Number of ranked classes requested per slot.
    pub top_k: usize,
}

impl RunOptions {
    pub fn new(batch_size: usize, top_k: usize) -> Self {
        Self { batch_size, top_k }
    }
}

/// One ranked classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    pub index: usize,
    pub label: String,
    pub score: f32,
}

/// The decoded response for one batch: a ranked list of classes per slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    slots: Vec<Vec<ClassEntry>>,
}

impl ResultSet {
    pub fn new(slots: Vec<Vec<ClassEntry>>) -> Self {
        Self { slots }
    }

    /// Ranked classes for `slot`, best first.
    pub fn classes(&self, slot: usize) -> &[ClassEntry] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterate over the slots in order.
    pub fn slots(&self) -> impl Iterator<Item = &[ClassEntry]> {
        self.slots.iter().map(Vec::as_slice)
    }

    /// Number of slots in this result.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A connection to one served model, holding the input bindings of the
/// request being built.
///
/// Bindings are a single reusable resource: a request is built by
/// [`reset_input`](Self::reset_input) followed by one
/// [`bind_input`](Self::bind_input) per slot, then sent with either
/// [`run`](Self::run) or [`submit`](Self::submit).
pub trait InferSession {
    /// Handle for a request that has been sent but not yet resolved.
    type Pending;

    /// The name of the bound model.
    fn model_name(&self) -> &str;

    /// The configuration the model declared when the session was created.
    fn config(&self) -> &ModelConfig;

    /// Configure the batch size and classification depth of the following requests.
    fn set_run_options(&mut self, options: RunOptions) -> anyhow::Result<()>;

    /// Forget any previously bound input.
    fn reset_input(&mut self) -> anyhow::Result<()>;

    /// Bind `data` to the next slot of the input.
    fn bind_input(&mut self, data: &[u8]) -> anyhow::Result<()>;

    /// Send the bound request and wait for its result.
    fn run(&mut self) -> anyhow::Result<ResultSet>;

    /// Send the bound request without waiting.
    fn submit(&mut self) -> anyhow::Result<Self::Pending>;

    /// Block until `pending` has completed.
    fn resolve(&mut self, pending: Self::Pending) -> anyhow::Result<ResultSet>;
}

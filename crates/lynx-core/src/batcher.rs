// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 14 October 2026

/*!
Packs pre-processed images into fixed-size batches.

Every batch produced by [`plan`] is exactly `batch_size` slots long. A
short final batch is padded with the last payload of the whole input,
so `n` payloads always give `ceil(n / batch_size)` batches.
*/

/// One position in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<'a> {
    /// Index of the input this payload came from.
    pub source: usize,

    /// The pre-processed bytes, laid out as the model expects.
    pub payload: &'a [u8],
}

/// A fixed-size group of payloads submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'a> {
    index: usize,
    slots: Vec<Slot<'a>>,
}

impl<'a> Batch<'a> {
    fn with_capacity(index: usize, batch_size: usize) -> Self {
        Self {
            index,
            slots: Vec::with_capacity(batch_size),
        }
    }

    /// Position of this batch in submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The slots of this batch, in order.
    pub fn slots(&self) -> &[Slot<'a>] {
        &self.slots
    }

    /// Iterate over the payloads, one per slot.
    pub fn payloads(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.slots.iter().map(|slot| slot.payload)
    }

    /// Iterate over the input index backing each slot.
    pub fn sources(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().map(|slot| slot.source)
    }

    /// The batch size.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Partition `payloads` into batches of exactly `batch_size` slots.
///
/// A single payload yields one batch filled with copies of it. Any
/// other count is walked left to right, and a short final batch is
/// padded with the last payload of the whole input.
///
/// # Panics
///
/// If `batch_size` is zero. Callers validate it when parsing arguments.
pub fn plan<P: AsRef<[u8]>>(payloads: &[P], batch_size: usize) -> Vec<Batch<'_>> {
    assert!(batch_size > 0, "batch size must be positive");

    let Some(last) = payloads.last() else {
        return vec![];
    };
    let last = Slot {
        source: payloads.len() - 1,
        payload: last.as_ref(),
    };

    let mut batches: Vec<Batch<'_>> = Vec::with_capacity(payloads.len().div_ceil(batch_size));
    for (chunk_idx, chunk) in payloads.chunks(batch_size).enumerate() {
        let mut batch = Batch::with_capacity(chunk_idx, batch_size);
        batch
            .slots
            .extend(chunk.iter().enumerate().map(|(offset, payload)| Slot {
                source: chunk_idx * batch_size + offset,
                payload: payload.as_ref(),
            }));

        batch.slots.resize(batch_size, last);
        batches.push(batch);
    }

    batches
}

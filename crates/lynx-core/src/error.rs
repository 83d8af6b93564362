// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 14 October 2026

use crate::model::ContractError;
use thiserror::Error;

/// Errors that can be returned while planning, dispatching and collecting a run.
#[derive(Error, Debug)]
pub enum LynxError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("failed configuring batch size {batch_size} and top-{top_k}")]
    Configure {
        batch_size: usize,
        top_k: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed resetting input for batch {batch}")]
    Reset {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed setting input for batch {batch}, slot {slot}")]
    Bind {
        batch: usize,
        slot: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed sending infer request for batch {batch}")]
    Submit {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed receiving infer response for batch {batch}")]
    Resolve {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },
}

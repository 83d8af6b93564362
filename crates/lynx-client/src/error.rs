// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

use thiserror::Error;

/// Errors that can be returned by an inference session or its transports.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid service URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("gRPC call failed")]
    Grpc(#[from] tonic::Status),

    #[error("unable to reach inference service: {0}")]
    Transport(String),

    #[error("failed starting the gRPC runtime")]
    Runtime(#[source] std::io::Error),

    #[error("malformed response from inference service")]
    Json(#[from] serde_json::Error),

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("response has no output named {0:?}")]
    MissingOutput(String),

    #[error("malformed classification entry {0:?}, expecting score:index[:label]")]
    MalformedClass(String),

    #[error("got {entries} classification entries, which do not split into {batch_size} slots")]
    MalformedOutput { entries: usize, batch_size: usize },

    #[error("run options must be set before binding inputs")]
    NotConfigured,

    #[error("all {batch_size} slots of the request are already bound")]
    BatchFull { batch_size: usize },

    #[error("input has {found} bytes, expecting {expected}")]
    InputSize { found: usize, expected: usize },

    #[error("request has {bound} of {expected} inputs bound")]
    IncompleteBatch { bound: usize, expected: usize },

    #[error("failed starting request worker")]
    Spawn(#[source] std::io::Error),

    #[error("request worker panicked")]
    WorkerPanicked,
}

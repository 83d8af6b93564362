// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

use crate::ClientError;
use lynx_core::prelude::{DataType, ModelConfig};
use std::{fmt, str::FromStr};

/// The wire protocol used to reach the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http,
    Grpc,
}

impl Protocol {
    /// The endpoint a server listens on for this protocol by default.
    pub fn default_url(self) -> &'static str {
        match self {
            Protocol::Http => "localhost:8000",
            Protocol::Grpc => "localhost:8001",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "grpc" => Ok(Protocol::Grpc),
            _ => Err(format!(
                "unexpected protocol type \"{}\", expecting HTTP or gRPC",
                s
            )),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.pad("HTTP"),
            Protocol::Grpc => f.pad("gRPC"),
        }
    }
}

/// A model name and optional version. Without a version the server picks its latest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub name: String,
    pub version: Option<i64>,
}

impl ModelRef {
    pub fn new(name: impl Into<String>, version: Option<i64>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The version as sent on the wire, empty for latest.
    pub fn version_string(&self) -> String {
        self.version.map(|v| v.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}:{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A fully bound classification request for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InferRequest {
    pub id: String,
    pub input: String,
    pub datatype: DataType,
    pub shape: Vec<i64>,

    /// Raw input bytes for every slot, back to back.
    pub data: Vec<u8>,
    pub output: String,
    pub top_k: usize,
}

/// The classification output of one request, as `score:index[:label]` strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferResponse {
    pub id: String,
    pub classes: Vec<String>,
}

/// A connection to an inference service.
///
/// Transports are shared between the session and its request workers,
/// so every call takes `&self`.
pub trait Transport: Send + Sync {
    /// Fetch the configuration of `model`.
    fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError>;

    /// Send `request` to `model` and wait for the classification output.
    fn infer(&self, model: &ModelRef, request: &InferRequest)
        -> Result<InferResponse, ClientError>;
}

/// Prefix `url` with `http://` unless it names a scheme, and drop trailing slashes.
pub(crate) fn base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.contains("://") {
        url.to_owned()
    } else {
        format!("http://{}", url)
    }
}

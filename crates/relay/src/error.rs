// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for chunk production and reassembly

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Bad arguments or configuration, nothing was attempted
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing input or colliding output, raised before any remote mutation
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A continuation payload whose part bookkeeping is inconsistent
    #[error("Invalid continuation state: {0}")]
    InvalidState(String),

    #[error("Object store error: {0}")]
    Remote(#[from] object_store::Error),

    #[error("Decode error in {chunk}: {source}")]
    Decode {
        chunk: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Handoff to {function} failed: {message}")]
    Handoff { function: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl RelayError {
    pub(crate) fn decode(chunk: &str, source: std::io::Error) -> Self {
        RelayError::Decode {
            chunk: chunk.to_string(),
            source,
        }
    }

    /// Classify a failed read of chunk content
    ///
    /// Object store failures surfacing through the reader stay remote errors.
    /// Anything else is a decode error of `chunk`.
    pub(crate) fn read_failure(chunk: &str, e: std::io::Error) -> Self {
        if !e
            .get_ref()
            .is_some_and(|inner| inner.is::<object_store::Error>())
        {
            return RelayError::decode(chunk, e);
        }
        match e.into_inner().map(|inner| inner.downcast::<object_store::Error>()) {
            Some(Ok(remote)) => RelayError::Remote(*remote),
            Some(Err(other)) => RelayError::decode(chunk, std::io::Error::other(other)),
            None => RelayError::decode(chunk, std::io::Error::other("read failed")),
        }
    }

    /// True for failures that leave an open upload session behind
    pub fn leaves_session_open(&self) -> bool {
        matches!(
            self,
            RelayError::Remote(_) | RelayError::Decode { .. } | RelayError::Io(_)
        )
    }
}

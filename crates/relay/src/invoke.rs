// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget re-invocation of the reassembly function
//!
//! An invoker delivers one payload to a fresh execution and returns as soon
//! as the trigger is accepted. It never waits for the execution itself.

use crate::config::InvokerConfig;
use crate::{RelayError, Result};
use async_trait::async_trait;
use diagnostics::*;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Header asking the invoke API for an asynchronous (event) invocation
pub const INVOCATION_TYPE_HEADER: &str = "X-Amz-Invocation-Type";

/// Environment variable carrying the function name to a spawned process
pub const FUNCTION_ENV: &str = "FANOUT_FUNCTION";

const INVOKE_TIMEOUT_SECONDS: u64 = 10;

#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke_async(&self, function_name: &str, payload: &str) -> Result<()>;
}

/// Build the invoker a config describes
pub fn invoker_from_config(config: &InvokerConfig) -> Result<Arc<dyn Invoker>> {
    Ok(match config {
        InvokerConfig::Http { endpoint } => Arc::new(HttpInvoker::new(endpoint.clone())?),
        InvokerConfig::Process { program, args } => {
            Arc::new(ProcessInvoker::new(program.clone(), args.clone()))
        }
    })
}

/// Posts the payload to an invoke endpoint with event invocation semantics
///
/// Requests are not SigV4-signed. This reaches a local Lambda emulator, an
/// unauthenticated function URL, or a gateway that signs on our behalf, but
/// not the IAM-protected Invoke API directly.
pub struct HttpInvoker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpInvoker {
    /// `endpoint` may contain `{function}`, replaced by the target's name
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(INVOKE_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| RelayError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn url(&self, function_name: &str) -> String {
        self.endpoint.replace("{function}", function_name)
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke_async(&self, function_name: &str, payload: &str) -> Result<()> {
        let url = self.url(function_name);
        debug!("Invoking {function_name} via {url}");

        let failed = |message: String| RelayError::Handoff {
            function: function_name.to_string(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .header(INVOCATION_TYPE_HEADER, "Event")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("invoke endpoint returned {status}")));
        }
        Ok(())
    }
}

/// Spawns a local program per invocation and writes the payload to its stdin
///
/// The child is detached: it outlives this execution and is never awaited.
pub struct ProcessInvoker {
    program: String,
    args: Vec<String>,
}

impl ProcessInvoker {
    #[must_use]
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn invoke_async(&self, function_name: &str, payload: &str) -> Result<()> {
        let program = self.program.as_str();
        debug!("Spawning {program} for {function_name}");

        let failed = |message: String| RelayError::Handoff {
            function: function_name.to_string(),
            message,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(FUNCTION_ENV, function_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| failed(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failed("child has no stdin".to_string()))?;
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| failed(format!("failed to write payload: {e}")))?;
        // Closing stdin lets the child see the end of the payload
        drop(stdin);

        Ok(())
    }
}

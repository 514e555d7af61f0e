// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result, anyhow};
use clap::Args;
use diagnostics::*;
use relay::{Budget, ContinuationState, Deadline, Relay, RelayConfig};
use std::fmt::Write;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Run one reassembly execution
///
/// The starting state comes from a payload file, a payload on stdin, or the
/// four location flags for a transfer that has not started.
#[derive(Args, Debug, Clone, Default)]
pub struct DecompressArgs {
    /// Deployment configuration (YAML)
    #[arg(long)]
    pub config: PathBuf,

    /// Continuation payload file
    #[arg(long, conflicts_with_all = ["payload_stdin", "source_bucket", "source_file", "target_bucket", "target_file"])]
    pub payload: Option<PathBuf>,

    /// Read the continuation payload from stdin
    #[arg(long, conflicts_with_all = ["source_bucket", "source_file", "target_bucket", "target_file"])]
    pub payload_stdin: bool,

    #[arg(long)]
    pub source_bucket: Option<String>,

    /// First chunk object, e.g. big.csv.gz.001
    #[arg(long)]
    pub source_file: Option<String>,

    #[arg(long)]
    pub target_bucket: Option<String>,

    #[arg(long)]
    pub target_file: Option<String>,

    /// Override the configured execution budget in seconds
    #[arg(long)]
    pub budget_secs: Option<u64>,
}

impl DecompressArgs {
    /// Load the config file and apply command-line overrides
    pub fn load_config(&self) -> Result<RelayConfig> {
        let mut config = RelayConfig::load(&self.config)?;
        if let Some(budget_secs) = self.budget_secs {
            config.budget_secs = budget_secs;
            config.validate()?;
        }
        Ok(config)
    }

    /// Starting state for this execution
    pub async fn initial_state(&self) -> Result<ContinuationState> {
        if let Some(path) = &self.payload {
            let payload = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read payload {}", path.display()))?;
            return Ok(ContinuationState::from_payload(&payload)?);
        }

        if self.payload_stdin {
            let mut payload = String::new();
            let _ = tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .context("Failed to read payload from stdin")?;
            return Ok(ContinuationState::from_payload(&payload)?);
        }

        match (
            &self.source_bucket,
            &self.source_file,
            &self.target_bucket,
            &self.target_file,
        ) {
            (Some(source_bucket), Some(source_file), Some(target_bucket), Some(target_file)) => {
                let state = ContinuationState::fresh(
                    source_bucket.as_str(),
                    source_file.as_str(),
                    target_bucket.as_str(),
                    target_file.as_str(),
                );
                state.validate()?;
                Ok(state)
            }
            _ => Err(anyhow!(
                "Provide --payload, --payload-stdin, or all of --source-bucket, --source-file, --target-bucket and --target-file"
            )),
        }
    }
}

/// Run one execution and render its outcome as JSON
pub async fn run_execution(
    relay: &Relay,
    state: ContinuationState,
    budget: &dyn Budget,
    output: &mut String,
) -> Result<()> {
    let target = format!("{}/{}", state.target_bucket, state.target_file);
    let outcome = relay
        .run(state, budget)
        .await
        .with_context(|| format!("Reassembly of {target} failed"))?;

    writeln!(output, "{}", serde_json::to_string_pretty(&outcome)?)?;
    Ok(())
}

pub async fn decompress_command(args: &DecompressArgs, output: &mut String) -> Result<()> {
    let config = args.load_config()?;
    let state = args.initial_state().await?;

    let budget_secs = config.budget_secs;
    let function = config.function_name.as_str();
    debug!("Starting execution of {function} with a {budget_secs}s budget");

    let deadline = Deadline::after(config.budget());
    let relay = Relay::from_config(&config)?;
    run_execution(&relay, state, &deadline, output).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = "function_name: decompress\nstore:\n  kind: memory\ninvoker:\n  kind: process\n  program: /bin/true\n";

    fn args_with_config(dir: &std::path::Path) -> DecompressArgs {
        let config = dir.join("relay.yaml");
        std::fs::write(&config, CONFIG).unwrap();
        DecompressArgs {
            config,
            ..DecompressArgs::default()
        }
    }

    #[tokio::test]
    async fn test_state_from_location_flags() -> Result<()> {
        let tmp = tempdir()?;
        let mut args = args_with_config(tmp.path());
        args.source_bucket = Some("chunks".to_string());
        args.source_file = Some("big.csv.gz.001".to_string());
        args.target_bucket = Some("restored".to_string());
        args.target_file = Some("big.csv".to_string());

        let state = args.initial_state().await?;
        assert_eq!(state.source_file, "big.csv.gz.001");
        assert!(!state.has_session());
        Ok(())
    }

    #[tokio::test]
    async fn test_state_from_payload_file() -> Result<()> {
        let tmp = tempdir()?;
        let payload = tmp.path().join("payload.json");
        std::fs::write(
            &payload,
            r#"{"sourceBucket":"a","sourceFile":"f.002","partNumber":2,"targetBucket":"b","targetFile":"f","multipartId":"u-1","partList":[{"partNumber":1,"eTag":"e1"}]}"#,
        )?;
        let mut args = args_with_config(tmp.path());
        args.payload = Some(payload);

        let state = args.initial_state().await?;
        assert_eq!(state.multipart_id.as_deref(), Some("u-1"));
        assert_eq!(state.part_number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_incomplete_location_flags() {
        let tmp = tempdir().unwrap();
        let mut args = args_with_config(tmp.path());
        args.source_bucket = Some("chunks".to_string());
        assert!(args.initial_state().await.is_err());
    }

    #[test]
    fn test_budget_override_is_validated() {
        let tmp = tempdir().unwrap();
        let mut args = args_with_config(tmp.path());
        assert_eq!(args.load_config().unwrap().budget_secs, 900);

        args.budget_secs = Some(300);
        assert_eq!(args.load_config().unwrap().budget_secs, 300);

        // Not above the 60 s safety margin
        args.budget_secs = Some(30);
        assert!(args.load_config().is_err());
    }

    #[tokio::test]
    async fn test_missing_first_chunk_is_reported() {
        let tmp = tempdir().unwrap();
        let mut args = args_with_config(tmp.path());
        args.source_bucket = Some("chunks".to_string());
        args.source_file = Some("absent.gz.001".to_string());
        args.target_bucket = Some("restored".to_string());
        args.target_file = Some("absent".to_string());

        let mut output = String::new();
        let err = decompress_command(&args, &mut output).await.unwrap_err();
        assert!(format!("{err:#}").contains("restored/absent"));
        assert!(output.is_empty());
    }
}

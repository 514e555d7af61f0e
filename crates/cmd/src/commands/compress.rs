// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Args;
use relay::{Codec, MB, ProducerSettings, produce_chunks};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CompressArgs {
    /// Maximum compressed size of each chunk in megabytes
    #[arg(short = 's', long = "size", value_parser = clap::value_parser!(u64).range(1..))]
    pub size_mb: u64,

    /// Input file to be compressed
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output prefix; chunks are written as <OUTPUT>.001, <OUTPUT>.002, ...
    #[arg(short, long)]
    pub output: String,

    /// Chunk compression format (gzip or zstd)
    #[arg(long, default_value_t = Codec::Gzip)]
    pub codec: Codec,
}

impl CompressArgs {
    fn settings(&self) -> ProducerSettings {
        ProducerSettings {
            input: self.input.clone(),
            output_prefix: self.output.clone(),
            max_chunk_bytes: self.size_mb.saturating_mul(MB as u64),
            codec: self.codec,
        }
    }
}

/// Split the input into chunk files, one output line per generated file
pub async fn compress_command(args: &CompressArgs, output: &mut String) -> Result<()> {
    let chunks = produce_chunks(&args.settings())
        .await
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    for chunk in chunks {
        writeln!(output, "File generated: {}", chunk.display())?;
    }
    Ok(())
}

// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use clap::Args;
use std::fmt::Write;

#[derive(Args, Debug, Clone)]
pub struct NextChunkArgs {
    /// Chunk name such as big.csv.gz.001
    pub name: String,
}

pub fn next_chunk_command(args: &NextChunkArgs, output: &mut String) -> Result<()> {
    let next = relay::next_chunk_name(&args.name)
        .ok_or_else(|| anyhow!("{} has no numeric chunk suffix", args.name))?;
    writeln!(output, "{next}")?;
    Ok(())
}

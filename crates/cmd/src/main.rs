// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use cmd::commands::{
    CompressArgs, DecompressArgs, NextChunkArgs, compress_command, decompress_command,
    next_chunk_command,
};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(name = "fanout")]
#[command(about = "Gzip fan-out compressor and budget-bounded reassembler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one input file and generate multiple independently compressed chunks
    ///
    /// Usage: fanout compress -s 100 -i large-file.txt -o compressed.gz
    Compress(CompressArgs),
    /// Reassemble chunks into one object, handing off before the budget runs out
    Decompress(DecompressArgs),
    /// Print the name of the chunk following NAME
    NextChunk(NextChunkArgs),
}

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let mut output = String::new();

    match &cli.command {
        Commands::Compress(args) => compress_command(args, &mut output).await?,
        Commands::Decompress(args) => decompress_command(args, &mut output).await?,
        Commands::NextChunk(args) => next_chunk_command(args, &mut output)?,
    }

    print!("{output}");
    Ok(())
}

// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod compress;
pub mod decompress;
pub mod next_chunk;

pub use compress::{CompressArgs, compress_command};
pub use decompress::{DecompressArgs, decompress_command};
pub use next_chunk::{NextChunkArgs, next_chunk_command};

// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Chunked compression and budget-bounded reassembly into a multipart upload
//!
//! A large file is split locally into independently decodable compressed
//! chunk objects (`file.gz.001`, `file.gz.002`, ...). Those are placed in an
//! object store and reassembled remotely by a function running under a hard
//! execution budget. Each execution streams decoded bytes into multipart
//! upload parts and, when the budget runs low, hands its whole state to a
//! fresh execution through a fire-and-forget invocation.
//!
//! # Architecture
//!
//! - **producer**: local splitter writing `<prefix>.<NNN>` chunk files
//! - **chunk**: chunk naming and successor computation
//! - **decoder**: one chunk object as a bounded sequence of decoded reads
//! - **part_buffer**: threshold-sized parts and the ordered part list
//! - **controller**: the per-execution state machine
//! - **session**: the continuation payload passed between executions
//! - **store** / **invoke**: object store and invocation client seams
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> relay::Result<()> {
//! use relay::{ContinuationState, Deadline, RelayConfig, Relay};
//!
//! let config = RelayConfig::load("relay.yaml")?;
//! let relay = Relay::from_config(&config)?;
//! let state = ContinuationState::fresh("chunks", "big.csv.gz.001", "restored", "big.csv");
//! let outcome = relay.run(state, &Deadline::after(config.budget())).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod budget;
mod chunk;
mod codec;
mod config;
mod controller;
mod decoder;
mod error;
mod invoke;
mod part_buffer;
mod producer;
mod session;
mod store;

pub use budget::{Budget, Deadline, HANDOFF_SAFETY_MARGIN};
pub use chunk::{CHUNK_SUFFIX_WIDTH, chunk_name, next_chunk_name};
pub use codec::Codec;
pub use config::{InvokerConfig, RelayConfig, StoreConfig};
pub use controller::{Outcome, Relay, RelaySettings};
pub use decoder::ChunkDecoder;
pub use error::RelayError;
pub use invoke::{FUNCTION_ENV, HttpInvoker, INVOCATION_TYPE_HEADER, Invoker, ProcessInvoker, invoker_from_config};
pub use part_buffer::PartBuffer;
pub use producer::{ProducerSettings, TRANSFER_UNIT, decode_chunk_file, produce_chunks};
pub use session::{ContinuationState, MAX_PART_NUMBER, PartEntry};
pub use store::{BucketStores, ByteStream, MultipartObjectStore, RemoteStore};

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// One mebibyte, the unit of the size flags and config fields
pub const MB: usize = 1024 * 1024;

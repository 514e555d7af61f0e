// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Chunk object naming
//!
//! Chunks are named `<base>.<NNN>` with a zero-padded ordinal starting at 1.
//! The successor of a name increments the last dot-separated segment and
//! re-pads it to the width it had, so `f.009` is followed by `f.010` and
//! `f.999` by `f.1000`.

/// Width of the ordinal suffix written by the producer
pub const CHUNK_SUFFIX_WIDTH: usize = 3;

/// Name of chunk `ordinal` for a prefix, e.g. `("big.gz", 1)` -> `big.gz.001`
#[must_use]
pub fn chunk_name(prefix: &str, ordinal: u64) -> String {
    format!("{prefix}.{ordinal:0width$}", width = CHUNK_SUFFIX_WIDTH)
}

/// Successor of a chunk name, or `None` when it has no numeric suffix
#[must_use]
pub fn next_chunk_name(name: &str) -> Option<String> {
    let (base, suffix) = match name.rsplit_once('.') {
        Some((base, suffix)) => (Some(base), suffix),
        None => (None, name),
    };

    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let next = suffix.parse::<u64>().ok()?.checked_add(1)?;
    let padded = format!("{next:0width$}", width = suffix.len());

    Some(match base {
        Some(base) => format!("{base}.{padded}"),
        None => padded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_name_padding() {
        assert_eq!(chunk_name("big.csv.gz", 1), "big.csv.gz.001");
        assert_eq!(chunk_name("out", 42), "out.042");
        assert_eq!(chunk_name("out", 1234), "out.1234");
    }

    #[test]
    fn test_next_chunk_name_keeps_width() {
        assert_eq!(next_chunk_name("f.001").as_deref(), Some("f.002"));
        assert_eq!(next_chunk_name("f.009").as_deref(), Some("f.010"));
        assert_eq!(next_chunk_name("dir/data.gz.0099").as_deref(), Some("dir/data.gz.0100"));
    }

    #[test]
    fn test_next_chunk_name_grows_past_width() {
        assert_eq!(next_chunk_name("f.999").as_deref(), Some("f.1000"));
    }

    #[test]
    fn test_next_chunk_name_without_suffix() {
        assert_eq!(next_chunk_name("file.gz"), None);
        assert_eq!(next_chunk_name("file."), None);
        assert_eq!(next_chunk_name("file.+12"), None);
        assert_eq!(next_chunk_name("file.1a"), None);
        assert_eq!(next_chunk_name("plain"), None);
    }

    #[test]
    fn test_next_chunk_name_bare_number() {
        assert_eq!(next_chunk_name("007").as_deref(), Some("008"));
    }

    #[test]
    fn test_next_chunk_name_overflow() {
        assert_eq!(next_chunk_name(&format!("f.{}", u64::MAX)), None);
    }

    #[test]
    fn test_chain_from_producer_names() {
        let mut name = chunk_name("x", 1);
        for ordinal in 2..=12 {
            name = next_chunk_name(&name).unwrap();
            assert_eq!(name, chunk_name("x", ordinal));
        }
    }
}

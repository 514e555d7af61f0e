// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Continuation state passed between executions
//!
//! The payload is the only memory an execution inherits. It is a flat JSON
//! record with camelCase field names; readers go by name, so fields may be
//! added without breaking older payloads. An absent (or empty) `multipartId`
//! tells the receiving execution to start a new upload session.

use crate::{RelayError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Largest part number a multipart upload accepts
pub const MAX_PART_NUMBER: u32 = 10_000;

/// One uploaded part: its number and the identifier the store returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartEntry {
    #[serde(alias = "PartNumber")]
    pub part_number: u32,
    #[serde(alias = "ETag")]
    pub e_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationState {
    pub source_bucket: String,
    /// Chunk currently being processed
    pub source_file: String,
    /// Next part number to assign
    #[serde(default = "first_part_number")]
    pub part_number: u32,
    /// Decoded bytes of `source_file` already acknowledged as parts
    #[serde(default, skip_serializing_if = "is_zero")]
    pub initial_position: u64,
    pub target_bucket: String,
    pub target_file: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub multipart_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub part_list: Vec<PartEntry>,
}

fn first_part_number() -> u32 {
    1
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|id| !id.is_empty()))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<PartEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<PartEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ContinuationState {
    /// State for a transfer that has not started yet
    #[must_use]
    pub fn fresh(
        source_bucket: impl Into<String>,
        source_file: impl Into<String>,
        target_bucket: impl Into<String>,
        target_file: impl Into<String>,
    ) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            source_file: source_file.into(),
            part_number: first_part_number(),
            initial_position: 0,
            target_bucket: target_bucket.into(),
            target_file: target_file.into(),
            multipart_id: None,
            part_list: Vec::new(),
        }
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(payload)?;
        state.validate()?;
        Ok(state)
    }

    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.multipart_id.is_some()
    }

    /// Adopt a newly initiated upload session; numbering restarts at 1
    pub fn begin_session(&mut self, multipart_id: String) {
        self.multipart_id = Some(multipart_id);
        self.part_number = first_part_number();
        self.part_list.clear();
    }

    /// Append an acknowledged part and return the number it was given
    pub fn record_part(&mut self, e_tag: String) -> u32 {
        let part_number = self.part_number;
        self.part_list.push(PartEntry { part_number, e_tag });
        self.part_number += 1;
        part_number
    }

    /// Point at the successor chunk, from its first decoded byte
    pub fn advance_to(&mut self, next_chunk: String) {
        self.source_file = next_chunk;
        self.initial_position = 0;
    }

    /// Check the part bookkeeping a payload carries
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("sourceBucket", &self.source_bucket),
            ("sourceFile", &self.source_file),
            ("targetBucket", &self.target_bucket),
            ("targetFile", &self.target_file),
        ] {
            if value.is_empty() {
                return Err(RelayError::InvalidState(format!("{field} is empty")));
            }
        }

        if !self.has_session() {
            if !self.part_list.is_empty() || self.initial_position != 0 {
                return Err(RelayError::InvalidState(
                    "progress recorded without a multipartId".to_string(),
                ));
            }
            return Ok(());
        }

        for (index, part) in self.part_list.iter().enumerate() {
            let expected = index as u32 + 1;
            if part.part_number != expected {
                return Err(RelayError::InvalidState(format!(
                    "partList entry {index} has partNumber {}, expected {expected}",
                    part.part_number
                )));
            }
        }

        let expected_next = self.part_list.len() as u32 + 1;
        if self.part_number != expected_next {
            return Err(RelayError::InvalidState(format!(
                "partNumber is {} but {} parts are recorded",
                self.part_number,
                self.part_list.len()
            )));
        }

        if self.part_number > MAX_PART_NUMBER + 1 {
            return Err(RelayError::InvalidState(format!(
                "more than {MAX_PART_NUMBER} parts recorded"
            )));
        }

        Ok(())
    }
}

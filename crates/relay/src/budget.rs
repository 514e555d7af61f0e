// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Execution time budget

use std::time::Duration;
use tokio::time::Instant;

/// Remaining time under which an execution stops producing parts and hands off
///
/// Must cover one handoff call plus a clean exit, with room to spare.
pub const HANDOFF_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Source of the remaining wall-clock time for the current execution
pub trait Budget: Send + Sync {
    fn remaining(&self) -> Duration;
}

/// Budget ending at a fixed instant, as granted by the hosting platform
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self { at }
    }
}

impl Budget for Deadline {
    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

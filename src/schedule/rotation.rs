//! Rotation penalty: discourages giving a bunk an activity it already had
//! earlier today, or on recent days when history is available.
//!
//! The weights are tuning knobs. Lower scores are better; the selector only
//! ranks by the score and never filters on it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::context::ScheduleContext;
use super::types::{AssignmentGrid, BunkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationWeights {
    pub same_day: u64,
    pub yesterday: u64,
    pub two_days: u64,
    /// Per occurrence, for days 3..=lookback_days
    pub older: u64,
    pub lookback_days: u32,
}

impl RotationWeights {
    pub const DEFAULT: Self = Self {
        same_day: 10_000,
        yesterday: 500,
        two_days: 200,
        older: 50,
        lookback_days: 7,
    };
}

impl Default for RotationWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastActivity {
    pub days_ago: u32,
    pub activity: String,
}

/// What each bunk did on previous days
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationHistory {
    by_bunk: BTreeMap<BunkId, Vec<PastActivity>>,
}

impl RotationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bunk: impl Into<String>, days_ago: u32, activity: impl Into<String>) {
        self.by_bunk.entry(bunk.into()).or_default().push(PastActivity {
            days_ago,
            activity: activity.into(),
        });
    }

    /// Builds history from earlier days' grids. Days on or after `today` are ignored.
    pub fn from_grids(today: NaiveDate, days: &[(NaiveDate, AssignmentGrid)]) -> Self {
        let mut history = Self::new();
        for (date, grid) in days {
            let days_ago = (today - *date).num_days();
            if days_ago <= 0 {
                continue;
            }
            for (bunk, row) in &grid.bunks {
                for entry in row.iter().flatten() {
                    if !entry.continuation {
                        history.record(bunk.clone(), days_ago as u32, entry.activity.clone());
                    }
                }
            }
        }
        history
    }

    pub fn activities(&self, bunk: &str) -> &[PastActivity] {
        self.by_bunk.get(bunk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_bunk.is_empty()
    }
}

/// Scores `activity` for `bunk` at `slot`; lower is better.
pub fn penalty(ctx: &ScheduleContext<'_>, bunk: &str, activity: &str, slot: usize) -> u64 {
    let weights = ctx.weights;
    let mut score = 0u64;

    let earlier_today = ctx
        .grid
        .bunks
        .get(bunk)
        .map(|row| {
            row.iter()
                .take(slot)
                .flatten()
                .any(|e| !e.continuation && e.activity.eq_ignore_ascii_case(activity))
        })
        .unwrap_or(false);
    if earlier_today {
        score = score.saturating_add(weights.same_day);
    }

    if let Some(history) = ctx.history {
        for past in history.activities(bunk) {
            if past.days_ago == 0
                || past.days_ago > weights.lookback_days
                || !past.activity.eq_ignore_ascii_case(activity)
            {
                continue;
            }
            let tier = match past.days_ago {
                1 => weights.yesterday,
                2 => weights.two_days,
                _ => weights.older,
            };
            score = score.saturating_add(tier);
        }
    }

    score
}

//! Per-board failure attribution: which seat caused each failed attempt,
//! and whether the failure was shape- or HCP-driven.

use serde::Serialize;
use std::fmt;

use crate::constants::{seat_index, SEATS};
use crate::matcher::MatchFailure;
use crate::types::Seat;

/// One failed attempt, as reported to the `on_attempt_failure` hook.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    pub attempt: u32,
    /// First seat to fail in this attempt.
    pub seat: Seat,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: MatchFailure,
    /// Seats that had already matched when the failure occurred.
    pub passed: Vec<Seat>,
}

fn serialize_kind<S: serde::Serializer>(
    kind: &MatchFailure,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(match kind {
        MatchFailure::Shape => "shape",
        MatchFailure::Hcp => "hcp",
    })
}

/// Counters kept per board, indexed by seat (N, E, S, W).
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureAttribution {
    /// Seat was the first to fail in the attempt.
    pub seat_fail_as_seat: [u32; 4],
    /// Seat passed but a later seat failed in that attempt.
    pub seat_fail_global_other: [u32; 4],
    /// Seat was not reached before the early break.
    pub seat_fail_global_unchecked: [u32; 4],
    /// HCP-classified failures, credited to the first-failing seat.
    pub seat_fail_hcp: [u32; 4],
    /// Shape-classified failures, credited to the first-failing seat.
    pub seat_fail_shape: [u32; 4],
    /// Attempts across all retries, the successful one included.
    pub total_attempts: u64,
}

impl FailureAttribution {
    pub(crate) fn record(&mut self, failure: &AttemptFailure) {
        let failing = seat_index(failure.seat);
        self.seat_fail_as_seat[failing] += 1;
        match failure.kind {
            MatchFailure::Hcp => self.seat_fail_hcp[failing] += 1,
            MatchFailure::Shape => self.seat_fail_shape[failing] += 1,
        }
        for seat in SEATS {
            if seat == failure.seat {
                continue;
            }
            let idx = seat_index(seat);
            if failure.passed.contains(&seat) {
                self.seat_fail_global_other[idx] += 1;
            } else {
                self.seat_fail_global_unchecked[idx] += 1;
            }
        }
    }

    /// Seat with the most first-failures, if any failure was recorded.
    pub fn dominant_seat(&self) -> Option<Seat> {
        SEATS
            .into_iter()
            .max_by_key(|&s| self.seat_fail_as_seat[seat_index(s)])
            .filter(|&s| self.seat_fail_as_seat[seat_index(s)] > 0)
    }
}

impl fmt::Display for FailureAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempts={}", self.total_attempts)?;
        for seat in SEATS {
            let idx = seat_index(seat);
            write!(
                f,
                " {}:{}f/{}h/{}s",
                seat,
                self.seat_fail_as_seat[idx],
                self.seat_fail_hcp[idx],
                self.seat_fail_shape[idx]
            )?;
        }
        Ok(())
    }
}

type AttemptHook = Box<dyn Fn(&AttemptFailure) + Send + Sync>;
type ExhaustedHook = Box<dyn Fn(&FailureAttribution) + Send + Sync>;

/// Optional observation points on the builder. No-op by default.
#[derive(Default)]
pub struct BuilderHooks {
    /// Fired after every failed attempt with its classification.
    pub on_attempt_failure: Option<AttemptHook>,
    /// Fired once when a board exhausts its attempt budget.
    pub on_max_attempts: Option<ExhaustedHook>,
}

impl BuilderHooks {
    pub(crate) fn fire_attempt(&self, failure: &AttemptFailure) {
        if let Some(hook) = &self.on_attempt_failure {
            hook(failure);
        }
    }

    pub(crate) fn fire_exhausted(&self, attribution: &FailureAttribution) {
        if let Some(hook) = &self.on_max_attempts {
            hook(attribution);
        }
    }
}

impl fmt::Debug for BuilderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderHooks")
            .field("on_attempt_failure", &self.on_attempt_failure.is_some())
            .field("on_max_attempts", &self.on_max_attempts.is_some())
            .finish()
    }
}

//! Per-session visit counting
//!
//! `VisitTracker` keeps two string values in the session:
//! - `visits`: how many distinct days the visitor has come back, starting at 1
//! - `last_visit`: when the counter last moved, as `YYYY-MM-DD HH:MM:SS.ffffff`
//!
//! The counter moves when at least one whole day (24 hours) has passed since
//! `last_visit`. Elapsed time is a truncated duration, not a difference of
//! calendar dates: 23:59 followed by 00:01 the next morning does not count.
//!
//! Stored timestamps are read by dropping their last seven characters and
//! parsing the rest as `YYYY-MM-DD HH:MM:SS`. Everything this module writes
//! carries a six-digit fractional part, so the seven dropped characters are
//! always `.ffffff`.

use crate::models::SessionData;
use chrono::{Local, NaiveDateTime};
use thiserror::Error;

/// Session key holding the visit count
pub const VISITS_KEY: &str = "visits";
/// Session key holding the last counted visit
pub const LAST_VISIT_KEY: &str = "last_visit";

/// Format used when writing `last_visit`
pub const LAST_VISIT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format of a stored timestamp once its suffix is dropped
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of trailing characters ignored when parsing a stored timestamp
const SUFFIX_LEN: usize = 7;

/// Undecodable visit state found in a session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VisitError {
    #[error("Malformed last_visit timestamp: {0:?}")]
    MalformedTimestamp(String),

    #[error("Visit count is not a positive integer: {0:?}")]
    NonIntegerVisitCount(String),
}

/// Decoded visit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitState {
    pub visits: u32,
    pub last_visit: NaiveDateTime,
}

impl VisitState {
    /// State of a first visit at `now`
    pub fn fresh(now: NaiveDateTime) -> Self {
        Self {
            visits: 1,
            last_visit: now,
        }
    }

    /// Decode the raw session strings.
    ///
    /// A missing or empty `visits` means 1, a missing or empty `last_visit`
    /// means `now`.
    pub fn decode(
        visits: Option<&str>,
        last_visit: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Self, VisitError> {
        let visits = match visits.filter(|v| !v.is_empty()) {
            None => 1,
            Some(raw) => parse_visits(raw)?,
        };
        let last_visit = match last_visit.filter(|v| !v.is_empty()) {
            None => parse_timestamp(&format_timestamp(now))?,
            Some(raw) => parse_timestamp(raw)?,
        };

        Ok(Self { visits, last_visit })
    }

    /// Whole days between `last_visit` and `now`, truncated toward zero
    pub fn elapsed_days(&self, now: NaiveDateTime) -> i64 {
        (now - self.last_visit).num_days()
    }

    /// The state after a visit at `now`, or `None` if no day has elapsed
    pub fn advance(&self, now: NaiveDateTime) -> Option<Self> {
        if self.elapsed_days(now) > 0 {
            Some(Self {
                visits: self.visits.saturating_add(1),
                last_visit: now,
            })
        } else {
            None
        }
    }
}

/// Serialize a timestamp for the `last_visit` key
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(LAST_VISIT_FORMAT).to_string()
}

/// Parse a stored `last_visit` value, ignoring its last seven characters
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, VisitError> {
    let cut = raw
        .char_indices()
        .rev()
        .nth(SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .ok_or_else(|| VisitError::MalformedTimestamp(raw.to_string()))?;

    NaiveDateTime::parse_from_str(&raw[..cut], PARSE_FORMAT)
        .map_err(|_| VisitError::MalformedTimestamp(raw.to_string()))
}

fn parse_visits(raw: &str) -> Result<u32, VisitError> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(VisitError::NonIntegerVisitCount(raw.to_string())),
        Ok(n) => Ok(n),
    }
}

/// Maintains the visit counter of a session.
pub struct VisitTracker;

impl VisitTracker {
    /// Count a visit happening now (local time).
    pub fn handle<S: SessionData + ?Sized>(session: &mut S) -> VisitState {
        Self::handle_at(session, Local::now().naive_local())
    }

    /// Count a visit happening at `now`.
    ///
    /// Undecodable state is replaced by a fresh first visit, so the session
    /// always ends up holding a valid count and timestamp.
    pub fn handle_at<S: SessionData + ?Sized>(session: &mut S, now: NaiveDateTime) -> VisitState {
        match Self::record(session, now) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Resetting visit state: {}", e);
                let state = VisitState::fresh(now);
                session.set(VISITS_KEY, state.visits.to_string());
                session.set(LAST_VISIT_KEY, format_timestamp(now));
                state
            }
        }
    }

    /// Count a visit at `now`, failing without touching the session when the
    /// stored state cannot be decoded.
    pub fn record<S: SessionData + ?Sized>(
        session: &mut S,
        now: NaiveDateTime,
    ) -> Result<VisitState, VisitError> {
        let raw_visits = session.get(VISITS_KEY);
        let raw_last_visit = session
            .get(LAST_VISIT_KEY)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format_timestamp(now));

        let current = VisitState::decode(raw_visits.as_deref(), Some(&raw_last_visit), now)?;

        let state = match current.advance(now) {
            Some(next) => {
                session.set(LAST_VISIT_KEY, format_timestamp(now));
                next
            }
            None => {
                session.set(LAST_VISIT_KEY, raw_last_visit);
                current
            }
        };
        session.set(VISITS_KEY, state.visits.to_string());

        Ok(state)
    }
}

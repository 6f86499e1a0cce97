//! Count-up rest stopwatch.
//!
//! The stopwatch is derived from wall-clock timestamps rather than ticks, so
//! its state can be persisted and reloaded at any time. Callers poll it
//! (about once a second) to find newly crossed alert thresholds.

use crate::{Set, SetStatus, StopwatchState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Default rest alerts: 90 seconds, 3 minutes, 5 minutes
pub const DEFAULT_ALERT_THRESHOLDS_SEC: [u64; 3] = [90, 180, 300];

/// Observable phase of a stopwatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopwatchPhase {
    NotStarted,
    Running,
    Paused,
    Dismissed,
}

impl StopwatchState {
    /// A fresh stopwatch running from `now`
    pub fn start(now: DateTime<Utc>, thresholds_sec: impl IntoIterator<Item = u64>) -> Self {
        Self {
            start_time: Some(now),
            accumulated_ms: 0,
            alert_thresholds_sec: thresholds_sec.into_iter().collect(),
            fired_thresholds_sec: BTreeSet::new(),
            dismissed: false,
        }
    }

    /// A fresh stopwatch with the default alert thresholds
    pub fn start_default(now: DateTime<Utc>) -> Self {
        Self::start(now, DEFAULT_ALERT_THRESHOLDS_SEC)
    }

    /// Restart from zero at `now`, keeping the alert thresholds
    pub fn restarted(&self, now: DateTime<Utc>) -> Self {
        Self::start(now, self.alert_thresholds_sec.iter().copied())
    }

    pub fn phase(&self) -> StopwatchPhase {
        if self.dismissed {
            StopwatchPhase::Dismissed
        } else if self.start_time.is_some() {
            StopwatchPhase::Running
        } else if self.accumulated_ms > 0 {
            StopwatchPhase::Paused
        } else {
            StopwatchPhase::NotStarted
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase() == StopwatchPhase::Running
    }

    /// Elapsed milliseconds at `now`
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.start_time {
            Some(start) => self.accumulated_ms + (now - start).num_milliseconds().max(0),
            None => self.accumulated_ms,
        }
    }

    /// Elapsed whole seconds at `now`
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.elapsed_ms(now) / 1000).max(0) as u64
    }

    /// Bank elapsed time and stop the clock. No-op unless running.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() {
            return;
        }
        self.accumulated_ms = self.elapsed_ms(now);
        self.start_time = None;
    }

    /// Continue from the banked time. No-op if running or dismissed.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_some() || self.dismissed {
            return;
        }
        self.start_time = Some(now);
    }

    /// Freeze the stopwatch until it is explicitly restarted
    pub fn dismiss(&mut self) {
        self.dismissed = true;
        self.start_time = None;
    }

    /// Thresholds crossed at `now` that have not fired yet
    pub fn triggered_alerts(&self, now: DateTime<Utc>) -> Vec<u64> {
        if self.dismissed {
            return Vec::new();
        }

        let elapsed = self.elapsed_seconds(now);
        self.alert_thresholds_sec
            .iter()
            .copied()
            .filter(|t| elapsed >= *t && !self.fired_thresholds_sec.contains(t))
            .collect()
    }

    /// Record thresholds as fired
    pub fn mark_fired(&mut self, fired: &[u64]) {
        self.fired_thresholds_sec.extend(fired.iter().copied());
    }

    /// Whether every alert threshold has fired
    pub fn all_alerts_fired(&self) -> bool {
        self.alert_thresholds_sec
            .iter()
            .all(|t| self.fired_thresholds_sec.contains(t))
    }
}

/// Stopwatch after a set update
///
/// (Re)starts the stopwatch at `now` when an enabled set moves into
/// `completed` from any other status, unless the current stopwatch was
/// dismissed. Previous alert thresholds are kept.
pub fn handle_set_completion(
    previous: &Set,
    next: &Set,
    current: Option<&StopwatchState>,
    now: DateTime<Utc>,
) -> Option<StopwatchState> {
    let triggers = next.enabled
        && next.status == SetStatus::Completed
        && previous.status != SetStatus::Completed;

    match current {
        _ if !triggers => current.cloned(),
        Some(stopwatch) if stopwatch.dismissed => Some(stopwatch.clone()),
        Some(stopwatch) => Some(stopwatch.restarted(now)),
        None => Some(StopwatchState::start_default(now)),
    }
}

/// Rest to attribute to the previous set at `now`
///
/// Only a live (not dismissed) stopwatch with at least one elapsed second
/// yields a value.
pub fn rest_seconds(current: Option<&StopwatchState>, now: DateTime<Utc>) -> Option<u64> {
    let stopwatch = current.filter(|s| !s.dismissed)?;
    Some(stopwatch.elapsed_seconds(now)).filter(|secs| *secs > 0)
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    RestAlert,
}

/// A notification the front end may choose to display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub threshold_sec: u64,
    pub timestamp: DateTime<Utc>,
}

fn rest_alert_message(threshold_sec: u64) -> String {
    if threshold_sec < 60 {
        return format!("{}s rest completed", threshold_sec);
    }

    let minutes = threshold_sec / 60;
    let seconds = threshold_sec % 60;

    if seconds == 0 {
        let plural = if minutes > 1 { "s" } else { "" };
        return format!("{} minute{} rest completed", minutes, plural);
    }

    format!("{}m {}s rest completed", minutes, seconds)
}

/// Notifications for thresholds newly crossed at `now`
pub fn rest_alert_notifications(state: &StopwatchState, now: DateTime<Utc>) -> Vec<NotificationEvent> {
    state
        .triggered_alerts(now)
        .into_iter()
        .map(|threshold_sec| NotificationEvent {
            id: format!("rest-alert-{}-{}", threshold_sec, now.timestamp_millis()),
            kind: NotificationKind::RestAlert,
            message: rest_alert_message(threshold_sec),
            threshold_sec,
            timestamp: now,
        })
        .collect()
}

/// One polling tick: derive new notifications and mark them fired
pub fn poll_stopwatch(state: &mut StopwatchState, now: DateTime<Utc>) -> Vec<NotificationEvent> {
    let events = rest_alert_notifications(state, now);
    if !events.is_empty() {
        let fired: Vec<u64> = events.iter().map(|e| e.threshold_sec).collect();
        state.mark_fired(&fired);
        tracing::debug!("Rest alerts fired: {:?}", fired);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SetType;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn set(status: SetStatus, enabled: bool) -> Set {
        Set {
            id: Uuid::new_v4(),
            order_index: 0,
            set_type: SetType::Work,
            enabled,
            target_weight: 60.0,
            target_reps: 5,
            actual_weight: None,
            actual_reps: None,
            status,
            rest_elapsed_seconds: None,
        }
    }

    #[test]
    fn test_elapsed_while_running() {
        let sw = StopwatchState::start_default(t0());
        assert_eq!(sw.phase(), StopwatchPhase::Running);
        assert_eq!(sw.elapsed_ms(secs(5)), 5000);
        assert_eq!(sw.elapsed_seconds(t0() + Duration::milliseconds(1999)), 1);
    }

    #[test]
    fn test_elapsed_never_negative_for_clock_skew() {
        let sw = StopwatchState::start_default(t0());
        assert_eq!(sw.elapsed_ms(secs(-10)), 0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut sw = StopwatchState::start_default(t0());
        sw.pause(secs(30));
        assert_eq!(sw.phase(), StopwatchPhase::Paused);
        assert_eq!(sw.elapsed_seconds(secs(100)), 30);

        // Pausing again does nothing
        sw.pause(secs(200));
        assert_eq!(sw.elapsed_seconds(secs(200)), 30);

        sw.resume(secs(100));
        assert_eq!(sw.elapsed_seconds(secs(110)), 40);
    }

    #[test]
    fn test_dismissed_never_advances() {
        let mut sw = StopwatchState::start_default(t0());
        sw.pause(secs(20));
        sw.resume(secs(30));
        sw.dismiss();

        let frozen = sw.elapsed_ms(secs(40));
        assert_eq!(frozen, sw.elapsed_ms(secs(4000)));
        assert_eq!(sw.phase(), StopwatchPhase::Dismissed);

        sw.resume(secs(50));
        assert_eq!(sw.start_time, None);
        assert!(sw.triggered_alerts(secs(10_000)).is_empty());
    }

    #[test]
    fn test_triggered_alerts_and_mark_fired() {
        let mut sw = StopwatchState::start_default(t0());
        assert!(sw.triggered_alerts(secs(89)).is_empty());
        assert_eq!(sw.triggered_alerts(secs(200)), vec![90, 180]);

        sw.mark_fired(&[90]);
        sw.mark_fired(&[90]);
        assert_eq!(sw.triggered_alerts(secs(200)), vec![180]);
        assert_eq!(sw.fired_thresholds_sec.len(), 1);
    }

    #[test]
    fn test_restart_clears_fired_and_keeps_thresholds() {
        let mut sw = StopwatchState::start(t0(), [60, 120]);
        sw.mark_fired(&[60]);
        sw.dismiss();

        let restarted = sw.restarted(secs(500));
        assert!(restarted.fired_thresholds_sec.is_empty());
        assert!(!restarted.dismissed);
        assert_eq!(restarted.alert_thresholds_sec, BTreeSet::from([60, 120]));
        assert_eq!(restarted.elapsed_seconds(secs(510)), 10);
    }

    #[test]
    fn test_completion_starts_stopwatch() {
        let started = handle_set_completion(
            &set(SetStatus::Pending, true),
            &set(SetStatus::Completed, true),
            None,
            t0(),
        )
        .unwrap();

        assert_eq!(started.start_time, Some(t0()));
        assert_eq!(started.alert_thresholds_sec, BTreeSet::from(DEFAULT_ALERT_THRESHOLDS_SEC));
    }

    #[test]
    fn test_completion_restarts_with_previous_thresholds() {
        let mut current = StopwatchState::start(t0(), [45]);
        current.mark_fired(&[45]);

        let restarted = handle_set_completion(
            &set(SetStatus::Failed, true),
            &set(SetStatus::Completed, true),
            Some(&current),
            secs(100),
        )
        .unwrap();

        assert_eq!(restarted.start_time, Some(secs(100)));
        assert_eq!(restarted.alert_thresholds_sec, BTreeSet::from([45]));
        assert!(restarted.fired_thresholds_sec.is_empty());
    }

    #[test]
    fn test_no_trigger_cases() {
        let current = StopwatchState::start_default(t0());

        // Already completed
        let same = handle_set_completion(
            &set(SetStatus::Completed, true),
            &set(SetStatus::Completed, true),
            Some(&current),
            secs(50),
        );
        assert_eq!(same, Some(current.clone()));

        // Disabled set
        let same = handle_set_completion(
            &set(SetStatus::Pending, true),
            &set(SetStatus::Completed, false),
            None,
            secs(50),
        );
        assert_eq!(same, None);

        // Transition into failed
        let same = handle_set_completion(
            &set(SetStatus::Completed, true),
            &set(SetStatus::Failed, true),
            Some(&current),
            secs(50),
        );
        assert_eq!(same, Some(current.clone()));

        // Dismissed stopwatch stays dismissed
        let mut dismissed = current.clone();
        dismissed.dismiss();
        let same = handle_set_completion(
            &set(SetStatus::Pending, true),
            &set(SetStatus::Completed, true),
            Some(&dismissed),
            secs(50),
        );
        assert_eq!(same, Some(dismissed));
    }

    #[test]
    fn test_rest_seconds() {
        let sw = StopwatchState::start_default(t0());
        assert_eq!(rest_seconds(Some(&sw), secs(95)), Some(95));
        assert_eq!(rest_seconds(Some(&sw), t0()), None);
        assert_eq!(rest_seconds(None, secs(95)), None);

        let mut dismissed = sw.clone();
        dismissed.dismiss();
        assert_eq!(rest_seconds(Some(&dismissed), secs(95)), None);
    }

    #[test]
    fn test_alert_messages() {
        assert_eq!(rest_alert_message(45), "45s rest completed");
        assert_eq!(rest_alert_message(60), "1 minute rest completed");
        assert_eq!(rest_alert_message(180), "3 minutes rest completed");
        assert_eq!(rest_alert_message(90), "1m 30s rest completed");
    }

    #[test]
    fn test_poll_fires_each_threshold_once() {
        let mut sw = StopwatchState::start_default(t0());

        let events = poll_stopwatch(&mut sw, secs(91));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].threshold_sec, 90);
        assert_eq!(events[0].kind, NotificationKind::RestAlert);
        assert_eq!(events[0].message, "1m 30s rest completed");

        assert!(poll_stopwatch(&mut sw, secs(92)).is_empty());

        let events = poll_stopwatch(&mut sw, secs(400));
        let thresholds: Vec<u64> = events.iter().map(|e| e.threshold_sec).collect();
        assert_eq!(thresholds, vec![180, 300]);
        assert!(sw.all_alerts_fired());
    }
}

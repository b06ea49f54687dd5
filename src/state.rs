//! Progress state and the step accumulation rule
//!
//! `ProgressState` holds everything the tracker knows: the gauge-driving step
//! counter, calories, goals, milestone history and reward points. Every step
//! count update goes through [`ProgressState::apply_step_count`].

use std::collections::HashSet;

use crate::error::TrackerError;
use crate::goals::GoalEditor;
use crate::types::{
    GoalConfig, StepOutcome, ThresholdRule, CALORIES_PER_STEP, MAX_STEP_COUNT,
    MILESTONE_INTERVAL, POINTS_INTERVAL,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// In-memory tracker state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredState", into = "StoredState")]
pub struct ProgressState {
    /// Gauge-driving step counter (returns to 0 on gauge reset)
    step_count: u64,
    /// Calories burned (kcal), always `total_steps * CALORIES_PER_STEP`
    calorie_count: f64,
    /// Steps accrued since start, unaffected by gauge resets
    total_steps: u64,
    /// Daily goals
    goals: GoalConfig,
    /// Milestones in order of first occurrence
    step_history: Vec<u64>,
    /// Lookup index over `step_history`
    recorded: HashSet<u64>,
    /// Reward points
    user_points: u64,
}

/// Serialized form of [`ProgressState`]
#[derive(Serialize, Deserialize)]
struct StoredState {
    step_count: u64,
    calorie_count: f64,
    total_steps: u64,
    goals: GoalConfig,
    step_history: Vec<u64>,
    user_points: u64,
}

impl From<ProgressState> for StoredState {
    fn from(state: ProgressState) -> Self {
        Self {
            step_count: state.step_count,
            calorie_count: state.calorie_count,
            total_steps: state.total_steps,
            goals: state.goals,
            step_history: state.step_history,
            user_points: state.user_points,
        }
    }
}

impl TryFrom<StoredState> for ProgressState {
    type Error = TrackerError;

    fn try_from(stored: StoredState) -> Result<Self, Self::Error> {
        let step_goal = i64::try_from(stored.goals.daily_step_goal)
            .map_err(|_| {
                TrackerError::InvalidState("daily_step_goal out of range".to_string())
            })?;
        GoalEditor::validate_step_goal(step_goal)?;
        GoalEditor::validate_calorie_goal(stored.goals.daily_calorie_goal)?;

        if stored.step_count > MAX_STEP_COUNT {
            return Err(TrackerError::InvalidState(format!(
                "step_count {} exceeds {}",
                stored.step_count, MAX_STEP_COUNT
            )));
        }
        if stored.step_count > stored.total_steps {
            return Err(TrackerError::InvalidState(format!(
                "step_count {} exceeds total_steps {}",
                stored.step_count, stored.total_steps
            )));
        }

        let expected = stored.total_steps as f64 * CALORIES_PER_STEP;
        if (stored.calorie_count - expected).abs() > 1e-6 * expected.max(1.0) {
            return Err(TrackerError::InvalidState(format!(
                "calorie_count {} does not match total_steps {}",
                stored.calorie_count, stored.total_steps
            )));
        }

        let mut recorded = HashSet::with_capacity(stored.step_history.len());
        for &steps in &stored.step_history {
            if steps == 0 || steps % MILESTONE_INTERVAL != 0 {
                return Err(TrackerError::InvalidState(format!(
                    "{} is not a milestone",
                    steps
                )));
            }
            if !recorded.insert(steps) {
                return Err(TrackerError::InvalidState(format!(
                    "milestone {} recorded twice",
                    steps
                )));
            }
        }

        Ok(Self {
            step_count: stored.step_count,
            calorie_count: stored.calorie_count,
            total_steps: stored.total_steps,
            goals: stored.goals,
            step_history: stored.step_history,
            recorded,
            user_points: stored.user_points,
        })
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(GoalConfig::default())
    }
}

impl ProgressState {
    /// Create a fresh state with the given goals
    pub fn new(goals: GoalConfig) -> Self {
        Self {
            step_count: 0,
            calorie_count: 0.0,
            total_steps: 0,
            goals,
            step_history: Vec::new(),
            recorded: HashSet::new(),
            user_points: 0,
        }
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn calorie_count(&self) -> f64 {
        self.calorie_count
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn goals(&self) -> GoalConfig {
        self.goals
    }

    pub fn daily_step_goal(&self) -> u64 {
        self.goals.daily_step_goal
    }

    pub fn daily_calorie_goal(&self) -> f64 {
        self.goals.daily_calorie_goal
    }

    pub fn step_history(&self) -> &[u64] {
        &self.step_history
    }

    pub fn user_points(&self) -> u64 {
        self.user_points
    }

    /// Move the step counter to `new_count` and apply the accumulation rule.
    ///
    /// Calories follow the steps added, points are awarded per multiple of
    /// `POINTS_INTERVAL` reached and milestones per multiple of
    /// `MILESTONE_INTERVAL`. `rule` decides whether thresholds jumped over by
    /// a multi-step update are credited. A count below the current one or
    /// above `MAX_STEP_COUNT` is rejected and leaves the state untouched.
    pub fn apply_step_count(
        &mut self,
        new_count: u64,
        rule: ThresholdRule,
    ) -> Result<StepOutcome, TrackerError> {
        let previous = self.step_count;
        if new_count < previous {
            return Err(TrackerError::StepCountRegression {
                current: previous,
                requested: new_count,
            });
        }
        if new_count > MAX_STEP_COUNT {
            return Err(TrackerError::StepCountOutOfRange {
                requested: new_count,
                max: MAX_STEP_COUNT,
            });
        }

        Ok(self.advance_to(new_count, rule))
    }

    /// Take one manual step.
    ///
    /// At `MAX_STEP_COUNT` the step is ignored and the outcome is a no-op.
    pub fn take_step(&mut self, rule: ThresholdRule) -> StepOutcome {
        if self.step_count >= MAX_STEP_COUNT {
            debug!(step_count = self.step_count, "take_step: at maximum, ignored");
            return self.advance_to(self.step_count, rule);
        }
        self.advance_to(self.step_count + 1, rule)
    }

    fn advance_to(&mut self, new_count: u64, rule: ThresholdRule) -> StepOutcome {
        let previous = self.step_count;
        self.step_count = new_count;
        self.total_steps = self.total_steps.saturating_add(new_count - previous);
        self.calorie_count = self.total_steps as f64 * CALORIES_PER_STEP;

        let points_awarded =
            thresholds_reached(previous, new_count, POINTS_INTERVAL, rule).count() as u64;
        self.user_points = self.user_points.saturating_add(points_awarded);

        let milestones_recorded: Vec<u64> =
            thresholds_reached(previous, new_count, MILESTONE_INTERVAL, rule)
                .filter(|&steps| self.push_milestone(steps))
                .collect();

        debug!(
            previous,
            step_count = new_count,
            points_awarded,
            milestones = milestones_recorded.len(),
            "advance_to"
        );

        StepOutcome {
            previous_count: previous,
            step_count: new_count,
            points_awarded,
            milestones_recorded,
        }
    }

    /// Append a milestone to history.
    ///
    /// Returns false when `steps` is not a positive multiple of
    /// `MILESTONE_INTERVAL` or is already recorded.
    pub fn record_milestone(&mut self, steps: u64) -> bool {
        if steps == 0 || steps % MILESTONE_INTERVAL != 0 {
            return false;
        }
        self.push_milestone(steps)
    }

    fn push_milestone(&mut self, steps: u64) -> bool {
        if !self.recorded.insert(steps) {
            return false;
        }
        self.step_history.push(steps);
        true
    }

    /// Return the gauge counter to zero, keeping calories, history and points.
    ///
    /// Returns the number of steps cleared from the gauge.
    pub fn reset_gauge(&mut self) -> u64 {
        let cleared = self.step_count;
        self.step_count = 0;
        cleared
    }

    pub(crate) fn set_daily_step_goal(&mut self, goal: u64) {
        self.goals.daily_step_goal = goal;
    }

    pub(crate) fn set_daily_calorie_goal(&mut self, goal: f64) {
        self.goals.daily_calorie_goal = goal;
    }

    /// Load state from JSON, checking its invariants
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize state to JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Multiples of `interval` reached when moving from `previous` to `current`
fn thresholds_reached(
    previous: u64,
    current: u64,
    interval: u64,
    rule: ThresholdRule,
) -> impl Iterator<Item = u64> {
    let (first, last) = match rule {
        _ if current <= previous => (1, 0),
        ThresholdRule::Crossing => (previous / interval + 1, current / interval),
        ThresholdRule::LandingOnly if current % interval == 0 => {
            (current / interval, current / interval)
        }
        ThresholdRule::LandingOnly => (1, 0),
    };
    (first..=last).map(move |n| n * interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn walk(state: &mut ProgressState, steps: u64) {
        for _ in 0..steps {
            state.take_step(ThresholdRule::Crossing);
        }
    }

    #[test]
    fn test_default_state() {
        let state = ProgressState::default();
        assert_eq!(state.step_count(), 0);
        assert_eq!(state.calorie_count(), 0.0);
        assert_eq!(state.daily_step_goal(), 5000);
        assert_eq!(state.daily_calorie_goal(), 2000.0);
        assert!(state.step_history().is_empty());
        assert_eq!(state.user_points(), 0);
    }

    #[test]
    fn test_unit_steps_accumulate() {
        let mut state = ProgressState::default();
        walk(&mut state, 120);

        assert_eq!(state.step_count(), 120);
        assert!((state.calorie_count() - 4.8).abs() < 1e-9);
        assert_eq!(state.user_points(), 2);
        assert_eq!(
            state.step_history(),
            &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]
        );
    }

    #[test]
    fn test_point_awarded_on_fiftieth_step() {
        let mut state = ProgressState::default();
        walk(&mut state, 49);
        assert_eq!(state.user_points(), 0);

        let outcome = state.take_step(ThresholdRule::Crossing);
        assert_eq!(outcome.points_awarded, 1);
        assert_eq!(outcome.milestones_recorded, vec![50]);
        assert_eq!(state.user_points(), 1);
    }

    #[test]
    fn test_record_milestone_is_idempotent() {
        let mut state = ProgressState::default();
        assert!(state.record_milestone(30));
        assert!(!state.record_milestone(30));
        assert_eq!(state.step_history(), &[30]);
    }

    #[test]
    fn test_record_milestone_rejects_non_milestones() {
        let mut state = ProgressState::default();
        assert!(!state.record_milestone(0));
        assert!(!state.record_milestone(15));
        assert!(state.step_history().is_empty());
    }

    #[test]
    fn test_regression_is_rejected() {
        let mut state = ProgressState::default();
        state.apply_step_count(40, ThresholdRule::Crossing).unwrap();
        let before = state.clone();

        let result = state.apply_step_count(39, ThresholdRule::Crossing);
        assert!(matches!(
            result,
            Err(TrackerError::StepCountRegression {
                current: 40,
                requested: 39
            })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_same_count_is_noop() {
        let mut state = ProgressState::default();
        state.apply_step_count(50, ThresholdRule::LandingOnly).unwrap();
        let outcome = state.apply_step_count(50, ThresholdRule::LandingOnly).unwrap();

        assert!(outcome.is_noop());
        assert_eq!(outcome.points_awarded, 0);
        assert_eq!(state.user_points(), 1);
    }

    #[test]
    fn test_crossing_rule_credits_skipped_thresholds() {
        let mut state = ProgressState::default();
        let outcome = state.apply_step_count(123, ThresholdRule::Crossing).unwrap();

        assert_eq!(outcome.points_awarded, 2);
        assert_eq!(state.user_points(), 2);
        assert_eq!(
            state.step_history(),
            &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]
        );
    }

    #[test]
    fn test_landing_only_rule_skips_thresholds() {
        let mut state = ProgressState::default();
        state.apply_step_count(47, ThresholdRule::LandingOnly).unwrap();
        state.apply_step_count(53, ThresholdRule::LandingOnly).unwrap();
        assert_eq!(state.user_points(), 0);
        assert!(state.step_history().is_empty());

        state.apply_step_count(100, ThresholdRule::LandingOnly).unwrap();
        assert_eq!(state.user_points(), 1);
        assert_eq!(state.step_history(), &[100]);
    }

    #[test]
    fn test_reset_gauge_keeps_rewards() {
        let mut state = ProgressState::default();
        walk(&mut state, 100);

        let cleared = state.reset_gauge();
        assert_eq!(cleared, 100);
        assert_eq!(state.step_count(), 0);
        assert_eq!(state.total_steps(), 100);
        assert!((state.calorie_count() - 4.0).abs() < 1e-9);
        assert_eq!(state.user_points(), 2);
        assert_eq!(state.step_history().len(), 10);
    }

    #[test]
    fn test_walking_after_reset() {
        let mut state = ProgressState::default();
        walk(&mut state, 100);
        state.reset_gauge();
        walk(&mut state, 50);

        // Milestones are already recorded, points are earned again
        assert_eq!(state.step_count(), 50);
        assert_eq!(state.total_steps(), 150);
        assert!((state.calorie_count() - 6.0).abs() < 1e-9);
        assert_eq!(state.user_points(), 3);
        assert_eq!(state.step_history().len(), 10);
    }

    #[test]
    fn test_large_jump_records_every_milestone() {
        let mut state = ProgressState::default();
        let outcome = state
            .apply_step_count(1_000_000, ThresholdRule::Crossing)
            .unwrap();

        assert_eq!(outcome.milestones_recorded.len(), 100_000);
        assert_eq!(state.user_points(), 20_000);
        assert_eq!(state.step_history().last(), Some(&1_000_000));

        // Walking up again after a reset finds everything recorded
        state.reset_gauge();
        let outcome = state
            .apply_step_count(1_000_000, ThresholdRule::Crossing)
            .unwrap();
        assert!(outcome.milestones_recorded.is_empty());
        assert_eq!(state.step_history().len(), 100_000);
    }

    #[test]
    fn test_count_above_maximum_is_rejected() {
        let mut state = ProgressState::default();
        let result = state.apply_step_count(MAX_STEP_COUNT + 1, ThresholdRule::Crossing);
        assert!(matches!(
            result,
            Err(TrackerError::StepCountOutOfRange { .. })
        ));
        assert!(state
            .apply_step_count(u64::MAX, ThresholdRule::Crossing)
            .is_err());
        assert_eq!(state, ProgressState::default());
    }

    #[test]
    fn test_take_step_at_maximum_is_noop() {
        let mut state = ProgressState::default();
        state
            .apply_step_count(MAX_STEP_COUNT, ThresholdRule::LandingOnly)
            .unwrap();

        let outcome = state.take_step(ThresholdRule::LandingOnly);
        assert!(outcome.is_noop());
        assert_eq!(state.step_count(), MAX_STEP_COUNT);
        assert_eq!(state.total_steps(), MAX_STEP_COUNT);
    }

    #[test]
    fn test_serialization() {
        let mut state = ProgressState::default();
        walk(&mut state, 60);

        let json = state.to_json().unwrap();
        let loaded = ProgressState::from_json(&json).unwrap();
        assert_eq!(loaded, state);

        // The milestone index is rebuilt on load
        let mut loaded = loaded;
        assert!(!loaded.record_milestone(60));
        assert!(loaded.record_milestone(70));
    }

    fn stored(step_count: u64, total_steps: u64, calories: f64, history: &str) -> String {
        format!(
            r#"{{"step_count": {}, "calorie_count": {}, "total_steps": {},
                "goals": {{"daily_step_goal": 5000, "daily_calorie_goal": 2000.0}},
                "step_history": {}, "user_points": 0}}"#,
            step_count, calories, total_steps, history
        )
    }

    #[test]
    fn test_load_accepts_consistent_state() {
        let state = ProgressState::from_json(&stored(0, 120, 4.8, "[100, 50]")).unwrap();
        assert_eq!(state.step_history(), &[100, 50]);
        assert_eq!(state.total_steps(), 120);
    }

    #[test]
    fn test_load_rejects_broken_invariants() {
        let broken = [
            stored(10, 10, 0.4, "[10, 10]"),
            stored(10, 10, 0.4, "[15]"),
            stored(10, 10, 0.4, "[0]"),
            stored(10, 10, 99.0, "[10]"),
            stored(20, 10, 0.4, "[10]"),
        ];
        for json in &broken {
            let err = ProgressState::from_json(json).unwrap_err();
            assert!(
                err.to_string().contains("Invalid tracker state"),
                "unexpected error {} for {}",
                err,
                json
            );
        }

        let too_many = MAX_STEP_COUNT + 1;
        let json = stored(too_many, too_many, too_many as f64 * CALORIES_PER_STEP, "[]");
        assert!(ProgressState::from_json(&json).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_goal() {
        let json = r#"{"step_count": 0, "calorie_count": 0.0, "total_steps": 0,
            "goals": {"daily_step_goal": 0, "daily_calorie_goal": 2000.0},
            "step_history": [], "user_points": 0}"#;
        assert!(ProgressState::from_json(json).is_err());
    }

    proptest! {
        #[test]
        fn prop_calories_follow_steps(n in 0u64..100_000) {
            let mut state = ProgressState::default();
            state.apply_step_count(n, ThresholdRule::Crossing).unwrap();
            prop_assert!((state.calorie_count() - n as f64 * 0.04).abs() < 1e-6);
        }

        #[test]
        fn prop_unit_steps_award_floor_points(n in 0u64..2_000) {
            let mut state = ProgressState::default();
            walk(&mut state, n);
            prop_assert_eq!(state.user_points(), n / 50);
        }

        #[test]
        fn prop_unit_steps_record_each_milestone_once(n in 0u64..2_000) {
            let mut state = ProgressState::default();
            walk(&mut state, n);
            let expected: Vec<u64> = (1..=n / 10).map(|k| k * 10).collect();
            prop_assert_eq!(state.step_history(), expected.as_slice());
        }

        #[test]
        fn prop_rules_agree_on_unit_steps(n in 0u64..600) {
            let mut crossing = ProgressState::default();
            let mut landing = ProgressState::default();
            for _ in 0..n {
                crossing.take_step(ThresholdRule::Crossing);
                landing.take_step(ThresholdRule::LandingOnly);
            }
            prop_assert_eq!(crossing, landing);
        }

        #[test]
        fn prop_crossing_matches_unit_walk(jumps in proptest::collection::vec(0u64..60, 0..15)) {
            let mut jumped = ProgressState::default();
            let mut target = 0;
            for jump in jumps {
                target += jump;
                jumped.apply_step_count(target, ThresholdRule::Crossing).unwrap();
            }
            let mut walked = ProgressState::default();
            walk(&mut walked, target);
            prop_assert_eq!(jumped.user_points(), walked.user_points());
            prop_assert_eq!(jumped.step_history(), walked.step_history());
        }
    }
}

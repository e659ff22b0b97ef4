use crate::error::LoadError;
use crate::formulas::DecayModel;
use crate::models::{ActivitySummary, ActivityType, ZoneMinutes};
use crate::zones::ZoneBoundaries;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: i64 = 86_400;

/// Activity types that always appear in the per-type rollups
pub const TRACKED_TYPES: [ActivityType; 3] = [
    ActivityType::Cycling,
    ActivityType::Running,
    ActivityType::Swimming,
];

/// Load model configuration with customizable windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadModelConfig {
    /// Fitness window in days (default: 42); also the history retention horizon
    pub fitness_window_days: u16,

    /// Fatigue window in days (default: 7)
    pub fatigue_window_days: u16,

    /// How a window of loads is folded into one number
    pub decay: DecayModel,
}

impl Default for LoadModelConfig {
    fn default() -> Self {
        LoadModelConfig {
            fitness_window_days: 42,
            fatigue_window_days: 7,
            decay: DecayModel::Exponential,
        }
    }
}

/// `sum_{i=1..window} exp(-i / window)`, rounded to 3 decimals.
///
/// 26.234 for 42 days, 4.116 for 7 days.
pub fn decay_normalizer(window_days: u16) -> f64 {
    let n = f64::from(window_days.max(1));
    let sum: f64 = (1..=window_days.max(1))
        .map(|i| (-f64::from(i) / n).exp())
        .sum();
    (sum * 1000.0).round() / 1000.0
}

/// Fitness, fatigue and form for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadMetrics {
    pub fitness: i64,
    pub fatigue: i64,
    pub form: i64,
}

impl LoadMetrics {
    pub fn new(fitness: i64, fatigue: i64) -> Self {
        LoadMetrics {
            fitness,
            fatigue,
            form: fitness - fatigue,
        }
    }

    pub fn interpretation(&self) -> FormInterpretation {
        FormInterpretation::from_form(self.form as f64)
    }
}

/// Derived athlete-level figures, always consistent with the history they were computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRollups {
    /// All activity types combined
    pub cardio: LoadMetrics,

    /// Per activity type, keyed by type label
    pub by_type: BTreeMap<String, LoadMetrics>,

    /// Zone minutes over the fatigue window
    pub zone_minutes_7day: ZoneMinutes,

    /// Zone minutes over the fitness window
    pub zone_minutes_42day: ZoneMinutes,

    /// Reference time the figures were computed for
    pub computed_at: Option<DateTime<Utc>>,
}

impl Default for LoadRollups {
    fn default() -> Self {
        LoadRollups {
            cardio: LoadMetrics::default(),
            by_type: TRACKED_TYPES
                .iter()
                .map(|t| (t.label().to_string(), LoadMetrics::default()))
                .collect(),
            zone_minutes_7day: [0; 5],
            zone_minutes_42day: [0; 5],
            computed_at: None,
        }
    }
}

impl LoadRollups {
    /// Metrics for one activity type; zeros when the type has no history
    pub fn metrics_for(&self, activity_type: &ActivityType) -> LoadMetrics {
        self.by_type
            .get(activity_type.label())
            .copied()
            .unwrap_or_default()
    }
}

/// Form interpretation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl FormInterpretation {
    pub fn from_form(form: f64) -> Self {
        if form >= 25.0 {
            FormInterpretation::VeryFresh
        } else if form >= 5.0 {
            FormInterpretation::Fresh
        } else if form >= -10.0 {
            FormInterpretation::Neutral
        } else if form >= -30.0 {
            FormInterpretation::Fatigued
        } else {
            FormInterpretation::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            FormInterpretation::Fresh => "Fresh and ready for hard training or racing",
            FormInterpretation::Neutral => "Neutral (normal training)",
            FormInterpretation::Fatigued => "Fatigued (monitor closely)",
            FormInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }
}

/// Un-rounded load figures for one day and category
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawLoad {
    pub fitness: f64,
    pub fatigue: f64,
}

impl RawLoad {
    pub fn form(&self) -> f64 {
        self.fitness - self.fatigue
    }
}

/// One calendar day of the load series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    pub date: NaiveDate,
    /// Summed training load of the activities started that day
    pub training_load: u32,
    pub cardio_fitness: f64,
    pub cardio_fatigue: f64,
    pub cardio_form: f64,
    pub cycling_fitness: f64,
    pub cycling_fatigue: f64,
    pub cycling_form: f64,
    pub running_fitness: f64,
    pub running_fatigue: f64,
    pub running_form: f64,
}

/// Whole days between an activity start and the reference time, floored
fn age_days(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Core training load calculation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingLoadEngine {
    config: LoadModelConfig,
}

impl TrainingLoadEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoadModelConfig) -> Self {
        TrainingLoadEngine { config }
    }

    pub fn config(&self) -> &LoadModelConfig {
        &self.config
    }

    /// Fold `(age_days, load)` pairs into one un-rounded figure over a window.
    ///
    /// Only `0 <= age < window` contributes; future-dated activities never do.
    fn fold_window(&self, loads: &[(i64, u32)], window_days: u16) -> f64 {
        let window = i64::from(window_days.max(1));
        let in_window = loads
            .iter()
            .filter(|(age, _)| (0..window).contains(age));

        match self.config.decay {
            DecayModel::Exponential => {
                let n = window as f64;
                let sum: f64 = in_window
                    .map(|&(age, load)| f64::from(load) * (-(age as f64) / n).exp())
                    .fold(0.0, |acc, x| acc + x);
                sum / decay_normalizer(window_days)
            }
            DecayModel::LinearAverage => {
                let sum = in_window.fold(0.0, |acc, &(_, load)| acc + f64::from(load));
                sum / window as f64
            }
        }
    }

    fn finish(&self, value: f64) -> i64 {
        match self.config.decay {
            DecayModel::Exponential => value.round() as i64,
            DecayModel::LinearAverage => value.trunc() as i64,
        }
    }

    fn raw_load(&self, loads: &[(i64, u32)]) -> RawLoad {
        RawLoad {
            fitness: self.fold_window(loads, self.config.fitness_window_days),
            fatigue: self.fold_window(loads, self.config.fatigue_window_days),
        }
    }

    fn metrics(&self, loads: &[(i64, u32)]) -> LoadMetrics {
        let raw = self.raw_load(loads);
        LoadMetrics::new(self.finish(raw.fitness), self.finish(raw.fatigue))
    }

    /// Whether a summary is still inside the retention horizon
    pub fn is_retained(&self, summary: &ActivitySummary, now: DateTime<Utc>) -> bool {
        age_days(summary.start(), now) < i64::from(self.config.fitness_window_days)
    }

    /// Compute the full rollups for a history at a reference time
    pub fn compute(&self, history: &[ActivitySummary], now: DateTime<Utc>) -> LoadRollups {
        let aged: Vec<(i64, &ActivitySummary)> = history
            .iter()
            .map(|summary| (age_days(summary.start(), now), summary))
            .collect();

        let all: Vec<(i64, u32)> = aged
            .iter()
            .map(|(age, summary)| (*age, summary.training_load))
            .collect();

        let mut per_type: BTreeMap<String, Vec<(i64, u32)>> = TRACKED_TYPES
            .iter()
            .map(|t| (t.label().to_string(), Vec::new()))
            .collect();
        for (age, summary) in &aged {
            per_type
                .entry(summary.activity_type().label().to_string())
                .or_default()
                .push((*age, summary.training_load));
        }

        let by_type = per_type
            .into_iter()
            .map(|(label, loads)| (label, self.metrics(&loads)))
            .collect();

        LoadRollups {
            cardio: self.metrics(&all),
            by_type,
            zone_minutes_7day: self.zone_rollup(&aged, self.config.fatigue_window_days),
            zone_minutes_42day: self.zone_rollup(&aged, self.config.fitness_window_days),
            computed_at: Some(now),
        }
    }

    fn zone_rollup(&self, aged: &[(i64, &ActivitySummary)], window_days: u16) -> ZoneMinutes {
        let window = i64::from(window_days);
        let mut totals = [0u32; 5];
        for (_, summary) in aged.iter().filter(|(age, _)| (0..window).contains(age)) {
            for (total, minutes) in totals.iter_mut().zip(summary.zone_minutes_or_zero()) {
                *total = total.saturating_add(minutes);
            }
        }
        totals
    }

    /// One row per calendar day from the oldest activity's date to `today`
    pub fn daily_series(&self, history: &[ActivitySummary], today: NaiveDate) -> Vec<DailyLoad> {
        let Some(first) = history.iter().map(|s| s.start().date_naive()).min() else {
            return Vec::new();
        };

        let mut daily_loads: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for summary in history {
            *daily_loads.entry(summary.start().date_naive()).or_default() += summary.training_load;
        }

        let of_type = |activity_type: &ActivityType| -> Vec<&ActivitySummary> {
            history
                .iter()
                .filter(|s| s.activity_type() == activity_type)
                .collect()
        };
        let all: Vec<&ActivitySummary> = history.iter().collect();
        let cycling = of_type(&ActivityType::Cycling);
        let running = of_type(&ActivityType::Running);

        let mut series = Vec::new();
        for date in first.iter_days().take_while(|date| *date <= today) {
            let cardio = self.raw_load_on(&all, date);
            let cycling = self.raw_load_on(&cycling, date);
            let running = self.raw_load_on(&running, date);

            series.push(DailyLoad {
                date,
                training_load: daily_loads.get(&date).copied().unwrap_or(0),
                cardio_fitness: cardio.fitness,
                cardio_fatigue: cardio.fatigue,
                cardio_form: cardio.form(),
                cycling_fitness: cycling.fitness,
                cycling_fatigue: cycling.fatigue,
                cycling_form: cycling.form(),
                running_fitness: running.fitness,
                running_fatigue: running.fatigue,
                running_form: running.form(),
            });
        }

        series
    }

    fn raw_load_on(&self, summaries: &[&ActivitySummary], date: NaiveDate) -> RawLoad {
        let loads: Vec<(i64, u32)> = summaries
            .iter()
            .map(|s| ((date - s.start().date_naive()).num_days(), s.training_load))
            .collect();
        self.raw_load(&loads)
    }
}

/// One athlete's zone boundaries, retained history and derived rollups
#[derive(Debug, Clone)]
pub struct AthleteState {
    athlete_id: String,
    zones: ZoneBoundaries,
    engine: TrainingLoadEngine,
    history: Vec<ActivitySummary>,
    rollups: LoadRollups,
}

impl AthleteState {
    pub fn new(athlete_id: impl Into<String>, zones: ZoneBoundaries, config: LoadModelConfig) -> Self {
        AthleteState {
            athlete_id: athlete_id.into(),
            zones,
            engine: TrainingLoadEngine::with_config(config),
            history: Vec::new(),
            rollups: LoadRollups::default(),
        }
    }

    pub fn athlete_id(&self) -> &str {
        &self.athlete_id
    }

    pub fn zones(&self) -> &ZoneBoundaries {
        &self.zones
    }

    pub fn config(&self) -> &LoadModelConfig {
        self.engine.config()
    }

    /// Retained summaries, ordered by start time
    pub fn history(&self) -> &[ActivitySummary] {
        &self.history
    }

    pub fn rollups(&self) -> &LoadRollups {
        &self.rollups
    }

    /// Insert a summary in start order and recompute.
    ///
    /// A summary whose start timestamp is already present is rejected and
    /// leaves the state untouched.
    pub fn add_activity(
        &mut self,
        summary: ActivitySummary,
        now: DateTime<Utc>,
    ) -> Result<&LoadRollups, LoadError> {
        let start = summary.start();
        let position = match self.history.binary_search_by_key(&start, |s| s.start()) {
            Ok(_) => {
                warn!(
                    athlete_id = %self.athlete_id,
                    %start,
                    "Rejected duplicate activity"
                );
                return Err(LoadError::DuplicateActivity { start });
            }
            Err(position) => position,
        };

        debug!(
            athlete_id = %self.athlete_id,
            %start,
            activity_type = %summary.activity_type(),
            training_load = summary.training_load,
            "Adding activity"
        );

        let mut history = self.history.clone();
        history.insert(position, summary);
        self.commit(history, now);

        Ok(&self.rollups)
    }

    /// Prune expired history and recompute every rollup at `now`
    pub fn recompute(&mut self, now: DateTime<Utc>) -> &LoadRollups {
        let history = self.history.clone();
        self.commit(history, now);
        &self.rollups
    }

    /// Build the pruned history and its rollups, then swap both in together
    fn commit(&mut self, history: Vec<ActivitySummary>, now: DateTime<Utc>) {
        let before = history.len();
        let history: Vec<ActivitySummary> = history
            .into_iter()
            .filter(|summary| self.engine.is_retained(summary, now))
            .collect();
        let pruned = before - history.len();

        let rollups = self.engine.compute(&history, now);

        self.history = history;
        self.rollups = rollups;

        info!(
            athlete_id = %self.athlete_id,
            activities = self.history.len(),
            pruned,
            fitness = self.rollups.cardio.fitness,
            fatigue = self.rollups.cardio.fatigue,
            form = self.rollups.cardio.form,
            "Recomputed training load"
        );
    }

    /// Read-only copy of the state for reporting
    pub fn snapshot(&self) -> AthleteSnapshot {
        AthleteSnapshot {
            athlete_id: self.athlete_id.clone(),
            zone_boundaries: self.zones.boundaries(),
            activity_count: self.history.len(),
            form_interpretation: self.rollups.cardio.interpretation(),
            rollups: self.rollups.clone(),
            history: self.history.clone(),
        }
    }

    pub fn daily_series(&self, today: NaiveDate) -> Vec<DailyLoad> {
        self.engine.daily_series(&self.history, today)
    }
}

/// Read-only snapshot of an athlete's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteSnapshot {
    pub athlete_id: String,
    pub zone_boundaries: [u16; 4],
    pub activity_count: usize,
    pub form_interpretation: FormInterpretation,
    pub rollups: LoadRollups,
    pub history: Vec<ActivitySummary>,
}

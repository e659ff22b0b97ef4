//! Concurrent athlete registry
//!
//! Each athlete's state sits behind its own mutex so updates for one athlete
//! are serialized while different athletes proceed independently. The outer
//! map lock is held only long enough to look up or insert an entry.

use crate::config::AppConfig;
use crate::error::{LoadError, TrackLoadError};
use crate::formulas::FormulaPreset;
use crate::models::{ActivitySummary, RawActivity};
use crate::pipeline::{ActivityPipeline, ProcessedActivity};
use crate::pmc::{AthleteSnapshot, AthleteState, DailyLoad, LoadModelConfig, LoadRollups};
use crate::zones::ZoneBoundaries;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

type SharedState = Arc<Mutex<AthleteState>>;

/// All known athletes and their training load state
#[derive(Debug, Default)]
pub struct AthleteRegistry {
    preset: FormulaPreset,
    load_config: LoadModelConfig,
    athletes: RwLock<HashMap<String, SharedState>>,
}

impl AthleteRegistry {
    pub fn new(preset: FormulaPreset) -> Self {
        let load_config = preset.load_config();
        Self::with_load_config(preset, load_config)
    }

    pub fn with_load_config(preset: FormulaPreset, load_config: LoadModelConfig) -> Self {
        AthleteRegistry {
            preset,
            load_config,
            athletes: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the configured preset, windows and athletes
    pub fn from_config(config: &AppConfig) -> Result<Self, TrackLoadError> {
        config.validate()?;
        let registry =
            Self::with_load_config(config.model.formula_preset(), config.model.load_config());
        for athlete in config.athletes.values() {
            registry.register(&athlete.id, athlete.zone_boundaries()?)?;
        }
        Ok(registry)
    }

    pub fn preset(&self) -> &FormulaPreset {
        &self.preset
    }

    /// Register an athlete. Returns false if the id was already registered,
    /// in which case the existing state is kept.
    pub fn register(&self, athlete_id: &str, zones: ZoneBoundaries) -> Result<bool, LoadError> {
        let mut athletes = self
            .athletes
            .write()
            .map_err(|_| unavailable(athlete_id))?;

        if athletes.contains_key(athlete_id) {
            return Ok(false);
        }

        let state = AthleteState::new(athlete_id, zones, self.load_config);
        athletes.insert(athlete_id.to_string(), Arc::new(Mutex::new(state)));
        info!(athlete_id, zones = ?zones.boundaries(), "Registered athlete");
        Ok(true)
    }

    pub fn athlete_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .athletes
            .read()
            .map(|athletes| athletes.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn contains(&self, athlete_id: &str) -> bool {
        self.athletes
            .read()
            .map(|athletes| athletes.contains_key(athlete_id))
            .unwrap_or(false)
    }

    fn state(&self, athlete_id: &str) -> Result<SharedState, LoadError> {
        let athletes = self
            .athletes
            .read()
            .map_err(|_| unavailable(athlete_id))?;
        athletes
            .get(athlete_id)
            .cloned()
            .ok_or_else(|| LoadError::UnknownAthlete {
                athlete_id: athlete_id.to_string(),
            })
    }

    /// Run `f` with exclusive access to one athlete's state
    fn with_state<T>(
        &self,
        athlete_id: &str,
        f: impl FnOnce(&mut AthleteState) -> Result<T, LoadError>,
    ) -> Result<T, LoadError> {
        let shared = self.state(athlete_id)?;
        let mut guard: MutexGuard<'_, AthleteState> =
            shared.lock().map_err(|_| unavailable(athlete_id))?;
        f(&mut guard)
    }

    /// Add an already summarized activity and return the new rollups
    pub fn add_activity(
        &self,
        athlete_id: &str,
        summary: ActivitySummary,
        now: DateTime<Utc>,
    ) -> Result<LoadRollups, LoadError> {
        self.with_state(athlete_id, |state| {
            state.add_activity(summary, now).map(LoadRollups::clone)
        })
    }

    /// Process a raw activity with the athlete's zones and add the result.
    ///
    /// The pipeline runs outside the athlete lock; only the insert is serialized.
    pub fn ingest(
        &self,
        athlete_id: &str,
        activity: &RawActivity,
        now: DateTime<Utc>,
    ) -> Result<ProcessedActivity, LoadError> {
        let zones = self.with_state(athlete_id, |state| Ok(*state.zones()))?;
        let processed = ActivityPipeline::new(zones, &self.preset).process(activity);

        self.add_activity(athlete_id, processed.summary.clone(), now)?;
        Ok(processed)
    }

    pub fn recompute(&self, athlete_id: &str, now: DateTime<Utc>) -> Result<LoadRollups, LoadError> {
        self.with_state(athlete_id, |state| Ok(state.recompute(now).clone()))
    }

    /// Recompute every athlete; athletes whose state is unavailable are skipped
    pub fn recompute_all(&self, now: DateTime<Utc>) -> usize {
        let mut recomputed = 0;
        for athlete_id in self.athlete_ids() {
            match self.recompute(&athlete_id, now) {
                Ok(_) => recomputed += 1,
                Err(e) => warn!(athlete_id = %athlete_id, error = %e, "Skipped recompute"),
            }
        }
        recomputed
    }

    pub fn snapshot(&self, athlete_id: &str) -> Result<AthleteSnapshot, LoadError> {
        self.with_state(athlete_id, |state| Ok(state.snapshot()))
    }

    pub fn daily_series(&self, athlete_id: &str, today: NaiveDate) -> Result<Vec<DailyLoad>, LoadError> {
        self.with_state(athlete_id, |state| Ok(state.daily_series(today)))
    }
}

fn unavailable(athlete_id: &str) -> LoadError {
    LoadError::StateUnavailable {
        athlete_id: athlete_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AthleteConfig;
    use crate::models::{ActivityIdentity, ActivityType, RawSample};
    use chrono::{Duration, TimeZone};
    use std::thread;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 23, 20, 0, 0).unwrap()
    }

    fn workout(hours_ago: i64, load: u32) -> ActivitySummary {
        ActivitySummary {
            training_load: load,
            ..ActivitySummary::empty(ActivityIdentity::new(
                now() - Duration::hours(hours_ago),
                ActivityType::Running,
                "Run",
            ))
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = AthleteRegistry::default();
        assert!(registry.register("a", ZoneBoundaries::default()).unwrap());
        assert!(!registry.register("a", ZoneBoundaries::default()).unwrap());
        assert_eq!(registry.athlete_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_from_config() {
        let mut config = AppConfig::default();
        config.model.fitness_window_days = 28;
        config
            .add_athlete(AthleteConfig::new("Rider".to_string(), Some("r1".to_string())).with_max_hr(200))
            .unwrap();

        let registry = AthleteRegistry::from_config(&config).unwrap();
        let snapshot = registry.snapshot("r1").unwrap();
        assert_eq!(snapshot.zone_boundaries, [118, 156, 174, 194]);

        // 30 days old is outside a 28-day retention window
        registry.add_activity("r1", workout(30 * 24, 100), now()).unwrap();
        assert_eq!(registry.snapshot("r1").unwrap().activity_count, 0);
    }

    #[test]
    fn test_unknown_athlete() {
        let registry = AthleteRegistry::default();
        assert_eq!(
            registry.snapshot("nobody"),
            Err(LoadError::UnknownAthlete {
                athlete_id: "nobody".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_through_registry() {
        let registry = AthleteRegistry::default();
        registry.register("a", ZoneBoundaries::default()).unwrap();
        registry.add_activity("a", workout(2, 100), now()).unwrap();

        let result = registry.add_activity("a", workout(2, 100), now());
        assert!(matches!(result, Err(LoadError::DuplicateActivity { .. })));
        assert_eq!(registry.snapshot("a").unwrap().activity_count, 1);
    }

    #[test]
    fn test_ingest_uses_athlete_zones() {
        let registry = AthleteRegistry::default();
        // everything at 140 bpm is zone 4 for this athlete
        registry
            .register("a", ZoneBoundaries::new([100, 120, 135, 170]).unwrap())
            .unwrap();

        let start = now() - Duration::hours(3);
        let activity = RawActivity {
            identity: ActivityIdentity::new(start, ActivityType::Running, "Treadmill"),
            samples: (0..=10)
                .map(|i| RawSample {
                    timestamp: Some(start + Duration::minutes(i)),
                    heart_rate: Some(140),
                    ..RawSample::default()
                })
                .collect(),
        };

        let processed = registry.ingest("a", &activity, now()).unwrap();
        assert_eq!(processed.summary.zone_minutes, Some([0, 0, 0, 10, 0]));
        assert_eq!(processed.summary.training_load, 16); // floor(10 * 1.6667)
        assert_eq!(registry.snapshot("a").unwrap().history, vec![processed.summary]);
    }

    #[test]
    fn test_concurrent_athletes_are_independent() {
        let registry = Arc::new(AthleteRegistry::default());
        for id in ["a", "b", "c", "d"] {
            registry.register(id, ZoneBoundaries::default()).unwrap();
        }

        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for hours in 0..24 {
                        registry.add_activity(id, workout(hours, 10), now()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in ["a", "b", "c", "d"] {
            assert_eq!(registry.snapshot(id).unwrap().activity_count, 24);
        }
        assert_eq!(registry.recompute_all(now()), 4);
    }

    #[test]
    fn test_concurrent_writers_same_athlete() {
        let registry = Arc::new(AthleteRegistry::default());
        registry.register("a", ZoneBoundaries::default()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..10 {
                        let _ = registry.add_activity("a", workout(worker * 10 + i, 5), now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot("a").unwrap();
        assert_eq!(snapshot.activity_count, 40);
        let starts: Vec<_> = snapshot.history.iter().map(|s| s.start()).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }
}

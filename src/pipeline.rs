//! Per-activity processing pipeline
//!
//! Raw samples flow through the normalizer, the feature engineer and the
//! summarizer. Every stage is pure, so independent activities can be
//! processed in parallel with [`ActivityPipeline::process_batch`].

use crate::error::DataIssue;
use crate::features::FeatureEngineer;
use crate::formulas::FormulaPreset;
use crate::models::{ActivitySummary, RawActivity};
use crate::normalize::SampleNormalizer;
use crate::summary::ActivitySummarizer;
use crate::zones::ZoneBoundaries;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Output of the pipeline for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedActivity {
    pub summary: ActivitySummary,

    /// Data-quality findings from every stage, in stage order
    pub issues: Vec<DataIssue>,

    /// True when the activity type was inferred from average speed
    pub reclassified: bool,
}

/// Normalizer, feature engineer and summarizer configured for one athlete
#[derive(Debug, Clone)]
pub struct ActivityPipeline {
    normalizer: SampleNormalizer,
    engineer: FeatureEngineer,
    summarizer: ActivitySummarizer,
}

impl Default for ActivityPipeline {
    fn default() -> Self {
        Self::new(ZoneBoundaries::default(), &FormulaPreset::default())
    }
}

impl ActivityPipeline {
    pub fn new(zones: ZoneBoundaries, preset: &FormulaPreset) -> Self {
        ActivityPipeline {
            normalizer: SampleNormalizer::new(),
            engineer: FeatureEngineer::with_thresholds(zones, preset.moving_thresholds),
            summarizer: ActivitySummarizer::with_weights(preset.zone_weights),
        }
    }

    pub fn zones(&self) -> &ZoneBoundaries {
        self.engineer.zones()
    }

    /// Run one activity through every stage
    pub fn process(&self, activity: &RawActivity) -> ProcessedActivity {
        let span = info_span!(
            "process_activity",
            name = %activity.identity.name,
            start = %activity.identity.start
        );
        let _guard = span.enter();

        let track = self.normalizer.normalize(&activity.samples);
        let mut issues = track.issues;
        for issue in &issues {
            warn!(kind = ?issue.kind, "{}", issue);
        }

        let table = self
            .engineer
            .engineer(&track.samples, activity.identity.activity_type.clone());
        let reclassified = table.reclassified;

        let summary =
            self.summarizer
                .summarize_with_issues(activity.identity.clone(), &table, &mut issues);

        debug!(
            samples = summary.sample_count,
            training_load = summary.training_load,
            issues = issues.len(),
            "Processed activity"
        );

        ProcessedActivity {
            summary,
            issues,
            reclassified,
        }
    }

    /// Process independent activities in parallel; output order matches input order
    pub fn process_batch(&self, activities: &[RawActivity]) -> Vec<ProcessedActivity> {
        let started = Instant::now();

        let processed: Vec<ProcessedActivity> = activities
            .par_iter()
            .map(|activity| self.process(activity))
            .collect();

        info!(
            activities = processed.len(),
            issues = processed.iter().map(|p| p.issues.len()).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processed activity batch"
        );

        processed
    }
}

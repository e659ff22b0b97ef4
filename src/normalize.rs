//! Sample normalization
//!
//! Turns a raw, partially-missing sample stream into the canonical sample
//! table. An isolated interior gap is filled with the midpoint of its two
//! neighbours. Runs of two or more missing values are left unknown and
//! flagged, and the first and last rows are never imputed.

use crate::error::{DataIssue, IssueKind};
use crate::models::{RawSample, Sample, SampleField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Normalized sample table plus the data-quality findings raised while building it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTrack {
    pub samples: Vec<Sample>,
    pub issues: Vec<DataIssue>,
}

impl NormalizedTrack {
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &DataIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }
}

/// Midpoint of two known values of a column
trait Midpoint: Copy {
    fn midpoint(self, other: Self) -> Self;
}

impl Midpoint for f64 {
    fn midpoint(self, other: Self) -> Self {
        (self + other) * 0.5
    }
}

impl Midpoint for u16 {
    // Integer columns keep their type; the half is truncated.
    fn midpoint(self, other: Self) -> Self {
        ((u32::from(self) + u32::from(other)) / 2) as u16
    }
}

impl Midpoint for DateTime<Utc> {
    fn midpoint(self, other: Self) -> Self {
        self + (other - self) / 2
    }
}

/// Single-neighbour-average sample normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleNormalizer;

impl SampleNormalizer {
    pub fn new() -> Self {
        SampleNormalizer
    }

    /// Normalize a raw sample stream. Output length always equals input length.
    pub fn normalize(&self, raw: &[RawSample]) -> NormalizedTrack {
        self.normalize_samples(raw.iter().map(Sample::from).collect())
    }

    /// Normalize an already-canonical sample table.
    ///
    /// Re-running this on its own output yields the same samples and issues:
    /// unrepaired runs are still `None` and are flagged again.
    pub fn normalize_samples(&self, mut samples: Vec<Sample>) -> NormalizedTrack {
        let mut issues = Vec::new();

        impute_column(
            &mut samples,
            SampleField::Timestamp,
            |s| s.timestamp,
            |s, v| s.timestamp = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::Latitude,
            |s| s.latitude,
            |s, v| s.latitude = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::Longitude,
            |s| s.longitude,
            |s, v| s.longitude = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::Elevation,
            |s| s.elevation,
            |s, v| s.elevation = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::HeartRate,
            |s| s.heart_rate,
            |s, v| s.heart_rate = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::Cadence,
            |s| s.cadence,
            |s, v| s.cadence = Some(v),
            &mut issues,
        );
        impute_column(
            &mut samples,
            SampleField::Temperature,
            |s| s.temperature,
            |s, v| s.temperature = Some(v),
            &mut issues,
        );

        check_ordering(&samples);

        if !issues.is_empty() {
            debug!(
                samples = samples.len(),
                issues = issues.len(),
                "Normalization finished with data-quality issues"
            );
        }

        NormalizedTrack { samples, issues }
    }
}

/// Fill the interior gaps of one column in place.
///
/// A column with no known values at all is left untouched: the feature it
/// feeds is inapplicable, not missing.
fn impute_column<T: Midpoint>(
    samples: &mut [Sample],
    field: SampleField,
    get: fn(&Sample) -> Option<T>,
    set: fn(&mut Sample, T),
    issues: &mut Vec<DataIssue>,
) {
    let values: Vec<Option<T>> = samples.iter().map(get).collect();
    let len = values.len();

    if values.iter().all(Option::is_none) {
        return;
    }

    let last = len - 1;
    if values[0].is_none() {
        issues.push(DataIssue::incomplete_boundary(field, 0));
    }
    if last > 0 && values[last].is_none() {
        issues.push(DataIssue::incomplete_boundary(field, last));
    }

    let mut index = 0;
    while index < len {
        if values[index].is_some() {
            index += 1;
            continue;
        }

        // Maximal run of missing values: [start, end)
        let start = index;
        while index < len && values[index].is_none() {
            index += 1;
        }
        let end = index;

        let interior: Vec<usize> = (start..end).filter(|&row| row != 0 && row != last).collect();
        if interior.is_empty() {
            continue;
        }

        let before = start.checked_sub(1).and_then(|row| values[row]);
        let after = values.get(end).copied().flatten();

        // Only an isolated gap has a neighbour on both sides. Longer runs, and
        // runs reaching a missing boundary row, stay unknown and are flagged.
        match (before, after) {
            (Some(before), Some(after)) if interior.len() == 1 => {
                set(&mut samples[interior[0]], before.midpoint(after));
            }
            _ => issues.push(DataIssue::partially_imputed(field, interior)),
        }
    }
}

fn check_ordering(samples: &[Sample]) {
    let mut previous: Option<DateTime<Utc>> = None;
    for (row, sample) in samples.iter().enumerate() {
        if let Some(timestamp) = sample.timestamp {
            if let Some(prev) = previous {
                if timestamp < prev {
                    warn!(row, "Sample timestamps go backwards; rows are kept in source order");
                    return;
                }
            }
            previous = Some(timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(seconds: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds))
    }

    fn hr_samples(values: &[Option<u16>]) -> Vec<RawSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, hr)| RawSample {
                timestamp: at(i as i64 * 5),
                heart_rate: *hr,
                ..RawSample::default()
            })
            .collect()
    }

    #[test]
    fn test_single_gap_uses_neighbour_midpoint() {
        let raw = hr_samples(&[Some(120), None, Some(131), Some(140)]);
        let track = SampleNormalizer::new().normalize(&raw);

        assert_eq!(track.samples.len(), 4);
        assert_eq!(track.samples[1].heart_rate, Some(125)); // (120 + 131) / 2 truncated
        assert!(track.issues.is_empty());
    }

    #[test]
    fn test_float_and_timestamp_midpoints() {
        let mut raw = hr_samples(&[Some(120), Some(121), Some(122)]);
        raw[0].elevation = Some(100.0);
        raw[2].elevation = Some(103.0);
        raw[1].timestamp = None;

        let track = SampleNormalizer::new().normalize(&raw);

        assert_eq!(track.samples[1].elevation, Some(101.5));
        assert_eq!(track.samples[1].timestamp, at(5));
    }

    #[test]
    fn test_boundaries_are_never_imputed() {
        let raw = hr_samples(&[None, Some(130), Some(135), None]);
        let track = SampleNormalizer::new().normalize(&raw);

        assert_eq!(track.samples[0].heart_rate, None);
        assert_eq!(track.samples[3].heart_rate, None);

        let boundary: Vec<_> = track.issues_of(IssueKind::IncompleteBoundaryData).collect();
        assert_eq!(boundary.len(), 2);
        assert_eq!(boundary[0].rows, vec![0]);
        assert_eq!(boundary[1].rows, vec![3]);
    }

    #[test]
    fn test_consecutive_gap_is_flagged() {
        let raw = hr_samples(&[Some(120), None, None, Some(140)]);
        let track = SampleNormalizer::new().normalize(&raw);

        assert!(track.has_issue(IssueKind::PartiallyImputed));
        let issue = track.issues_of(IssueKind::PartiallyImputed).next().unwrap();
        assert_eq!(issue.field, Some(SampleField::HeartRate));
        assert_eq!(issue.rows, vec![1, 2]);
        assert_eq!(track.samples[1].heart_rate, None);
        assert_eq!(track.samples[2].heart_rate, None);
    }

    #[test]
    fn test_consecutive_gap_is_flagged_again_on_rerun() {
        let normalizer = SampleNormalizer::new();
        let raw = hr_samples(&[Some(120), None, None, Some(140)]);
        let first = normalizer.normalize(&raw);
        let second = normalizer.normalize_samples(first.samples.clone());

        assert_eq!(second.samples, first.samples);
        assert_eq!(second.issues, first.issues);
        assert!(second.has_issue(IssueKind::PartiallyImputed));
    }

    #[test]
    fn test_gap_touching_missing_boundary_stays_unknown() {
        let raw = hr_samples(&[None, None, Some(130), Some(140)]);
        let track = SampleNormalizer::new().normalize(&raw);

        assert_eq!(track.samples[1].heart_rate, None);
        assert!(track.has_issue(IssueKind::IncompleteBoundaryData));
        assert!(track.has_issue(IssueKind::PartiallyImputed));
    }

    #[test]
    fn test_absent_column_is_not_an_issue() {
        let raw = hr_samples(&[Some(120), Some(125), Some(130)]);
        let track = SampleNormalizer::new().normalize(&raw);

        assert!(track.issues.is_empty());
        assert!(track.samples.iter().all(|s| s.latitude.is_none()));
    }

    #[test]
    fn test_empty_input() {
        let track = SampleNormalizer::new().normalize(&[]);
        assert!(track.samples.is_empty());
        assert!(track.issues.is_empty());
    }

    fn arb_raw() -> impl Strategy<Value = Vec<RawSample>> {
        prop::collection::vec(
            (
                prop::option::weighted(0.7, 60u16..200),
                prop::option::weighted(0.7, -50.0f64..50.0),
            ),
            0..40,
        )
        .prop_map(|cols| {
            cols.into_iter()
                .enumerate()
                .map(|(i, (hr, ele))| RawSample {
                    timestamp: at(i as i64),
                    heart_rate: hr,
                    elevation: ele,
                    ..RawSample::default()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_never_reorders(raw in arb_raw()) {
            let track = SampleNormalizer::new().normalize(&raw);
            prop_assert_eq!(track.samples.len(), raw.len());
            for (sample, original) in track.samples.iter().zip(&raw) {
                prop_assert_eq!(sample.timestamp, original.timestamp);
                if original.heart_rate.is_some() {
                    prop_assert_eq!(sample.heart_rate, original.heart_rate);
                }
            }
        }

        #[test]
        fn test_idempotent(raw in arb_raw()) {
            let normalizer = SampleNormalizer::new();
            let first = normalizer.normalize(&raw);
            let second = normalizer.normalize_samples(first.samples.clone());
            prop_assert_eq!(&first.samples, &second.samples);
            prop_assert_eq!(&first.issues, &second.issues);
        }

        #[test]
        fn test_isolated_interior_gaps_are_filled(raw in arb_raw()) {
            let track = SampleNormalizer::new().normalize(&raw);
            let n = raw.len();
            for i in 1..n.saturating_sub(1) {
                let isolated = raw[i].heart_rate.is_none()
                    && raw[i - 1].heart_rate.is_some()
                    && raw[i + 1].heart_rate.is_some();
                if isolated {
                    prop_assert!(track.samples[i].heart_rate.is_some());
                }
            }
        }
    }
}

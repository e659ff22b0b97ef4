use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::tempdir;

/// End-to-end workflows: file import through athlete rollups and reports

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use trackload::export::{export_report, AthleteReport, ExportFormat};
    use trackload::import::gpx::parse_gpx;
    use trackload::import::ImportManager;
    use trackload::{
        ActivityPipeline, ActivityType, AppConfig, AthleteConfig, AthleteRegistry, FormulaPreset,
        IssueKind, LoadError, LoadMetrics, ZoneBoundaries,
    };

    fn ride_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 21, 7, 0, 0).unwrap()
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Northbound GPX track, one point per minute, roughly 20 mph
    fn gpx_ride(
        start: DateTime<Utc>,
        minutes: i64,
        activity_type: Option<&str>,
        heart_rate_at: impl Fn(i64) -> Option<u16>,
    ) -> String {
        let mut points = String::new();
        for i in 0..=minutes {
            let heart_rate = heart_rate_at(i)
                .map(|hr| format!("<ns3:hr>{}</ns3:hr>", hr))
                .unwrap_or_default();
            points.push_str(&format!(
                r#"<trkpt lat="{:.4}" lon="-105.0000"><ele>1600.0</ele><time>{}</time><extensions><ns3:TrackPointExtension>{}<ns3:cad>90</ns3:cad></ns3:TrackPointExtension></extensions></trkpt>
"#,
                40.0 + 0.005 * i as f64,
                timestamp(start + Duration::minutes(i)),
                heart_rate
            ));
        }

        let type_element = activity_type
            .map(|t| format!("<type>{}</type>", t))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx creator="Garmin Edge 530" version="1.1" xmlns="http://www.topografix.com/GPX/1/1" xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
<metadata><time>{}</time></metadata>
<trk><name>Morning Ride</name>{}<trkseg>
{}</trkseg></trk>
</gpx>"#,
            timestamp(start),
            type_element,
            points
        )
    }

    /// TCX run, one trackpoint per minute, roughly 10 mph
    fn tcx_run(start: DateTime<Utc>, minutes: i64, heart_rate: u16) -> String {
        let mut trackpoints = String::new();
        for i in 0..=minutes {
            trackpoints.push_str(&format!(
                "<Trackpoint><Time>{}</Time><Position><LatitudeDegrees>{:.4}</LatitudeDegrees>\
                 <LongitudeDegrees>-105.0000</LongitudeDegrees></Position>\
                 <AltitudeMeters>1600.0</AltitudeMeters>\
                 <HeartRateBpm><Value>{}</Value></HeartRateBpm></Trackpoint>\n",
                timestamp(start + Duration::minutes(i)),
                40.0 + 0.0025 * i as f64,
                heart_rate
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
<Activities><Activity Sport="Running"><Id>{}</Id>
<Lap StartTime="{}"><Track>
{}</Track></Lap>
</Activity></Activities>
</TrainingCenterDatabase>"#,
            timestamp(start),
            timestamp(start),
            trackpoints
        )
    }

    /// One hour in zone 3 with default boundaries yields load 45
    #[test]
    fn test_gpx_ride_to_athlete_rollups() {
        let activity = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |_| Some(160))).unwrap();
        assert_eq!(activity.identity.activity_type, ActivityType::Cycling);
        assert_eq!(activity.identity.name, "Morning Ride");
        assert_eq!(activity.samples.len(), 61);

        let registry = AthleteRegistry::default();
        registry.register("rider", ZoneBoundaries::default()).unwrap();

        let now = ride_start() + Duration::hours(2);
        let processed = registry.ingest("rider", &activity, now).unwrap();

        assert!(processed.issues.is_empty());
        assert!(!processed.reclassified);

        let summary = &processed.summary;
        assert_eq!(summary.zone_minutes, Some([0, 0, 60, 0, 0]));
        assert_eq!(summary.training_load, 45);
        assert_eq!(summary.avg_cadence, Some(90));
        assert_eq!(summary.moving_seconds, Some(3600));
        assert_eq!(summary.elevation_gain, Some(dec!(0.0)));

        let distance = summary.total_distance_2d.unwrap();
        assert!(distance > dec!(20.0) && distance < dec!(21.5));
        let speed = summary.avg_speed_2d.unwrap();
        assert!(speed > dec!(20.0) && speed < dec!(21.5));

        // fitness round(45 / 26.234) = 2, fatigue round(45 / 4.116) = 11
        let snapshot = registry.snapshot("rider").unwrap();
        assert_eq!(snapshot.activity_count, 1);
        assert_eq!(snapshot.rollups.cardio, LoadMetrics::new(2, 11));
        assert_eq!(snapshot.rollups.cardio.form, -9);
        assert_eq!(snapshot.rollups.by_type["cycling"], LoadMetrics::new(2, 11));
        assert_eq!(snapshot.rollups.by_type["running"], LoadMetrics::default());
        assert_eq!(snapshot.rollups.zone_minutes_7day, [0, 0, 60, 0, 0]);
        assert_eq!(snapshot.rollups.zone_minutes_42day, [0, 0, 60, 0, 0]);
    }

    #[test]
    fn test_heart_rate_gaps_are_repaired_or_flagged() {
        let pipeline = ActivityPipeline::default();

        // One dropped reading is filled from its neighbours
        let single_gap = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |i| {
            (i != 30).then_some(160)
        }))
        .unwrap();
        let processed = pipeline.process(&single_gap);
        assert!(processed.issues.is_empty());
        assert_eq!(processed.summary.zone_minutes, Some([0, 0, 60, 0, 0]));

        // Two consecutive dropped readings are flagged
        let double_gap = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |i| {
            (i != 30 && i != 31).then_some(160)
        }))
        .unwrap();
        let processed = pipeline.process(&double_gap);
        assert!(processed
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::PartiallyImputed));

        // A missing first reading is never imputed
        let boundary_gap = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |i| {
            (i != 0).then_some(160)
        }))
        .unwrap();
        let processed = pipeline.process(&boundary_gap);
        assert!(processed
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::IncompleteBoundaryData));
        assert_eq!(processed.summary.zone_minutes, Some([0, 0, 60, 0, 0]));
    }

    #[test]
    fn test_untyped_track_is_reclassified() {
        let activity = parse_gpx(&gpx_ride(ride_start(), 30, None, |_| Some(140))).unwrap();
        assert!(activity.identity.activity_type.is_unknown());

        let registry = AthleteRegistry::default();
        registry.register("rider", ZoneBoundaries::default()).unwrap();
        let processed = registry
            .ingest("rider", &activity, ride_start() + Duration::hours(1))
            .unwrap();

        assert!(processed.reclassified);
        assert_eq!(processed.summary.activity_type(), &ActivityType::Cycling);

        let snapshot = registry.snapshot("rider").unwrap();
        assert_eq!(snapshot.history[0].activity_type(), &ActivityType::Cycling);
        assert!(snapshot.rollups.by_type["cycling"].fatigue > 0);
    }

    #[test]
    fn test_import_directory_and_process_batch() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("ride.gpx"),
            gpx_ride(ride_start(), 60, Some("cycling"), |_| Some(160)),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("run.tcx"),
            tcx_run(ride_start() + Duration::days(1), 30, 140),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an activity").unwrap();
        std::fs::write(dir.path().join("broken.gpx"), "<gpx><trk>").unwrap();

        let manager = ImportManager::new();
        let activities = manager.import_directory(dir.path()).unwrap();
        assert_eq!(activities.len(), 2);

        let processed = ActivityPipeline::new(ZoneBoundaries::default(), &FormulaPreset::canonical())
            .process_batch(&activities);
        assert_eq!(processed.len(), 2);

        assert_eq!(processed[0].summary.activity_type(), &ActivityType::Cycling);
        assert_eq!(processed[0].summary.training_load, 45);

        // 30 minutes in zone 2: floor(30 * 0.4) = 12
        assert_eq!(processed[1].summary.activity_type(), &ActivityType::Running);
        assert_eq!(processed[1].summary.identity.name, "running activity on 2024-09-22");
        assert_eq!(processed[1].summary.zone_minutes, Some([0, 30, 0, 0, 0]));
        assert_eq!(processed[1].summary.training_load, 12);
    }

    #[test]
    fn test_history_window_and_duplicates() {
        let registry = AthleteRegistry::default();
        registry.register("rider", ZoneBoundaries::default()).unwrap();
        let now = ride_start() + Duration::hours(2);

        for days_ago in [50, 10, 0] {
            let start = ride_start() - Duration::days(days_ago);
            let activity = parse_gpx(&gpx_ride(start, 60, Some("cycling"), |_| Some(160))).unwrap();
            registry.ingest("rider", &activity, now).unwrap();
        }

        let snapshot = registry.snapshot("rider").unwrap();
        assert_eq!(snapshot.activity_count, 2);
        assert!(snapshot.history.windows(2).all(|w| w[0].start() < w[1].start()));
        assert_eq!(snapshot.rollups.zone_minutes_7day, [0, 0, 60, 0, 0]);
        assert_eq!(snapshot.rollups.zone_minutes_42day, [0, 0, 120, 0, 0]);

        let again = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |_| Some(160))).unwrap();
        let result = registry.ingest("rider", &again, now);
        assert!(matches!(result, Err(LoadError::DuplicateActivity { .. })));
        assert_eq!(registry.snapshot("rider").unwrap(), snapshot);
    }

    #[test]
    fn test_configured_athlete_zones_drive_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config
            .add_athlete(AthleteConfig::new("Sam".to_string(), Some("sam".to_string())).with_max_hr(200))
            .unwrap();
        config.save_to_file(&config_path).unwrap();

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        let registry = AthleteRegistry::from_config(&loaded).unwrap();
        assert_eq!(registry.athlete_ids(), vec!["sam".to_string()]);

        // Zones from max HR 200 are [118, 156, 174, 194]; 180 bpm is zone 4
        let activity = parse_gpx(&gpx_ride(ride_start(), 60, Some("cycling"), |_| Some(180))).unwrap();
        let processed = registry
            .ingest("sam", &activity, ride_start() + Duration::hours(2))
            .unwrap();

        assert_eq!(processed.summary.zone_minutes, Some([0, 0, 0, 60, 0]));
        assert_eq!(processed.summary.training_load, 100);

        let snapshot = registry.snapshot("sam").unwrap();
        assert_eq!(snapshot.zone_boundaries, [118, 156, 174, 194]);
    }

    #[test]
    fn test_report_export_round_trip() {
        let registry = AthleteRegistry::default();
        registry.register("rider", ZoneBoundaries::default()).unwrap();
        let now = ride_start() + Duration::days(3);

        for day in 0..3 {
            let start = ride_start() + Duration::days(day);
            let activity = parse_gpx(&gpx_ride(start, 45, Some("cycling"), |_| Some(160))).unwrap();
            registry.ingest("rider", &activity, now).unwrap();
        }

        let snapshot = registry.snapshot("rider").unwrap();
        let series = registry.daily_series("rider", now.date_naive()).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series[3].training_load, 0);
        assert!(series[2].cycling_fatigue > series[0].cycling_fatigue);

        let dir = tempdir().unwrap();
        let path = dir.path().join("rider.json");
        export_report(&snapshot, &series, ExportFormat::Json, &path).unwrap();

        let report: AthleteReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report.snapshot, snapshot);
        assert_eq!(report.daily_series, series);
    }

    #[test]
    fn test_unknown_athlete_is_rejected() {
        let registry = AthleteRegistry::default();
        let activity = parse_gpx(&gpx_ride(ride_start(), 10, Some("cycling"), |_| Some(160))).unwrap();

        assert!(matches!(
            registry.ingest("nobody", &activity, ride_start()),
            Err(LoadError::UnknownAthlete { .. })
        ));
    }
}

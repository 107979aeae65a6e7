//! End-to-end sweep scenarios against the mock camera
//!
//! These tests drive `SweepDriver` through complete, cancelled and failing
//! sweeps and check the results table, the image stack and the events the
//! presentation sink sees.

use ptc_tools::error::PtcError;
use ptc_tools::hardware::mock::{MockCamera, MockFault, MockMode};
use ptc_tools::operator::{AutoConfirm, Gate, MockLightGate, ScriptedGate};
use ptc_tools::presentation::{ChannelSink, CollectingSink};
use ptc_tools::config::SweepSettings;
use ptc_tools::ptc::{Pass, SweepDriver, SweepEvent, SweepOutcome, SweepState};
use std::sync::Arc;
use std::time::Duration;

fn settings(frames: usize, min: f64, max: f64, exposures: usize) -> SweepSettings {
    SweepSettings {
        nr_frames: frames,
        minimum_exposure: min,
        maximum_exposure: max,
        nr_exposures: exposures,
        frame_timeout: Duration::from_millis(250),
        interval_ms: 0.0,
    }
}

// =============================================================================
// Complete sweeps
// =============================================================================

#[tokio::test]
async fn test_dark_pass_is_darker_than_exposures() {
    let camera = Arc::new(MockCamera::builder(16, 16).seed(42).build());
    let gate = Arc::new(MockLightGate::new(Arc::new(AutoConfirm), Arc::clone(&camera)));
    let driver = SweepDriver::new(
        camera.clone(),
        gate,
        Box::new(CollectingSink::new()),
        settings(8, 1.0, 100.0, 3),
    );

    let report = driver.run().await.unwrap();
    assert!(report.outcome.is_complete());

    let rows = report.results.records();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].exposure, 0.0);

    // Dark frames: bias plus dark current only
    let bias = camera.sensor().bias_adu;
    assert!((rows[0].mean - bias).abs() < 2.0, "dark mean {}", rows[0].mean);

    // Illuminated means grow with exposure
    assert!(rows[1].mean > rows[0].mean);
    assert!(rows[2].mean > rows[1].mean);
    assert!(rows[3].mean > rows[2].mean);

    let expected = camera.sensor().expected_adu(100.0, true);
    assert!(
        (rows[3].mean - expected).abs() / expected < 0.01,
        "mean {} vs expected {}",
        rows[3].mean,
        expected
    );
}

#[tokio::test]
async fn test_std_dev_images_track_shot_noise() {
    let camera = Arc::new(MockCamera::builder(32, 32).seed(7).build());
    let gate = Arc::new(MockLightGate::new(Arc::new(AutoConfirm), Arc::clone(&camera)));
    let driver = SweepDriver::new(
        camera.clone(),
        gate,
        Box::new(CollectingSink::new()),
        settings(16, 1.0, 100.0, 2),
    );

    let report = driver.run().await.unwrap();
    assert_eq!(report.stack.frames(), 3);

    let dark_noise = report.stack.std_dev_slice(0).unwrap().mean();
    let bright_noise = report.stack.std_dev_slice(2).unwrap().mean();
    assert!(
        bright_noise > dark_noise * 3.0,
        "bright {bright_noise} dark {dark_noise}"
    );

    let bright_mean = report.stack.mean_slice(2).unwrap().mean();
    assert!(bright_mean > report.stack.mean_slice(1).unwrap().mean());
}

#[tokio::test]
async fn test_event_order_for_complete_sweep() {
    let camera = Arc::new(MockCamera::new(4, 4));
    let sink = CollectingSink::new();
    let events = sink.events();
    let driver = SweepDriver::new(
        camera,
        Arc::new(AutoConfirm),
        Box::new(sink),
        settings(2, 0.5, 2.0, 2),
    );
    driver.run().await.unwrap();

    let events = events.lock().unwrap();
    let states: Vec<SweepState> = events
        .iter()
        .filter_map(|e| match e {
            SweepEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SweepState::AwaitDarkConfirmation,
            SweepState::DarkPass,
            SweepState::AwaitLightConfirmation,
            SweepState::ExposureLoop { index: 0 },
            SweepState::ExposureLoop { index: 1 },
            SweepState::Complete,
        ]
    );

    let passes: Vec<Pass> = events
        .iter()
        .filter_map(|e| match e {
            SweepEvent::IterationCompleted(r) => Some(r.pass),
            _ => None,
        })
        .collect();
    assert_eq!(
        passes,
        vec![
            Pass::Dark,
            Pass::Exposure { index: 0 },
            Pass::Exposure { index: 1 }
        ]
    );
}

#[tokio::test]
async fn test_slices_handed_to_sink_are_the_stack_slices() {
    let camera = Arc::new(MockCamera::new(4, 4));
    let (sink, mut rx) = ChannelSink::new();
    let driver = SweepDriver::new(
        camera,
        Arc::new(AutoConfirm),
        Box::new(sink),
        settings(3, 0.1, 1.0, 2),
    );
    let report = driver.spawn().await.unwrap().unwrap();

    let mut published = Vec::new();
    while let Some(event) = rx.recv().await {
        if let SweepEvent::IterationCompleted(result) = event {
            published.push(result);
        }
    }
    assert_eq!(published.len(), 3);
    for (i, result) in published.iter().enumerate() {
        assert!(Arc::ptr_eq(&result.mean, report.stack.mean_slice(i).unwrap()));
        assert!(Arc::ptr_eq(&result.std_dev, report.stack.std_dev_slice(i).unwrap()));
        assert_eq!(&result.record, &report.results.records()[i]);
    }
}

#[tokio::test]
async fn test_quantized_exposures_are_recorded_as_applied() {
    let camera = Arc::new(MockCamera::builder(4, 4).exposure_step(0.25).build());
    let driver = SweepDriver::new(
        camera,
        Arc::new(AutoConfirm),
        Box::new(CollectingSink::new()),
        settings(2, 1.0, 3.0, 3),
    );

    let report = driver.run().await.unwrap();
    let exposures: Vec<f64> = report.results.records().iter().map(|r| r.exposure).collect();
    // sqrt(3) = 1.732... rounds to 1.75
    assert_eq!(exposures, vec![0.0, 1.0, 1.75, 3.0]);
}

// =============================================================================
// Cancellation and failure
// =============================================================================

#[tokio::test]
async fn test_cancel_at_light_gate_publishes_nothing() {
    let camera = Arc::new(MockCamera::new(4, 4));
    let gate = Arc::new(ScriptedGate::new([true, false]));
    let sink = CollectingSink::new();
    let events = sink.events();
    let driver = SweepDriver::new(
        camera.clone(),
        gate.clone(),
        Box::new(sink),
        settings(2, 1.0, 4.0, 3),
    );

    let report = driver.run().await.unwrap();
    assert!(matches!(report.outcome, SweepOutcome::Aborted { ref gate } if gate == "light"));
    assert!(report.results.is_empty());
    assert!(report.stack.is_empty());
    assert_eq!(camera.sequences_started(), 1);
    assert_eq!(gate.asked(), vec![Gate::Dark, Gate::Light]);

    let events = events.lock().unwrap();
    assert!(!events
        .iter()
        .any(|e| matches!(e, SweepEvent::IterationCompleted(_))));
    assert!(matches!(
        events.last(),
        Some(SweepEvent::Finished(SweepOutcome::Aborted { .. }))
    ));
}

#[cfg(feature = "storage_csv")]
#[tokio::test]
async fn test_cancel_at_light_gate_leaves_no_csv_file() {
    use ptc_tools::presentation::CsvSink;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ptc.csv");
    let driver = SweepDriver::new(
        Arc::new(MockCamera::new(4, 4)),
        Arc::new(ScriptedGate::new([true, false])),
        Box::new(CsvSink::create(&path).unwrap()),
        settings(2, 1.0, 4.0, 3),
    );

    let report = driver.run().await.unwrap();
    assert!(!report.outcome.is_complete());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_early_channel_close_fails_sweep_with_partial_results() {
    // sequence 2 is the first exposure
    let camera = Arc::new(
        MockCamera::builder(4, 4)
            .fault(MockFault::ShortSequence {
                nth: 2,
                after_frames: 1,
            })
            .build(),
    );
    let driver = SweepDriver::new(
        camera,
        Arc::new(AutoConfirm),
        Box::new(CollectingSink::new()),
        settings(3, 0.01, 0.1, 3),
    );

    let report = driver.run().await.unwrap();
    match &report.outcome {
        SweepOutcome::Failed { kind, message } => {
            assert_eq!(kind, "AcquisitionFailure");
            assert!(message.contains("1 of 3"), "{message}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results.records()[0].exposure, 0.0);
}

#[tokio::test]
async fn test_stalled_camera_fails_sweep_with_partial_results() {
    let camera = Arc::new(
        MockCamera::builder(4, 4)
            .fault(MockFault::StallSequence {
                nth: 3,
                after_frames: 1,
            })
            .build(),
    );
    let sink = CollectingSink::new();
    let events = sink.events();
    let driver = SweepDriver::new(
        camera.clone(),
        Arc::new(AutoConfirm),
        Box::new(sink),
        settings(4, 0.01, 0.1, 4),
    );

    let report = driver.run().await.unwrap();
    match &report.outcome {
        SweepOutcome::Failed { kind, message } => {
            assert_eq!(kind, "AcquisitionFailure");
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.stack.len(), 4);
    assert!(!ptc_tools::hardware::SequenceAcquisition::is_sequence_running(camera.as_ref())
        .await
        .unwrap());

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SweepEvent::StateChanged(SweepState::Failed))));
    assert!(matches!(
        events.last(),
        Some(SweepEvent::Finished(SweepOutcome::Failed { .. }))
    ));
}

#[tokio::test]
async fn test_out_of_range_exposure_fails_at_that_pass() {
    let camera = Arc::new(MockCamera::with_config(ptc_tools::hardware::mock::MockCameraConfig {
        width: 4,
        height: 4,
        max_exposure_s: 5.0,
        ..Default::default()
    }));
    let driver = SweepDriver::new(
        camera,
        Arc::new(AutoConfirm),
        Box::new(CollectingSink::new()),
        settings(2, 1.0, 10.0, 2),
    );

    let report = driver.run().await.unwrap();
    assert!(matches!(report.outcome, SweepOutcome::Failed { ref kind, .. } if kind == "AcquisitionFailure"));
    // dark pass and the 1 s exposure succeed, 10 s is rejected
    assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn test_closed_presentation_channel_fails_sweep() {
    let camera = Arc::new(MockCamera::new(4, 4));
    let (sink, rx) = ChannelSink::new();
    drop(rx);
    let driver = SweepDriver::new(
        camera.clone(),
        Arc::new(AutoConfirm),
        Box::new(sink),
        settings(2, 1.0, 2.0, 2),
    );

    let report = driver.run().await.unwrap();
    assert!(matches!(report.outcome, SweepOutcome::Failed { ref kind, .. } if kind == "OutputFailure"));
    assert_eq!(camera.sequences_started(), 0);
}

#[tokio::test]
async fn test_invalid_exposure_count_is_rejected_up_front() {
    let camera = Arc::new(MockCamera::new(4, 4));
    let driver = SweepDriver::new(
        camera.clone(),
        Arc::new(AutoConfirm),
        Box::new(CollectingSink::new()),
        settings(2, 1.0, 2.0, 1),
    );
    assert!(matches!(
        driver.run().await,
        Err(PtcError::InvalidConfiguration(_))
    ));
    assert_eq!(camera.sequences_started(), 0);
}

#[tokio::test]
async fn test_realistic_mode_completes_within_deadlines() {
    let camera = Arc::new(
        MockCamera::builder(4, 4)
            .mode(MockMode::Realistic)
            .seed(3)
            .build(),
    );
    let driver = SweepDriver::new(
        camera.clone(),
        Arc::new(AutoConfirm),
        Box::new(CollectingSink::new()),
        settings(3, 0.001, 0.01, 2),
    );
    let report = driver.run().await.unwrap();
    assert!(report.outcome.is_complete());
    assert_eq!(camera.frames_delivered(), 9);
}

//! End-to-end runs of batches against the simulated rig.

mod common;

use common::{angle_commands, point_at_bearing, rig, rig_with};
use std::time::Duration;
use tempfile::tempdir;
use visual_servo::calibration::Calibration;
use visual_servo::clock::CancelFlag;
use visual_servo::command::{parse_batch, CommandRecord};
use visual_servo::config::Settings;
use visual_servo::servo::{AlignmentFailure, AlignmentParams, AlignmentResult};
use visual_servo::session::{PassthroughCompiler, Session, SessionSummary};

fn visual_point_at(bearing_deg: f64, label: &str) -> CommandRecord {
    let target = point_at_bearing(bearing_deg, 100.0);
    CommandRecord::visual_point(target.x, target.y, label, 0)
}

#[tokio::test]
async fn test_converges_onto_target_below_axis() {
    let mut rig = rig(AlignmentParams::default());

    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(45.0, "bottle"))])
        .await
        .unwrap();

    let outcome = &report.alignments[0];
    let AlignmentResult::Aligned { steps, error_deg } = outcome.result else {
        panic!("expected convergence, got {:?}", outcome.result);
    };
    assert!(steps <= 10, "took {steps} steps");
    assert!(error_deg.abs() < 2.0);

    let angle = rig.dispatcher.actuator().angle();
    assert!((132..=138).contains(&angle), "ended at {angle}");
    assert_eq!(angle, rig.camera.physical_angle());
}

#[tokio::test]
async fn test_converges_onto_target_above_axis() {
    let mut rig = rig(AlignmentParams::default());

    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(-60.0, "lamp"))])
        .await
        .unwrap();

    assert!(report.alignments[0].result.is_aligned());
    let angle = rig.dispatcher.actuator().angle();
    assert!((27..=33).contains(&angle), "ended at {angle}");
    // Every command moved towards the target.
    let commands = angle_commands(&rig.transport);
    assert!(commands.windows(2).all(|w| w[1] <= w[0]));
}

#[tokio::test]
async fn test_unseen_markers_never_move_the_servo() {
    let mut rig = rig(AlignmentParams::default());
    rig.camera.black_out(usize::MAX);

    let batch = parse_batch(
        r#"[
            {"cmd": "LED1_ON", "delay": 100},
            {"cmd": "VISUAL_POINT", "target": "ghost", "x": 250, "y": 60, "delay": 200},
            {"cmd": "LED1_OFF", "delay": 300}
        ]"#,
    )
    .unwrap();
    let report = rig.dispatcher.execute(&batch).await.unwrap();

    assert_eq!(rig.transport.lines(), vec!["LED1_ON", "LED1_OFF"]);
    assert!(angle_commands(&rig.transport).is_empty());
    assert_eq!(rig.dispatcher.actuator().angle(), 90);
    assert_eq!(rig.camera.acquired(), 50);
    assert_eq!(
        report.alignments[0].result,
        AlignmentResult::Failed(AlignmentFailure::StepBudgetExhausted)
    );

    let sleeps = rig.clock.sleeps();
    assert_eq!(sleeps.len(), 53);
    assert_eq!(sleeps[0], Duration::from_millis(100));
    assert!(sleeps[1..51].iter().all(|d| *d == Duration::from_millis(150)));
    assert_eq!(&sleeps[51..], &[Duration::from_millis(200), Duration::from_millis(300)]);
}

#[tokio::test]
async fn test_recovers_after_brief_occlusion() {
    let mut rig = rig(AlignmentParams::default());
    rig.camera.black_out(3);

    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(30.0, "cup"))])
        .await
        .unwrap();

    let AlignmentResult::Aligned { steps, .. } = report.alignments[0].result else {
        panic!("expected convergence");
    };
    assert!(steps > 3);
}

#[tokio::test]
async fn test_persistent_loss_limit() {
    let params = AlignmentParams {
        max_consecutive_losses: Some(5),
        ..AlignmentParams::default()
    };
    let mut rig = rig(params);
    rig.camera.black_out(usize::MAX);

    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(30.0, "cup"))])
        .await
        .unwrap();

    assert_eq!(
        report.alignments[0].result,
        AlignmentResult::Failed(AlignmentFailure::MarkersLostPersistently)
    );
    assert_eq!(rig.camera.acquired(), 5);
}

#[tokio::test]
async fn test_calibrated_sweep_bounds_closed_loop_commands() {
    let calibration = Calibration::new(120, 60, 320).unwrap();
    let params = AlignmentParams {
        max_steps: 10,
        ..AlignmentParams::default()
    };
    let mut rig = rig_with(params, |servo| servo.with_calibration(&calibration));

    // Needs ~170°, outside the calibrated sweep.
    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(80.0, "door"))])
        .await
        .unwrap();

    assert_eq!(
        report.alignments[0].result,
        AlignmentResult::Failed(AlignmentFailure::StepBudgetExhausted)
    );
    let commands = angle_commands(&rig.transport);
    assert!(!commands.is_empty());
    assert!(commands.iter().all(|a| (60..=120).contains(a)));
    assert_eq!(rig.dispatcher.actuator().angle(), 120);
}

#[tokio::test]
async fn test_cancelled_alignment_takes_no_frames() {
    let flag = CancelFlag::new();
    let mut rig = rig_with(AlignmentParams::default(), |servo| {
        servo.with_cancel_flag(flag.clone())
    });
    flag.cancel();

    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(30.0, "cup")), Ok(CommandRecord::discrete("LED2_ON", 0))])
        .await
        .unwrap();

    assert_eq!(
        report.alignments[0].result,
        AlignmentResult::Failed(AlignmentFailure::Cancelled)
    );
    assert_eq!(rig.camera.acquired(), 0);
    assert_eq!(rig.transport.lines(), vec!["LED2_ON"]);
}

#[tokio::test]
async fn test_alignment_settings_from_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("visual_servo.toml");
    std::fs::write(
        &path,
        r#"
log_level = "debug"

[alignment]
max_steps = 20
threshold_deg = 1.5
gain = 0.8
inter_sample_delay_ms = 40
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.alignment.max_steps, 20);
    assert_eq!(settings.alignment.inter_sample_delay_ms, 40);

    let mut rig = rig(settings.alignment);
    let report = rig
        .dispatcher
        .execute(&[Ok(visual_point_at(50.0, "plant"))])
        .await
        .unwrap();

    let AlignmentResult::Aligned { steps, error_deg } = report.alignments[0].result else {
        panic!("expected convergence");
    };
    assert!(error_deg.abs() < 1.5);
    assert!(rig
        .clock
        .sleeps()
        .iter()
        .all(|d| *d == Duration::from_millis(40)));
    assert_eq!(rig.clock.sleeps().len() as u32, steps - 1);
}

#[tokio::test]
async fn test_session_runs_mixed_requests() {
    let rig = rig(AlignmentParams::default());
    let transport = rig.transport.clone();
    let mut session = Session::new(rig.dispatcher, Box::new(PassthroughCompiler));

    let target = point_at_bearing(20.0, 100.0);
    let input = format!(
        "[{{\"cmd\": \"LED1_ON\", \"delay\": 10}}]\n\
         not a batch\n\
         ```json\n\
         [{{\"cmd\": \"VISUAL_POINT\", \"target\": \"mug\", \"x\": {}, \"y\": {}, \"delay\": 10}}, {{\"cmd\": \"SERVO_ANGLE_45\"}}]\n\
         quit\n",
        target.x, target.y
    );

    let summary = session.run(input.as_bytes()).await.unwrap();

    // The stray fence line is its own (malformed) request.
    assert_eq!(summary, SessionSummary { batches: 2, rejected: 2 });
    assert_eq!(transport.lines().first().map(String::as_str), Some("LED1_ON"));
    assert_eq!(transport.last_line().as_deref(), Some("SERVO_ANGLE_45"));
    assert_eq!(session.dispatcher().actuator().angle(), 45);
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/visual_servo.toml");
    let settings = Settings::load_from(path).unwrap();
    let defaults = Settings::default();
    assert_eq!(settings.alignment, defaults.alignment);
    assert_eq!(settings.markers.tip, defaults.markers.tip);
    assert_eq!(settings.markers.axis, defaults.markers.axis);
    assert_eq!(settings.serial.port, defaults.serial.port);
}

#[test]
fn test_demo_batch_decodes() {
    let text = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/demos/point_at_bottle.json"
    ))
    .unwrap();
    let batch = parse_batch(&text).unwrap();
    assert_eq!(batch.len(), 4);
    assert!(batch.iter().all(Result::is_ok));
}

//! End-to-end tests of the session control surface.
//!
//! Every test runs on a paused Tokio clock, so multi-second sessions finish
//! instantly in virtual time.
//!
//! Run with:
//!   cargo test --test session_lifecycle

use std::time::Duration;

use gympulse::{
    MachineKind, ResetAck, SessionConfig, SessionController, SessionError, StartOutcome, StopAck,
};
use tokio::time::sleep;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller() -> SessionController {
    SessionController::new(SessionConfig::default().with_seed(2024))
}

/// Poll a snapshot every half second until the worker exits.
async fn poll_until_idle(controller: &SessionController) -> Vec<gympulse::SessionSnapshot> {
    let mut snapshots = Vec::new();
    while controller.is_running() {
        sleep(Duration::from_millis(500)).await;
        snapshots.push(controller.snapshot().unwrap());
    }
    snapshots
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn treadmill_session_completes() {
    let controller = controller();
    let outcome = controller.start("treadmill", Some(2)).unwrap();
    assert!(matches!(
        outcome,
        StartOutcome::Started {
            machine: MachineKind::Treadmill,
            duration_secs: 2,
            ..
        }
    ));

    controller.wait().await;

    let snapshot = controller.snapshot().unwrap();
    assert!(snapshot.elapsed_seconds >= 2);
    assert!(!snapshot.active);
    assert!(snapshot.total_calories > 0.0);
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.session_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn unknown_machine_leaves_state_unchanged() {
    let controller = controller();
    controller.set_machine("elliptical").unwrap();
    let before = controller.snapshot().unwrap();

    let err = controller.start("unicycle", Some(10)).unwrap_err();
    assert_eq!(err, SessionError::UnknownMachineKind("unicycle".into()));
    assert!(!controller.is_running());
    assert_eq!(controller.snapshot().unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let controller = controller();
    let idle_ack = controller.stop();

    controller.start("cycling", Some(30)).unwrap();
    sleep(Duration::from_millis(1500)).await;
    let live_ack = controller.stop();
    let repeat_ack = controller.stop();

    assert_eq!(idle_ack, StopAck::Stopping);
    assert_eq!(live_ack, idle_ack);
    assert_eq!(repeat_ack, idle_ack);

    controller.wait().await;
    assert!(!controller.snapshot().unwrap().active);
    assert_eq!(controller.stop(), StopAck::Stopping);
}

#[tokio::test(start_paused = true)]
async fn immediate_double_start_runs_one_worker() {
    let controller = controller();
    let first = controller.start("rowing", Some(6)).unwrap();
    let second = controller.start("rowing", Some(6)).unwrap();
    assert!(matches!(first, StartOutcome::Started { .. }));
    assert_eq!(second, StartOutcome::AlreadyRunning);

    // Two snapshots one second apart advance by at most one tick.
    sleep(Duration::from_millis(500)).await;
    let mut previous = controller.snapshot().unwrap().elapsed_seconds;
    for _ in 0..4 {
        sleep(Duration::from_secs(1)).await;
        let current = controller.snapshot().unwrap().elapsed_seconds;
        assert!(current - previous <= 1, "{previous} -> {current}");
        previous = current;
    }

    controller.wait().await;
    assert_eq!(controller.snapshot().unwrap().elapsed_seconds, 6);
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_from_clones_spawn_once() {
    let controller = controller();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start("treadmill", Some(3)).unwrap() })
        })
        .collect();

    let mut started = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), StartOutcome::Started { .. }) {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    controller.wait().await;
    assert_eq!(controller.snapshot().unwrap().elapsed_seconds, 3);
}

#[tokio::test(start_paused = true)]
async fn cyclic_reps_never_decrease() {
    for kind in ["treadmill", "rowing"] {
        let controller = controller();
        controller.start(kind, Some(8)).unwrap();

        let snapshots = poll_until_idle(&controller).await;
        assert!(snapshots.len() >= 8);
        for pair in snapshots.windows(2) {
            assert!(pair[0].reps <= pair[1].reps, "{kind}: {} -> {}", pair[0].reps, pair[1].reps);
        }
        assert!(snapshots.last().unwrap().reps >= 8);
    }
}

#[tokio::test(start_paused = true)]
async fn non_cyclic_reps_stay_in_sample_range() {
    let controller = controller();
    controller.start("free-weights", Some(10)).unwrap();

    for snapshot in poll_until_idle(&controller).await {
        assert!(snapshot.reps <= 30);
        assert_eq!(snapshot.speed, 0.0);
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_are_published_consistently() {
    let controller = controller();
    let mut updates = controller.subscribe();
    controller.start("cycling", Some(4)).unwrap();

    let per_tick = gympulse::calories::per_tick_calories(6.0, 70.0);
    for expected_elapsed in 1..=4u64 {
        let tick = updates.recv().await.unwrap();
        assert_eq!(tick.elapsed_seconds, expected_elapsed);
        assert!((tick.total_calories - per_tick * expected_elapsed as f64).abs() < 1e-9);
        let feedback = gympulse::evaluate(tick.heart_rate, tick.speed, tick.reps);
        assert_eq!(tick.fatigue, feedback.fatigue);
        assert_eq!(tick.feedback, feedback.text);
        assert!(tick.active);
    }

    controller.wait().await;
}

#[tokio::test(start_paused = true)]
async fn reset_always_returns_to_idle() {
    let controller = controller();
    controller.start("treadmill", Some(5)).unwrap();
    sleep(Duration::from_millis(2500)).await;

    let ResetAck::Reset { snapshot } = controller.reset().unwrap();
    for snapshot in [snapshot, controller.snapshot().unwrap()] {
        assert!(!snapshot.active);
        assert_eq!(snapshot.total_calories, 0.0);
        assert_eq!(snapshot.reps, 0);
        assert_eq!(snapshot.machine, None);
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    controller.wait().await;
    let ResetAck::Reset { snapshot } = controller.reset().unwrap();
    assert_eq!(snapshot.feedback, "Idle");
    assert_eq!(snapshot.session_id, None);
}

#[tokio::test(start_paused = true)]
async fn snapshot_keeps_last_readings_after_session() {
    let controller = controller();
    let mut updates = controller.subscribe();
    controller.start("elliptical", Some(3)).unwrap();

    let mut last = None;
    while let Ok(tick) = updates.recv().await {
        last = Some(tick);
        if last.as_ref().unwrap().elapsed_seconds == 3 {
            break;
        }
    }
    controller.wait().await;

    let last = last.unwrap();
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.machine, Some(MachineKind::Elliptical));
    assert_eq!(snapshot.heart_rate, last.heart_rate);
    assert_eq!(snapshot.speed, last.speed);
    assert_eq!(snapshot.reps, last.reps);
    assert_eq!(snapshot.feedback, last.feedback);
    assert!(!snapshot.active);
}

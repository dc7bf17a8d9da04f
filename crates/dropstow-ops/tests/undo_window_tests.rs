use std::sync::{Arc, Mutex};
use std::time::Duration;

use dropstow_core::MoveError;
use dropstow_ops::{UndoAction, UndoCoordinator, UndoEvent, undo_action};

const WINDOW: Duration = Duration::from_secs(10);

fn ok_action(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> UndoAction {
    let log = Arc::clone(log);
    undo_action(move || async move {
        log.lock().unwrap().push(name);
        Ok::<(), MoveError>(())
    })
}

fn failing_action() -> UndoAction {
    undo_action(|| async { Err::<(), _>(MoveError::validation("already moved")) })
}

#[tokio::test]
async fn test_execute_runs_all_newest_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    for name in ["a", "b", "c"] {
        coordinator.register(format!("Move '{name}'"), ok_action(&log, name), WINDOW);
    }
    assert_eq!(coordinator.pending_count(), 3);

    let report = coordinator.execute_undo().await;

    assert!(report.success);
    assert_eq!(report.undone_count, 3);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.description, "Move 'c' and 2 more");
    assert_eq!(*log.lock().unwrap(), ["c", "b", "a"]);
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_rest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    coordinator.register("first", ok_action(&log, "a"), WINDOW);
    coordinator.register("second", failing_action(), WINDOW);
    coordinator.register("third", ok_action(&log, "c"), WINDOW);

    let report = coordinator.execute_undo().await;

    assert!(!report.success);
    assert_eq!(report.undone_count, 2);
    assert_eq!(report.failed_count, 1);
    assert!(report.error_message.unwrap().contains("already moved"));
    assert_eq!(*log.lock().unwrap(), ["c", "a"]);
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_panicking_action_counts_as_failure() {
    let coordinator = UndoCoordinator::new();
    let action = undo_action(|| async {
        let explode = true;
        if explode {
            panic!("boom");
        }
        Ok::<(), MoveError>(())
    });
    coordinator.register("boom", action, WINDOW);

    let report = coordinator.execute_undo().await;
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.undone_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_window_expires_silently() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    coordinator.register("only", ok_action(&log, "a"), WINDOW);

    tokio::time::sleep(WINDOW + Duration::from_millis(1)).await;
    assert_eq!(coordinator.pending_count(), 0);

    let report = coordinator.execute_undo().await;
    assert!(!report.success);
    assert_eq!(report.undone_count, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_registration_restarts_window() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    coordinator.register("first", ok_action(&log, "a"), WINDOW);

    tokio::time::sleep(Duration::from_secs(8)).await;
    coordinator.register("second", ok_action(&log, "b"), WINDOW);

    // The first deadline has passed; the second has not
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(coordinator.pending_count(), 2);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_counts_down_from_last_registration() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    assert_eq!(coordinator.remaining(), None);

    coordinator.register("first", ok_action(&log, "a"), WINDOW);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(coordinator.remaining(), Some(Duration::from_secs(6)));

    coordinator.register("second", ok_action(&log, "b"), WINDOW);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(coordinator.remaining(), Some(Duration::from_secs(7)));

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(coordinator.remaining(), None);
}

#[tokio::test]
async fn test_clear_discards_without_running() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    coordinator.register("one", ok_action(&log, "a"), WINDOW);
    coordinator.register("two", ok_action(&log, "b"), WINDOW);

    coordinator.clear_undo();
    assert_eq!(coordinator.pending_count(), 0);

    let report = coordinator.execute_undo().await;
    assert_eq!(report.undone_count, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_events_are_broadcast() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = UndoCoordinator::new();
    let mut events = coordinator.subscribe();

    coordinator.register("Move 'a' to Docs", ok_action(&log, "a"), WINDOW);
    coordinator.register("Move 'b' to Docs", ok_action(&log, "b"), WINDOW);
    coordinator.execute_undo().await;

    let UndoEvent::Available(first) = events.recv().await.unwrap() else {
        panic!("expected availability");
    };
    assert_eq!(first.description, "Move 'a' to Docs");
    assert_eq!(first.total_count, 1);
    assert_eq!(first.expiration_seconds, 10);

    let UndoEvent::Available(second) = events.recv().await.unwrap() else {
        panic!("expected availability");
    };
    assert_eq!(second.description, "Move 'b' to Docs and 1 more");
    assert_eq!(second.total_count, 2);

    let UndoEvent::Executed(report) = events.recv().await.unwrap() else {
        panic!("expected execution report");
    };
    assert!(report.success);
    assert_eq!(report.undone_count, 2);
}

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::stub::{Call, StubCoordinator};
use crate::config::{CircuitBreakerConfig, ExecutionOptions};
use crate::error::TransactionError;
use crate::model::TransactionMode;
use crate::patterns::tcc::{TccOrchestrator, TccWorkflow};
use crate::TransactionClient;

fn orchestrator(stub: &Arc<StubCoordinator>) -> TccOrchestrator {
    TccOrchestrator::new(Arc::new(TransactionClient::with_gateway(stub.clone())))
}

fn workflow(count: usize) -> TccWorkflow {
    let mut workflow = TccWorkflow::default();
    for i in 1..=count {
        workflow.add_step(
            &format!("b{}", i),
            &format!("http://svc/b{}/try", i),
            &format!("http://svc/b{}/confirm", i),
            &format!("http://svc/b{}/cancel", i),
        );
    }
    workflow
}

fn is_try(call: &Call) -> bool {
    matches!(call, Call::Try { .. })
}

fn is_confirm(call: &Call) -> bool {
    matches!(call, Call::Confirm(_))
}

fn is_cancel(call: &Call) -> bool {
    matches!(call, Call::Cancel(_))
}

#[tokio::test(start_paused = true)]
async fn test_tcc_confirms_every_branch() {
    let stub = Arc::new(StubCoordinator::new());

    let gid = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(3),
            b"order",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap();

    assert!(!gid.is_empty());
    assert_eq!(
        stub.calls().first(),
        Some(&Call::Start {
            mode: TransactionMode::Tcc,
            payload: b"order".to_vec()
        })
    );
    assert_eq!(stub.count(is_try), 3);
    assert_eq!(stub.count(is_confirm), 3);
    assert_eq!(stub.count(is_cancel), 0);
}

#[tokio::test(start_paused = true)]
async fn test_try_failure_cancels_every_branch() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_on("try", "b2");

    let err = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(2),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("branch b2"), "{}", err);
    let calls = stub.calls();
    assert!(calls.contains(&Call::Cancel("b1".to_string())));
    assert!(calls.contains(&Call::Cancel("b2".to_string())));
    assert_eq!(stub.count(is_confirm), 0);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_try_respects_max_concurrency() {
    let stub = Arc::new(StubCoordinator::new().with_delay(Duration::from_millis(100)));
    let options = ExecutionOptions::default().with_max_concurrency(3);

    orchestrator(&stub)
        .execute(&CancellationToken::new(), &workflow(8), b"", &options)
        .await
        .unwrap();

    assert_eq!(stub.count(is_try), 8);
    let peak = stub.max_in_flight();
    assert!(peak <= 3, "{} calls were in flight at once", peak);
    assert!(peak > 1, "branches never ran concurrently");
}

#[tokio::test(start_paused = true)]
async fn test_parallel_phase_attempts_every_branch_despite_failure() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_on("try", "b1");

    let err = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(4),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("try failed for branch b1"));
    assert_eq!(stub.count(is_try), 4);
    assert_eq!(stub.count(is_cancel), 4);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_try_stops_at_first_failure() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_on("try", "b2");
    let options = ExecutionOptions::default().with_parallel_branches(false);

    orchestrator(&stub)
        .execute(&CancellationToken::new(), &workflow(3), b"", &options)
        .await
        .unwrap_err();

    assert_eq!(
        stub.count(|c| matches!(c, Call::Try { branch_id, .. } if branch_id == "b3")),
        0
    );
    // Cancel still reaches every branch, including the one never tried.
    assert_eq!(stub.count(is_cancel), 3);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_failure_cancels_every_branch() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_on("confirm", "b1");

    let err = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(2),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("confirm failed for branch b1"));
    assert_eq!(stub.count(is_try), 2);
    assert_eq!(stub.count(is_cancel), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_errors_are_not_escalated() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_on("try", "b1");
    stub.fail_on("cancel", "b2");

    let err = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(2),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("try failed for branch b1"));
}

#[tokio::test(start_paused = true)]
async fn test_barrier_is_appended_to_try_payload() {
    let stub = Arc::new(StubCoordinator::new());

    orchestrator(&stub)
        .execute_with_barrier(
            &CancellationToken::new(),
            &workflow(2),
            b"order-1",
            ":barrier-7",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap();

    let calls = stub.calls();
    assert_eq!(
        calls.first(),
        Some(&Call::Start {
            mode: TransactionMode::Tcc,
            payload: b"order-1".to_vec()
        })
    );
    for call in calls.iter().filter(|c| is_try(c)) {
        match call {
            Call::Try { payload, .. } => assert_eq!(payload, b"order-1:barrier-7"),
            _ => unreachable!(),
        }
    }
    assert_eq!(stub.count(is_confirm), 2);
}

#[tokio::test]
async fn test_empty_barrier_is_rejected() {
    let stub = Arc::new(StubCoordinator::new());

    let err = orchestrator(&stub)
        .execute_with_barrier(
            &CancellationToken::new(),
            &workflow(1),
            b"",
            "",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransactionError::Validation(_)));
    assert!(stub.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_branches() {
    let stub = Arc::new(StubCoordinator::new().with_delay(Duration::from_secs(2)));
    let options = ExecutionOptions::default().with_timeout(Duration::from_secs(3));

    let err = orchestrator(&stub)
        .execute(&CancellationToken::new(), &workflow(2), b"", &options)
        .await
        .unwrap_err();

    assert!(matches!(err, TransactionError::Timeout(_)));
    assert_eq!(stub.count(is_cancel), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_execution_skips_cleanup() {
    let stub = Arc::new(StubCoordinator::new().with_delay(Duration::from_secs(1)));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let err = orchestrator(&stub)
        .execute(&cancel, &workflow(2), b"", &ExecutionOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(stub.count(is_cancel), 0);
}

#[tokio::test]
async fn test_invalid_workflow_makes_no_calls() {
    let stub = Arc::new(StubCoordinator::new());

    let err = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &TccWorkflow::default(),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Validation error: TCC workflow must have at least one step"
    );
    assert!(stub.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_branch_failures_do_not_trip_the_breaker_for_other_branches() {
    let stub = Arc::new(StubCoordinator::new());
    for id in ["b1", "b2", "b3", "b4", "b5"] {
        stub.fail_on("try", id);
    }
    let options = ExecutionOptions::default().with_circuit_breaker(Some(CircuitBreakerConfig {
        failure_threshold: 2,
        recovery_timeout: Duration::from_secs(60),
        half_open_max_calls: 1,
    }));

    let err = orchestrator(&stub)
        .execute(&CancellationToken::new(), &workflow(6), b"", &options)
        .await
        .unwrap_err();

    assert!(!matches!(err, TransactionError::CircuitOpen));
    assert_eq!(stub.count(is_try), 6);
    assert_eq!(stub.count(is_cancel), 6);
}

#[tokio::test(start_paused = true)]
async fn test_start_retries_reuse_the_proposed_gid() {
    let stub = Arc::new(StubCoordinator::new());
    stub.fail_transiently("start", "", 2);

    let gid = orchestrator(&stub)
        .execute(
            &CancellationToken::new(),
            &workflow(1),
            b"",
            &ExecutionOptions::default(),
        )
        .await
        .unwrap();

    let proposed = stub.proposed_gids();
    assert_eq!(proposed.len(), 3);
    assert!(proposed.iter().all(|g| *g == gid));
}

//! Integration tests for the simulated extraction session

use exco::{SimulationConfig, TaskManagerConfig, run_simulation};

fn small_simulation(seed: u64) -> SimulationConfig {
    SimulationConfig {
        workers: 4,
        tasks: 40,
        crash_rate: 0.3,
        work_millis: 1,
        poll_interval_millis: 5,
        seed: Some(seed),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_simulation_converges_despite_lost_tasks() {
    let report = run_simulation(small_simulation(42), TaskManagerConfig::default())
        .await
        .expect("simulation should converge");

    assert_eq!(report.seed, 42);
    assert_eq!(report.tasks_created, 40);
    assert!(report.failed_tasks.is_empty(), "{:?}", report.failed_tasks);

    let status = report.final_status;
    assert_eq!(status.number_of_queued_tasks, 0);
    assert_eq!(status.number_of_tasks_processing, 0);
    assert_eq!(status.number_of_tasks_pending_merge, 0);
    assert_eq!(status.number_of_tasks_merging, 0);

    // Every original task or its retry got merged
    assert!(report.tasks_merged >= report.tasks_created);
    assert_eq!(
        status.total_number_of_tasks as usize,
        report.tasks_created + report.retries_created
    );
    assert_eq!(report.samples.get("completed"), Some(&report.tasks_merged));
}

#[tokio::test]
async fn test_simulation_without_crashes_needs_no_retries() {
    let config = SimulationConfig {
        crash_rate: 0.0,
        ..small_simulation(7)
    };

    let report = run_simulation(config, TaskManagerConfig::default())
        .await
        .unwrap();

    assert_eq!(report.lost_by_workers, 0);
    assert_eq!(report.tasks_merged, report.tasks_created);
    assert!(report.summary().contains("Tasks merged:"));
}

#[tokio::test]
async fn test_invalid_simulation_is_rejected() {
    let config = SimulationConfig {
        workers: 0,
        ..Default::default()
    };
    assert!(run_simulation(config, TaskManagerConfig::default()).await.is_err());

    let config = SimulationConfig {
        crash_rate: 1.0,
        ..Default::default()
    };
    assert!(run_simulation(config, TaskManagerConfig::default()).await.is_err());
}

#[test]
fn test_report_serializes_to_json() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let config = SimulationConfig {
        tasks: 5,
        crash_rate: 0.0,
        ..small_simulation(1)
    };
    let report = runtime
        .block_on(run_simulation(config, TaskManagerConfig::default()))
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tasks_created"], 5);
    assert_eq!(json["final_status"]["number_of_queued_tasks"], 0);
}

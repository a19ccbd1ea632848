//! Simulated extraction session
//!
//! Drives a [`TaskManager`] the way an extraction engine does, with tokio
//! tasks standing in for worker processes:
//! - workers pull tasks from a shared queue, report processing, and either
//!   report a completion or silently lose the task
//! - a foreman loop consumes completions, merges pending tasks, creates
//!   retries for abandoned work and polls for convergence
//!
//! Time inside the task manager is a [`ManualClock`] advanced on every
//! foreman tick, so inactivity timeouts elapse in milliseconds.

use crate::env;
use crate::task::*;
use anyhow::{Context, Result, bail};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub workers: usize,
    pub tasks: usize,
    /// Probability that a worker silently loses a task it started
    pub crash_rate: f64,
    /// Share of tasks that extract directories
    pub directory_ratio: f64,
    pub max_storage_file_size: u64,
    /// Upper bound of simulated work per task
    pub work_millis: u64,
    pub poll_interval_millis: u64,
    /// Virtual time the task manager sees pass per foreman tick
    pub virtual_seconds_per_tick: u64,
    pub merges_per_tick: usize,
    pub max_ticks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            tasks: 100,
            crash_rate: 0.1,
            directory_ratio: 0.1,
            max_storage_file_size: 1024 * 1024,
            work_millis: 3,
            poll_interval_millis: 10,
            virtual_seconds_per_tick: 60,
            merges_per_tick: 4,
            max_ticks: 100_000,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("Simulation needs at least one worker");
        }
        if !(0.0..1.0).contains(&self.crash_rate) {
            bail!("Crash rate must be in [0, 1), got {}", self.crash_rate);
        }
        if !(0.0..=1.0).contains(&self.directory_ratio) {
            bail!("Directory ratio must be in [0, 1], got {}", self.directory_ratio);
        }
        if self.merges_per_tick == 0 {
            bail!("Merges per tick must be at least 1");
        }
        Ok(())
    }
}

/// Outcome of a simulated session
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub session_identifier: SessionId,
    pub seed: u64,
    pub ticks: u64,
    pub tasks_created: usize,
    pub retries_created: usize,
    pub tasks_merged: usize,
    pub tasks_removed: usize,
    pub merges_put_on_hold: usize,
    pub lost_by_workers: usize,
    pub failed_tasks: Vec<TaskId>,
    pub final_status: TasksStatus,
    pub samples: BTreeMap<String, usize>,
}

impl SimulationReport {
    /// Human readable summary
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Session:          {}", self.session_identifier),
            format!("Seed:             {}", self.seed),
            format!("Ticks:            {}", self.ticks),
            format!("Tasks created:    {}", self.tasks_created),
            format!("Retries created:  {}", self.retries_created),
            format!("Tasks merged:     {}", self.tasks_merged),
            format!("Tasks removed:    {}", self.tasks_removed),
            format!("Merges on hold:   {}", self.merges_put_on_hold),
            format!("Lost by workers:  {}", self.lost_by_workers),
            format!("Failed tasks:     {}", self.failed_tasks.len()),
            format!("Final status:     {}", self.final_status),
            "Samples:".to_string(),
        ];
        lines.extend(
            self.samples
                .iter()
                .map(|(status, count)| format!("  {:<15} {}", status, count)),
        );
        lines.join("\n")
    }
}

/// Records every sample and optionally forwards it to tracing
struct SimulationProfiler {
    recorder: RecordingTaskProfiler,
    trace: bool,
}

impl TaskProfiler for SimulationProfiler {
    fn sample(&self, task: &Task, status: TaskSampleStatus) {
        self.recorder.sample(task, status);
        if self.trace {
            TracingTaskProfiler.sample(task, status);
        }
    }
}

/// A worker's account of a finished task
struct WorkerReport {
    task: Task,
    completion: TaskCompletion,
}

struct Worker {
    id: usize,
    manager: Arc<TaskManager>,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
    reports: mpsc::UnboundedSender<WorkerReport>,
    stop: Arc<AtomicBool>,
    config: SimulationConfig,
    rng: StdRng,
}

impl Worker {
    /// Process tasks until the queue closes; returns how many tasks were lost
    async fn run(mut self) -> usize {
        let mut lost = 0;

        loop {
            let next = self.queue.lock().await.recv().await;
            let Some(mut task) = next else { break };
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            if let Err(error) = self
                .manager
                .update_task_as_processing_by_identifier(task.identifier())
            {
                warn!("Worker {} skipping task {}: {}", self.id, task.identifier(), error);
                continue;
            }
            let start = task.create_task_start();
            debug!("Worker {} started task {} at {}", self.id, start.identifier, start.timestamp);

            if self.config.work_millis > 0 {
                let work = self.rng.random_range(0..=self.config.work_millis);
                tokio::time::sleep(Duration::from_millis(work)).await;
            }

            if self.rng.random_bool(self.config.crash_rate) {
                debug!("Worker {} lost task {}", self.id, task.identifier());
                lost += 1;
                continue;
            }

            let max_size = self.config.max_storage_file_size.max(1);
            task.storage_file_size = Some(self.rng.random_range(1..=max_size));
            let completion = task.create_task_completion();

            if self.reports.send(WorkerReport { task, completion }).is_err() {
                break;
            }
        }

        lost
    }
}

/// Foreman side of the simulation
struct Foreman {
    manager: Arc<TaskManager>,
    clock: Arc<ManualClock>,
    config: SimulationConfig,
    dispatch: mpsc::UnboundedSender<Task>,
    reports: mpsc::UnboundedReceiver<WorkerReport>,
    current_merge: Option<Task>,
    merges_on_hold: Vec<Task>,
    report: SimulationReport,
}

impl Foreman {
    fn send_to_workers(&self, task: Task) -> Result<()> {
        self.dispatch
            .send(task)
            .map_err(|_| anyhow::anyhow!("Worker queue closed"))
    }

    fn handle_report(&mut self, worker_report: WorkerReport) -> Result<()> {
        let WorkerReport { task, completion } = worker_report;

        let tracked = match self
            .manager
            .get_processed_task_by_identifier(&completion.identifier)
        {
            Ok(tracked) => tracked,
            Err(error) => {
                warn!("Ignoring completion of task {}: {}", completion.identifier, error);
                return Ok(());
            }
        };

        if self.manager.check_task_to_merge(&tracked)? {
            self.manager.update_task_as_pending_merge(&task)?;
        } else {
            debug!(
                "Task {} was replaced by a retry, discarding its results",
                completion.identifier
            );
            self.manager.remove_task(&tracked)?;
            self.report.tasks_removed += 1;
        }
        Ok(())
    }

    /// Merge up to `merges_per_tick` tasks, letting higher priority work
    /// preempt the task currently being merged
    fn merge(&mut self) -> Result<()> {
        for _ in 0..self.config.merges_per_tick {
            if let Some(next) = self
                .manager
                .get_task_pending_merge(self.current_merge.as_ref())
                && let Some(previous) = self.current_merge.replace(next)
            {
                debug!("Merge of task {} put on hold", previous.identifier());
                self.merges_on_hold.push(previous);
                self.report.merges_put_on_hold += 1;
            }

            let Some(task) = self.current_merge.take() else {
                break;
            };
            self.manager.complete_task(&task)?;
            self.report.tasks_merged += 1;
            self.current_merge = self.merges_on_hold.pop();
        }
        Ok(())
    }

    fn schedule_retries(&mut self) -> Result<()> {
        while let Some(retry) = self.manager.create_retry_task() {
            self.report.retries_created += 1;
            self.send_to_workers(retry)?;
        }
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_millis);
        let tick = Duration::from_secs(self.config.virtual_seconds_per_tick);

        loop {
            if self.report.ticks >= self.config.max_ticks {
                bail!(
                    "Simulation did not converge within {} ticks ({})",
                    self.config.max_ticks,
                    self.manager.get_status_information()
                );
            }
            self.report.ticks += 1;

            tokio::time::sleep(poll_interval).await;
            self.clock.advance(tick);

            while let Ok(worker_report) = self.reports.try_recv() {
                self.handle_report(worker_report)?;
            }
            self.merge()?;
            self.schedule_retries()?;

            if !self.manager.has_pending_tasks() && self.reports.is_empty() {
                return Ok(());
            }
        }
    }
}

/// Run a simulated session to convergence
pub async fn run_simulation(
    config: SimulationConfig,
    task_config: TaskManagerConfig,
) -> Result<SimulationReport> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(rand::random);

    let clock = Arc::new(ManualClock::starting_now());
    let profiler = Arc::new(SimulationProfiler {
        recorder: RecordingTaskProfiler::new(),
        trace: task_config.enable_task_profiling,
    });
    let manager = Arc::new(TaskManager::with_clock(task_config, clock.clone()));
    manager.start_profiling(profiler.clone());

    let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let queue = Arc::new(Mutex::new(dispatch_rx));
    let stop = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..config.workers)
        .map(|id| {
            let worker = Worker {
                id,
                manager: manager.clone(),
                queue: queue.clone(),
                reports: report_tx.clone(),
                stop: stop.clone(),
                config: config.clone(),
                rng: StdRng::seed_from_u64(seed.wrapping_add(id as u64 + 1)),
            };
            tokio::spawn(worker.run())
        })
        .collect();
    drop(report_tx);

    info!(
        "Simulating {} tasks on {} workers (seed {})",
        config.tasks, config.workers, seed
    );

    let mut foreman = Foreman {
        manager: manager.clone(),
        clock,
        config: config.clone(),
        dispatch: dispatch_tx,
        reports: report_rx,
        current_merge: None,
        merges_on_hold: Vec::new(),
        report: SimulationReport {
            session_identifier: env::simulation::SESSION_ID.to_string(),
            seed,
            ticks: 0,
            tasks_created: 0,
            retries_created: 0,
            tasks_merged: 0,
            tasks_removed: 0,
            merges_put_on_hold: 0,
            lost_by_workers: 0,
            failed_tasks: Vec::new(),
            final_status: TasksStatus::default(),
            samples: BTreeMap::new(),
        },
    };

    let mut rng = StdRng::seed_from_u64(seed);
    for index in 0..config.tasks {
        let file_entry_type = if rng.random_bool(config.directory_ratio) {
            FileEntryType::Directory
        } else {
            FileEntryType::File
        };
        let task = manager.create_file_entry_task(
            env::simulation::SESSION_ID,
            Some(format!("{}/entry-{}", env::simulation::PATH_PREFIX, index)),
            Some(file_entry_type),
        );
        foreman.send_to_workers(task)?;
        foreman.report.tasks_created += 1;
    }

    let outcome = foreman.run().await;

    stop.store(true, Ordering::SeqCst);
    let Foreman {
        dispatch,
        mut report,
        ..
    } = foreman;
    drop(dispatch);

    for lost in join_all(workers).await {
        report.lost_by_workers += lost.context("Simulated worker panicked")?;
    }
    outcome?;

    report.final_status = manager.get_status_information();
    report.failed_tasks = manager
        .get_failed_tasks()
        .iter()
        .map(|task| task.identifier().to_string())
        .collect();
    report.samples = profiler
        .recorder
        .counts()
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();

    info!(
        "Simulation converged after {} ticks: {}",
        report.ticks, report.final_status
    );
    Ok(report)
}

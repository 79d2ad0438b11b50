/// Cron-driven automatic backups
///
/// Every database with a schedule gets its own timer task. A tick spawns
/// the regular backup flow and the timer immediately waits for the next
/// tick, so a slow backup never delays the schedule; the manager's
/// per-database lock keeps overlapping runs from interleaving.

use chrono::Local;
use cron::Schedule;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::backup::BackupManager;

pub struct Scheduler {
    manager: Arc<BackupManager>,
}

/// Running timer tasks; dropping the handle stops them
pub struct SchedulerHandle {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl SchedulerHandle {
    /// Names of databases with an active timer
    pub fn databases(&self) -> Vec<&str> {
        self.tasks.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn shutdown(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for (_, task) in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl Scheduler {
    pub fn new(manager: Arc<BackupManager>) -> Self {
        Self { manager }
    }

    /// Spawn one timer per scheduled database
    pub fn start(&self) -> SchedulerHandle {
        let mut tasks = Vec::new();

        for db in &self.manager.config().databases {
            let Some(schedule) = db.cron_schedule() else {
                info!(database = %db.name, "no schedule, manual backups only");
                continue;
            };

            info!(database = %db.name, schedule = %db.schedule, "scheduling backups");
            let task = tokio::spawn(run_timer(
                self.manager.clone(),
                db.name.clone(),
                schedule,
            ));
            tasks.push((db.name.clone(), task));
        }

        SchedulerHandle { tasks }
    }
}

async fn run_timer(manager: Arc<BackupManager>, name: String, schedule: Schedule) {
    loop {
        let Some(next) = schedule.upcoming(Local).next() else {
            warn!(database = %name, "schedule has no upcoming ticks, stopping timer");
            return;
        };

        // A timer can wake a hair early; never fire before the tick
        loop {
            let now = Local::now();
            if now >= next {
                break;
            }
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
        }

        let manager = manager.clone();
        let db_name = name.clone();
        tokio::spawn(async move {
            info!(database = %db_name, "scheduled backup triggered");
            match manager.backup_database(&db_name).await {
                Ok(artifact) => {
                    info!(database = %db_name, timestamp = %artifact.timestamp, "scheduled backup finished")
                }
                Err(e) => error!(database = %db_name, error = %e, "scheduled backup failed"),
            }
        });
    }
}

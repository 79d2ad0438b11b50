mod cli;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Commands};
use dockup::core::{AppConfig, ArtifactStore, BackupManager, DockerManager, StatusReporter};
use dockup::utils::{file_size, format_bytes, resolve_config_path, setup_logging, ContainerState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config_path = resolve_config_path(cli.config);
    let config = load_config(&config_path)?;

    match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve {
            port,
            host,
            cors,
            no_scheduler,
        } => {
            let manager = Arc::new(BackupManager::new(config, docker_runtime().await?));
            dockup::server::run(manager, host, port, cors, !no_scheduler).await?;
        }
        Commands::Backup { name } => {
            handle_backup(config, name).await?;
        }
        Commands::Restore { name, timestamp } => {
            handle_restore(config, name, timestamp).await?;
        }
        Commands::Status => {
            handle_status(config).await?;
        }
        Commands::Validate => {
            handle_validate(&config_path, &config);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Arc<AppConfig>> {
    let config = AppConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    Ok(Arc::new(config))
}

async fn docker_runtime() -> Result<Arc<DockerManager>> {
    let docker = DockerManager::new()?;
    if !docker.check_docker().await {
        bail!("Docker daemon is not reachable");
    }
    Ok(Arc::new(docker))
}

fn spinner(message: String) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")?);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

async fn handle_backup(config: Arc<AppConfig>, name: String) -> Result<()> {
    let manager = BackupManager::new(config, docker_runtime().await?);

    let bar = spinner(format!("Backing up {}", name))?;
    let result = manager.backup_database(&name).await;
    bar.finish_and_clear();

    let artifact = result.with_context(|| format!("backup of {} failed", name))?;
    println!(
        "{} {} backed up as {} ({})",
        "✓".green(),
        name,
        artifact.timestamp.bold(),
        format_bytes(file_size(&artifact.path))
    );
    println!("  {}", artifact.path.display());

    Ok(())
}

async fn handle_restore(config: Arc<AppConfig>, name: String, timestamp: String) -> Result<()> {
    let manager = BackupManager::new(config, docker_runtime().await?);

    let bar = spinner(format!("Restoring {} from {}", name, timestamp))?;
    let result = manager.restore_database(&name, Some(&timestamp)).await;
    bar.finish_and_clear();

    result.with_context(|| format!("restore of {} failed", name))?;
    println!("{} {} restored from {}", "✓".green(), name, timestamp.bold());

    Ok(())
}

async fn handle_status(config: Arc<AppConfig>) -> Result<()> {
    let store = ArtifactStore::new(config.backup_root.clone());
    // An unreachable daemon shows every database as down instead of failing
    let reporter = StatusReporter::new(config, Arc::new(DockerManager::new()?));
    let snapshot = reporter.snapshot().await?;

    println!("dockup status ({})\n", store.root().display());
    println!(
        "{:<20} {:<30} {:<8} {:<20} {:<10}",
        "Database", "Status", "Backups", "Latest", "Size"
    );
    println!("{}", "-".repeat(90));

    for db in &snapshot.databases {
        let state = ContainerState::from(db.status.as_str());
        let (latest, size) = match db.backups.last() {
            Some(ts) => {
                let path = store.artifact_path(&db.name, ts);
                (ts.clone(), format_bytes(file_size(path)))
            }
            None => ("-".to_string(), "-".to_string()),
        };

        println!(
            "{:<20} {} {:<8} {:<20} {:<10}",
            db.name,
            state.paint(&format!("{:<30}", db.status)),
            db.backups.len(),
            latest,
            size
        );
    }

    Ok(())
}

fn handle_validate(path: &Path, config: &AppConfig) {
    println!("{} {} is valid\n", "✓".green(), path.display());
    println!("  Backup root:  {}", config.backup_root.display());
    println!("  Exec timeout: {}", humantime::format_duration(config.exec_timeout));
    println!();
    println!("{:<20} {:<25} {:<20}", "Database", "Schedule", "Next run");
    println!("{}", "-".repeat(65));

    for db in &config.databases {
        let (schedule, next) = match db.cron_schedule() {
            Some(schedule) => {
                let next = schedule
                    .upcoming(Local)
                    .next()
                    .map(|t| t.format("%d-%m-%Y %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                (db.schedule.clone(), next)
            }
            None => ("manual".to_string(), "-".to_string()),
        };
        println!("{:<20} {:<25} {:<20}", db.name, schedule, next);
    }
}

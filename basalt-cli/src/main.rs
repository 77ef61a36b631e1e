/*!
basalt CLI - Operator command-line interface for the basalt snapshot
control plane.

Manages a snapshot inventory rooted at a state directory: snapshot
create/list/show/update/delete against the filesystem-backed store and
local image driver, plus volume catalog management.
*/

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use basalt_core::{
    build_coordinator, BasaltError, Coordinator, CoordinatorConfig, CreateSnapshotRequest,
    SnapshotFilter, SnapshotStatus, VolumeCatalog, VolumeRecord, VolumeStatus,
};

#[derive(Parser)]
#[command(name = "basalt")]
#[command(about = "Operator CLI for the basalt snapshot control plane")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State directory holding snapshot records, images, and the volume catalog
    #[arg(short, long, global = true, env = "BASALT_STATE_DIR", default_value = ".basalt")]
    state_dir: PathBuf,

    /// Project scope for snapshot operations
    #[arg(short, long, global = true, default_value = "default")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot lifecycle operations
    #[command(subcommand)]
    Snapshot(SnapshotCommands),
    /// Volume catalog management
    #[command(subcommand)]
    Volume(VolumeCommands),
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Create a snapshot of a volume
    Create {
        /// Source volume id
        volume_id: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Display description
        #[arg(long)]
        description: Option<String>,
        /// Snapshot the volume even if it is attached
        #[arg(long)]
        force: bool,
        /// Attach key=value metadata (repeatable)
        #[arg(long = "metadata", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },
    /// List snapshots
    List {
        /// Filter by lifecycle status
        #[arg(long)]
        status: Option<SnapshotStatus>,
        /// Filter by source volume
        #[arg(long)]
        volume: Option<String>,
        /// Filter by display name
        #[arg(long)]
        name: Option<String>,
        /// List across every project
        #[arg(long)]
        all_tenants: bool,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        /// Skip this many rows
        #[arg(long)]
        offset: Option<usize>,
    },
    /// Show details of a specific snapshot
    Show {
        /// Snapshot id
        snapshot_id: String,
    },
    /// Update display name and/or description
    Update {
        /// Snapshot id
        snapshot_id: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New display description
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot id
        snapshot_id: String,
    },
}

#[derive(Subcommand)]
enum VolumeCommands {
    /// Register a volume in the catalog
    Add {
        /// Volume id
        volume_id: String,
        /// Size in GiB
        #[arg(long)]
        size_gb: u64,
        /// Volume status
        #[arg(long, default_value = "available")]
        status: VolumeStatus,
    },
    /// List registered volumes
    List,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Volume")]
    volume_id: String,
    #[tabled(rename = "Size (GiB)")]
    size_gb: u64,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Created")]
    created: String,
}

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Size (GiB)")]
    size_gb: u64,
    #[tabled(rename = "Project")]
    project: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let catalog_path = cli.state_dir.join("volumes.json");
    let volumes = Arc::new(VolumeCatalog::load(&catalog_path)?);
    let config = CoordinatorConfig::durable(&cli.state_dir);
    let coordinator = build_coordinator(&config, Arc::clone(&volumes))?;

    match cli.command {
        Commands::Snapshot(command) => {
            run_snapshot_command(coordinator.as_ref(), &cli.project, command).await?
        }
        Commands::Volume(command) => {
            run_volume_command(&volumes, &catalog_path, &cli.project, command)?
        }
    }

    if cli.verbose {
        if let Ok(metrics) = basalt_core::observability::BasaltMetrics::global().gather_metrics() {
            eprintln!("{metrics}");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_snapshot_command(
    coordinator: &dyn Coordinator,
    project: &str,
    command: SnapshotCommands,
) -> Result<(), anyhow::Error> {
    match command {
        SnapshotCommands::Create {
            volume_id,
            name,
            description,
            force,
            metadata,
        } => {
            let mut request = CreateSnapshotRequest::new(volume_id, project)
                .with_metadata(metadata.into_iter().collect::<HashMap<_, _>>());
            if let Some(name) = name {
                request = request.with_display_name(name);
            }
            if let Some(description) = description {
                request = request.with_display_description(description);
            }
            if force {
                request = request.force();
            }

            let snapshot = coordinator.create_snapshot(request).await?;
            info!(snapshot_id = %snapshot.id, "snapshot accepted");
            println!("Accepted snapshot {} ({})", snapshot.id, snapshot.status);

            let settled = wait_until_settled(coordinator, &snapshot.id).await;
            match settled {
                Some(SnapshotStatus::Available) => {
                    println!("Snapshot {} is available", snapshot.id)
                }
                Some(status) => {
                    warn!(snapshot_id = %snapshot.id, %status, "snapshot did not become available");
                    println!("Snapshot {} ended up {}", snapshot.id, status);
                }
                None => println!("Snapshot {} is still settling", snapshot.id),
            }
        }
        SnapshotCommands::List {
            status,
            volume,
            name,
            all_tenants,
            limit,
            offset,
        } => {
            let mut filter = SnapshotFilter::new();
            if let Some(status) = status {
                filter = filter.with_status(status);
            }
            if let Some(volume) = volume {
                filter = filter.with_volume_id(volume);
            }
            if let Some(name) = name {
                filter = filter.with_display_name(name);
            }
            if all_tenants {
                filter = filter.with_all_tenants();
            }
            if let Some(limit) = limit {
                filter = filter.with_limit(limit);
            }
            if let Some(offset) = offset {
                filter = filter.with_offset(offset);
            }

            let snapshots = coordinator.list_snapshots(project, &filter).await?;
            if snapshots.is_empty() {
                println!("No snapshots found");
                return Ok(());
            }

            let rows: Vec<SnapshotRow> = snapshots
                .into_iter()
                .map(|snapshot| SnapshotRow {
                    id: snapshot.id,
                    name: snapshot.display_name,
                    status: snapshot.status.to_string(),
                    volume_id: snapshot.volume_id,
                    size_gb: snapshot.size_gb,
                    project: snapshot.project_id,
                    created: snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        SnapshotCommands::Show { snapshot_id } => {
            let snapshot = coordinator.get_snapshot(&snapshot_id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        SnapshotCommands::Update {
            snapshot_id,
            name,
            description,
        } => {
            let updated = coordinator
                .update_snapshot(&snapshot_id, name.as_deref(), description.as_deref())
                .await?;
            println!(
                "Updated snapshot {}: name={:?} description={:?}",
                updated.id, updated.display_name, updated.display_description
            );
        }
        SnapshotCommands::Delete { snapshot_id } => {
            coordinator.delete_snapshot(&snapshot_id).await?;
            println!("Accepted delete for snapshot {snapshot_id}");

            let removed = timeout(Duration::from_secs(60), async {
                loop {
                    match coordinator.get_snapshot(&snapshot_id).await {
                        Err(BasaltError::NotFound(_)) => return Ok(()),
                        Ok(snapshot) if snapshot.status == SnapshotStatus::ErrorDeleting => {
                            return Err(snapshot.status)
                        }
                        Ok(_) => sleep(Duration::from_millis(50)).await,
                        Err(_) => sleep(Duration::from_millis(50)).await,
                    }
                }
            })
            .await;

            match removed {
                Ok(Ok(())) => println!("Snapshot {snapshot_id} deleted"),
                Ok(Err(status)) => println!("Snapshot {snapshot_id} ended up {status}"),
                Err(_) => println!("Snapshot {snapshot_id} is still deleting"),
            }
        }
    }

    Ok(())
}

fn run_volume_command(
    volumes: &Arc<VolumeCatalog>,
    catalog_path: &std::path::Path,
    project: &str,
    command: VolumeCommands,
) -> Result<(), anyhow::Error> {
    match command {
        VolumeCommands::Add {
            volume_id,
            size_gb,
            status,
        } => {
            volumes.insert(VolumeRecord::new(&volume_id, project, size_gb).with_status(status));
            volumes.save(catalog_path)?;
            println!("Registered volume {volume_id} ({size_gb} GiB, {status})");
        }
        VolumeCommands::List => {
            let records = volumes.list();
            if records.is_empty() {
                println!("No volumes registered");
                return Ok(());
            }

            let rows: Vec<VolumeRow> = records
                .into_iter()
                .map(|volume| VolumeRow {
                    id: volume.id,
                    status: volume.status.to_string(),
                    size_gb: volume.size_gb,
                    project: volume.project_id,
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

/// Poll until the snapshot leaves `creating`, up to a minute.
async fn wait_until_settled(coordinator: &dyn Coordinator, id: &str) -> Option<SnapshotStatus> {
    timeout(Duration::from_secs(60), async {
        loop {
            match coordinator.get_snapshot(id).await {
                Ok(snapshot) if snapshot.status != SnapshotStatus::Creating => {
                    return snapshot.status
                }
                _ => sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await
    .ok()
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: {s}"))?;
    if key.is_empty() {
        return Err(format!("empty key in pair: {s}"));
    }
    Ok((key.to_string(), value.to_string()))
}

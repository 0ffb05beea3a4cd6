//! Command-line front end for inspecting and correcting box annotations.

use anyhow::{Context, Result};
use bbox3d_annotator::{
    loader::{load_scene, SceneRequest},
    record::DeletionMarker,
    store::{BoxStore, FsStore},
    AnnotationSession, EditCommand, EditorConfig,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bbox3d-annotate")]
#[command(about = "Inspect, edit and save 3D oriented bounding box annotations", long_about = None)]
struct Cli {
    /// Editor config (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Storage root, overrides the config
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every box of a scan
    Inspect {
        /// Scan id
        object_id: String,

        /// Box document, relative to the storage root
        #[arg(short, long)]
        boxes: String,

        /// PLY point cloud, relative to the storage root
        #[arg(short, long)]
        points: Option<String>,
    },

    /// Apply edits and save the refined document
    Edit {
        /// Scan id
        object_id: String,

        /// Box document, relative to the storage root
        #[arg(short, long)]
        boxes: String,

        /// Box indices to edit (defaults to the first box)
        #[arg(short, long)]
        select: Vec<usize>,

        /// Edits such as `rotate:z:0.1`, `translate:x:-0.05`, `resize:y:0.2`
        #[arg(short, long = "op", required = true)]
        ops: Vec<EditCommand>,
    },

    /// Write an opt-out marker for a scan
    MarkDeleted {
        /// Scan id
        object_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::default(),
    };
    if let Some(root) = cli.root {
        config.storage.root = root;
    }
    let store = FsStore::new(&config.storage);

    match cli.command {
        Commands::Inspect {
            object_id,
            boxes,
            points,
        } => {
            let mut session = AnnotationSession::new(config);
            open(&mut session, &store, object_id, boxes, points).await?;
            print_session(&session);
        }
        Commands::Edit {
            object_id,
            boxes,
            select,
            ops,
        } => {
            if select.len() > 1 {
                config.multi_select = true;
            }
            let mut session = AnnotationSession::new(config);
            open(&mut session, &store, object_id, boxes, None).await?;

            if !select.is_empty() {
                session.select_set(&select)?;
            }
            for op in ops {
                session.apply(op);
            }

            let path = session.save(&store).await.context("failed to save")?;
            println!("saved {path}");
        }
        Commands::MarkDeleted { object_id } => {
            let path = store
                .save_marker(&object_id, &DeletionMarker::now())
                .await?;
            println!("marked {path}");
        }
    }

    Ok(())
}

async fn open(
    session: &mut AnnotationSession,
    store: &FsStore,
    object_id: String,
    boxes_path: String,
    points_path: Option<String>,
) -> Result<()> {
    let request = SceneRequest {
        object_id,
        boxes_path,
        points_path,
    };
    let ticket = session.begin_load();
    let scene = load_scene(store, &request, &ticket)
        .await
        .with_context(|| format!("failed to load {}", request.object_id))?;

    for failure in &scene.failures {
        eprintln!(
            "skipped box #{} ({}): {}",
            failure.index,
            failure.obj_id.as_deref().unwrap_or("?"),
            failure.error
        );
    }
    session.install(&ticket, scene)?;
    Ok(())
}

fn print_session(session: &AnnotationSession) {
    if let Some(marker) = session.marker() {
        if marker.deleted {
            println!("scan marked deleted at {}", marker.timestamp);
        }
    }
    if let Some(stats) = session.point_cloud().and_then(|cloud| cloud.stats()) {
        println!(
            "points: {}  min [{:.3}, {:.3}, {:.3}]  max [{:.3}, {:.3}, {:.3}]",
            stats.count, stats.min.x, stats.min.y, stats.min.z, stats.max.x, stats.max.y, stats.max.z
        );
    }

    for (i, obb) in session.boxes().iter().enumerate() {
        let c = obb.center();
        let d = obb.dimensions();
        let r = obb.rotation();
        println!(
            "#{i} {} [{}]  center [{:.3}, {:.3}, {:.3}]  dims [{:.3}, {:.3}, {:.3}]  euler [{:.4}, {:.4}, {:.4}]",
            obb.id, obb.category, c.x, c.y, c.z, d.x, d.y, d.z, r.x, r.y, r.z
        );
    }
}

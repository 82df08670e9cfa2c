use chrono::Utc;
use clap::{Parser, Subcommand};
use layer_pipeline::admin::{AdminState, admin_router};
use layer_pipeline::config::{PipelineConfig, redact_db_url};
use layer_pipeline::entity::layer;
use layer_pipeline::tasks::{ImportStage, Pipeline};
use layer_pipeline::worker::TaskQueue;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "layer-pipeline",
    about = "Geoportal layer import and publication pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the admin API and worker pool (default)
    Serve,
    /// Import one layer in the foreground and print the outcome
    Import {
        #[arg(long)]
        layer_id: Uuid,
    },
    /// Remove a catalog entry and/or drop a table
    Delete {
        #[arg(long)]
        table: Option<String>,
        /// `workspace:layer`
        #[arg(long)]
        catalog_entry: Option<String>,
    },
    /// Manage layer records
    Layer {
        #[command(subcommand)]
        action: LayerAction,
    },
}

#[derive(Subcommand)]
enum LayerAction {
    /// Register a layer for import
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        /// Path to the uploaded file, absolute or relative to GP_MEDIA_ROOT
        #[arg(long)]
        source_file: Option<String>,
        #[arg(long, default_value = "vector")]
        layer_kind: String,
        #[arg(long, default_value = "line")]
        geom_kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cfg = PipelineConfig::from_env()?;

    tracing::info!(database = %redact_db_url(&cfg.database_url), "connecting to database");

    let db = Database::connect(&cfg.database_url).await?;
    Migrator::up(&db, None).await?;

    tracing::info!("database initialized");

    match cli.command {
        None | Some(Commands::Serve) => serve(db, &cfg).await?,
        Some(Commands::Import { layer_id }) => {
            let pipeline = Pipeline::from_config(db, &cfg)?;
            let progress = |stage: ImportStage| tracing::info!(stage = stage.as_str(), "import progress");
            let outcome = pipeline.run_import(layer_id, &progress).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Some(Commands::Delete {
            table,
            catalog_entry,
        }) => {
            let pipeline = Pipeline::from_config(db, &cfg)?;
            let outcome = pipeline
                .run_delete(table.as_deref(), catalog_entry.as_deref())
                .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success() {
                std::process::exit(1);
            }
        }
        Some(Commands::Layer { action }) => handle_layer_action(&db, action).await?,
    }

    Ok(())
}

async fn serve(db: DatabaseConnection, cfg: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Arc::new(Pipeline::from_config(db.clone(), cfg)?);
    let queue = TaskQueue::new(pipeline, cfg.workers);

    tracing::info!(
        workers = cfg.workers,
        geoserver = %cfg.catalog.base_url,
        workspace = %cfg.catalog.workspace,
        "worker pool ready"
    );

    let state = AdminState { db, queue };

    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "Admin API online");

    axum::serve(listener, admin_router(state, &cfg.cors_allowed_origins)).await?;
    Ok(())
}

async fn handle_layer_action(
    db: &DatabaseConnection,
    action: LayerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LayerAction::Create {
            title,
            slug,
            source_file,
            layer_kind,
            geom_kind,
        } => {
            let now = Utc::now().naive_utc();
            let model = layer::ActiveModel {
                id: Set(Uuid::now_v7()),
                title: Set(title),
                slug: Set(slug),
                layer_kind: Set(layer_kind),
                geom_kind: Set(geom_kind),
                source_file: Set(source_file),
                catalog_entry: Set(None),
                table_name: Set(None),
                feature_count: Set(0),
                bbox_west: Set(None),
                bbox_south: Set(None),
                bbox_east: Set(None),
                bbox_north: Set(None),
                is_published: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            tracing::info!(id = %model.id, slug = %model.slug, "Created layer");
            println!("{}", model.id);
        }
    }
    Ok(())
}

//! Import and delete orchestration.
//!
//! A task never lets a fault escape: callers get a serializable outcome that is
//! either a success, a success with degraded publication, or a failure with a
//! message.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::catalog::{CatalogService, GeoServerClient};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::{SpatialLoader, TokioProcessRunner};
use crate::resolver::Resolver;
use crate::spatial::SpatialStore;
use crate::spatial::postgres::PostgresSpatialStore;

pub mod delete;
pub mod import;

// ---------- settings ----------

#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Base for relative `source_file` paths.
    pub media_root: PathBuf,
    pub workspace: String,
    pub datastore: String,
    /// Extra attempts after the first, for retryable errors only.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl TaskSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            media_root: cfg.media_root.clone(),
            workspace: cfg.catalog.workspace.clone(),
            datastore: cfg.catalog.datastore.clone(),
            max_retries: cfg.max_retries,
            retry_backoff: cfg.retry_backoff,
        }
    }
}

// ---------- pipeline ----------

/// Everything an import or delete needs, shared by all workers.
pub struct Pipeline {
    pub(crate) db: DatabaseConnection,
    pub(crate) resolver: Resolver,
    pub(crate) loader: SpatialLoader,
    pub(crate) store: Arc<dyn SpatialStore>,
    pub(crate) catalog: Arc<dyn CatalogService>,
    pub(crate) settings: TaskSettings,
}

impl Pipeline {
    pub fn new(
        db: DatabaseConnection,
        resolver: Resolver,
        loader: SpatialLoader,
        store: Arc<dyn SpatialStore>,
        catalog: Arc<dyn CatalogService>,
        settings: TaskSettings,
    ) -> Self {
        Self {
            db,
            resolver,
            loader,
            store,
            catalog,
            settings,
        }
    }

    /// Wire up the production implementations: ogr2ogr, PostGIS and GeoServer.
    pub fn from_config(db: DatabaseConnection, cfg: &PipelineConfig) -> Result<Self> {
        let store: Arc<dyn SpatialStore> = Arc::new(PostgresSpatialStore::new(cfg.spatial.clone()));
        let loader = SpatialLoader::new(
            Arc::new(TokioProcessRunner),
            store.clone(),
            cfg.spatial.clone(),
            cfg.loader.clone(),
        );
        let catalog = Arc::new(GeoServerClient::new(
            &cfg.catalog,
            cfg.spatial.clone(),
            cfg.loader.target_srid,
        )?);

        Ok(Self::new(
            db,
            Resolver::new(),
            loader,
            store,
            catalog,
            TaskSettings::from_config(cfg),
        ))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn catalog(&self) -> &dyn CatalogService {
        self.catalog.as_ref()
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }
}

// ---------- state machine ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Queued,
    Resolving,
    Loading,
    Extracting,
    UpdatingRecord,
    CreatingAttributes,
    Publishing,
    Done,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStage::Queued => "queued",
            ImportStage::Resolving => "resolving",
            ImportStage::Loading => "loading",
            ImportStage::Extracting => "extracting",
            ImportStage::UpdatingRecord => "updating_record",
            ImportStage::CreatingAttributes => "creating_attributes",
            ImportStage::Publishing => "publishing",
            ImportStage::Done => "done",
        }
    }
}

// ---------- outcomes ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    pub feature_count: i64,
    /// Normalized geometry kind ("point", "line", "polygon", "multi").
    pub geom_type: Option<String>,
    /// Whether catalog publication succeeded. `success && !geoserver` is the
    /// "table loaded, catalog absent" state.
    pub geoserver: bool,
    pub catalog_entry: Option<String>,
    pub table_name: Option<String>,
}

impl ImportOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            feature_count: 0,
            geom_type: None,
            geoserver: false,
            catalog_entry: None,
            table_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
}

impl StepOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Per-system results of a teardown; `None` means the step was not attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub catalog: Option<StepOutcome>,
    pub table: Option<StepOutcome>,
}

impl DeleteOutcome {
    /// True when every attempted step succeeded.
    pub fn success(&self) -> bool {
        [&self.catalog, &self.table]
            .into_iter()
            .flatten()
            .all(|s| s.success)
    }
}

// ---------- naming ----------

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("Expression is valid"));

/// Spatial-database table name for a layer slug: lowercased, with each run of
/// other characters collapsed to `_`.
pub fn table_name_for_slug(slug: &str) -> String {
    NON_ALNUM
        .replace_all(&slug.to_lowercase(), "_")
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Multi,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
            GeometryKind::Multi => "multi",
        }
    }
}

/// Map a PostGIS `GeometryType()` string onto the layer's declared kind.
pub fn normalize_geometry_kind(geom_type: &str) -> GeometryKind {
    match geom_type.trim().to_ascii_uppercase().as_str() {
        "POINT" | "MULTIPOINT" => GeometryKind::Point,
        t if t.ends_with("LINESTRING") => GeometryKind::Line,
        t if t.ends_with("POLYGON") => GeometryKind::Polygon,
        _ => GeometryKind::Multi,
    }
}

/// Human label for an attribute column: `elevation_m` becomes `Elevation M`.
pub fn display_label(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len());
    let mut prev_alpha = false;
    for c in field_name.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

// ---------- retry ----------

/// Run `op`, retrying up to `max_retries` more times while the error is
/// retryable. Business failures are returned on the first attempt.
pub(crate) async fn with_retries<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    task = %what,
                    attempt,
                    max_retries,
                    error = %e,
                    "retrying after unexpected error"
                );
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}

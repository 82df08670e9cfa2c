//! In-process fakes for the external seams, shared by unit tests.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use tokio_postgres::config::SslMode;
use uuid::Uuid;

use crate::catalog::{CatalogService, PublishAction};
use crate::config::SpatialDbConfig;
use crate::entity::layer;
use crate::error::{PipelineError, Result};
use crate::loader::{ProcessOutput, ProcessRunner};
use crate::spatial::{BoundingBox, ColumnInfo, SpatialStore};

pub fn spatial_config() -> SpatialDbConfig {
    SpatialDbConfig {
        host: "localhost".to_string(),
        port: 5432,
        database: "gis".to_string(),
        username: "loader".to_string(),
        password: "s3cret".to_string(),
        schema: "public".to_string(),
        ssl_mode: SslMode::Disable,
    }
}

/// Fresh in-memory application database with all migrations applied.
pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Insert a layer with the given slug and (optional) source file.
pub async fn insert_layer(
    db: &DatabaseConnection,
    slug: &str,
    source_file: Option<&Path>,
) -> layer::Model {
    let now = Utc::now().naive_utc();
    layer::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(slug.replace('-', " ")),
        slug: Set(slug.to_string()),
        layer_kind: Set("vector".to_string()),
        geom_kind: Set("line".to_string()),
        source_file: Set(source_file.map(|p| p.to_string_lossy().into_owned())),
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
    .await
    .unwrap()
}

// ---------- process runner ----------

enum RunnerResponse {
    Exit { code: i32, stderr: String },
    Timeout,
    SpawnError,
}

pub struct FakeRunner {
    response: RunnerResponse,
    calls: Mutex<Vec<(String, Vec<String>, Duration)>>,
}

impl FakeRunner {
    fn new(response: RunnerResponse) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(RunnerResponse::Exit {
            code: 0,
            stderr: String::new(),
        })
    }

    pub fn exiting(code: i32, stderr: &str) -> Self {
        Self::new(RunnerResponse::Exit {
            code,
            stderr: stderr.to_string(),
        })
    }

    pub fn timing_out() -> Self {
        Self::new(RunnerResponse::Timeout)
    }

    /// The binary cannot be started at all.
    pub fn missing_binary() -> Self {
        Self::new(RunnerResponse::SpawnError)
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<ProcessOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec(), timeout));

        match &self.response {
            RunnerResponse::Exit { code, stderr } => Ok(ProcessOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            RunnerResponse::Timeout => Err(PipelineError::ImportTimeout(timeout)),
            RunnerResponse::SpawnError => Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No such file or directory ({program})"),
            ))),
        }
    }
}

// ---------- spatial store ----------

/// Pretends every table it is asked about has the configured contents.
#[derive(Default)]
pub struct FakeStore {
    feature_count: i64,
    geom_type: Option<String>,
    bbox: Option<BoundingBox>,
    columns: Vec<ColumnInfo>,
    failing: bool,
    dropped: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn with_table(feature_count: i64, geom_type: Option<&str>) -> Self {
        Self {
            feature_count,
            geom_type: geom_type.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_bbox(mut self, west: f64, south: f64, east: f64, north: f64) -> Self {
        self.bbox = Some(BoundingBox {
            west,
            south,
            east,
            north,
        });
        self
    }

    pub fn with_columns(mut self, names: &[&str]) -> Self {
        self.columns = names
            .iter()
            .map(|n| ColumnInfo {
                name: n.to_string(),
                data_type: "character varying".to_string(),
            })
            .collect();
        self
    }

    /// Every query fails as if the database were down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn dropped(&self) -> Vec<String> {
        self.dropped.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(PipelineError::SpatialDb("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SpatialStore for FakeStore {
    async fn count_features(&self, _table: &str) -> Result<i64> {
        self.check()?;
        Ok(self.feature_count)
    }

    async fn sample_geometry_type(&self, _table: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.geom_type.clone())
    }

    async fn extent(&self, _table: &str) -> Result<Option<BoundingBox>> {
        self.check()?;
        Ok(self.bbox)
    }

    async fn columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        self.check()?;
        Ok(self.columns.clone())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.check()?;
        self.dropped.lock().unwrap().push(table.to_string());
        Ok(())
    }
}

// ---------- catalog ----------

#[derive(Default)]
pub struct FakeCatalog {
    fail_publish: bool,
    fail_delete: bool,
    published: Mutex<Vec<(String, String, String, String)>>,
    deleted: Mutex<Vec<(String, String, String)>>,
}

impl FakeCatalog {
    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Default::default()
        }
    }

    /// `(table, title, workspace, store)` per publish call.
    pub fn published(&self) -> Vec<(String, String, String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// `(name, workspace, store)` per delete call.
    pub fn deleted(&self) -> Vec<(String, String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CatalogService for FakeCatalog {
    async fn publish_postgis_layer(
        &self,
        table: &str,
        title: &str,
        workspace: &str,
        store: &str,
    ) -> Result<PublishAction> {
        let mut published = self.published.lock().unwrap();
        let seen = published.iter().any(|(t, ..)| t == table);
        published.push((
            table.to_string(),
            title.to_string(),
            workspace.to_string(),
            store.to_string(),
        ));

        if self.fail_publish {
            return Err(PipelineError::CatalogRequestFailed {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        Ok(if seen {
            PublishAction::Updated
        } else {
            PublishAction::Created
        })
    }

    async fn delete_layer(&self, name: &str, workspace: &str, store: &str) -> Result<()> {
        self.deleted.lock().unwrap().push((
            name.to_string(),
            workspace.to_string(),
            store.to_string(),
        ));
        if self.fail_delete {
            return Err(PipelineError::CatalogUnreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn layer_info(&self, name: &str, workspace: &str) -> Result<Option<serde_json::Value>> {
        let published = self.published.lock().unwrap();
        Ok(published
            .iter()
            .any(|(t, _, ws, _)| t == name && ws == workspace)
            .then(|| serde_json::json!({ "layer": { "name": name, "type": "VECTOR" } })))
    }
}

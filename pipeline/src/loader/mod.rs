//! Loads vector sources into PostGIS by shelling out to ogr2ogr.

use std::path::Path;
use std::sync::Arc;

use crate::config::{LoaderConfig, SpatialDbConfig};
use crate::error::PipelineError;
use crate::spatial::{BoundingBox, ColumnInfo, GEOMETRY_COLUMN, ID_COLUMN, SpatialStore};

pub mod process;

pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};

/// What a load (and the metadata extraction that follows it) produced.
#[derive(Debug)]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub feature_count: i64,
    pub geom_type: Option<String>,
    pub bbox: Option<BoundingBox>,
    pub columns: Vec<ColumnInfo>,
    pub error: Option<PipelineError>,
}

impl ImportResult {
    fn loaded(feature_count: i64, geom_type: String) -> Self {
        Self {
            success: true,
            message: format!("Successfully imported {feature_count} features"),
            feature_count,
            geom_type: Some(geom_type),
            bbox: None,
            columns: Vec::new(),
            error: None,
        }
    }

    fn failed(error: PipelineError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            feature_count: 0,
            geom_type: None,
            bbox: None,
            columns: Vec::new(),
            error: Some(error),
        }
    }
}

pub struct SpatialLoader {
    runner: Arc<dyn ProcessRunner>,
    store: Arc<dyn SpatialStore>,
    spatial: SpatialDbConfig,
    cfg: LoaderConfig,
}

impl SpatialLoader {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        store: Arc<dyn SpatialStore>,
        spatial: SpatialDbConfig,
        cfg: LoaderConfig,
    ) -> Self {
        Self {
            runner,
            store,
            spatial,
            cfg,
        }
    }

    /// ogr2ogr arguments loading `source` into `table`, replacing any existing table.
    pub fn conversion_args(&self, source: &Path, table: &str) -> Vec<String> {
        self.build_args(self.spatial.ogr_datasource(), source, table)
    }

    fn build_args(&self, datasource: String, source: &Path, table: &str) -> Vec<String> {
        vec![
            "-f".into(),
            "PostgreSQL".into(),
            datasource,
            source.to_string_lossy().into_owned(),
            "-nln".into(),
            table.into(),
            "-nlt".into(),
            "PROMOTE_TO_MULTI".into(),
            "-t_srs".into(),
            format!("EPSG:{}", self.cfg.target_srid),
            "-lco".into(),
            format!("GEOMETRY_NAME={GEOMETRY_COLUMN}"),
            "-lco".into(),
            format!("FID={ID_COLUMN}"),
            "-lco".into(),
            "PRECISION=NO".into(),
            "-lco".into(),
            format!("SCHEMA={}", self.spatial.schema),
            "-overwrite".into(),
            "--config".into(),
            "PG_USE_COPY".into(),
            "YES".into(),
        ]
    }

    /// Run the conversion and read back the feature count and geometry type.
    ///
    /// Never returns an error: every failure becomes a failed [`ImportResult`].
    pub async fn load(&self, source: &Path, table: &str) -> ImportResult {
        let args = self.conversion_args(source, table);
        let logged = self.build_args(self.spatial.ogr_datasource_redacted(), source, table);
        tracing::info!(
            command = %format!("{} {}", self.cfg.ogr2ogr_path, logged.join(" ")),
            "running ogr2ogr"
        );

        let output = match self
            .runner
            .run(&self.cfg.ogr2ogr_path, &args, self.cfg.timeout)
            .await
        {
            Ok(output) => output,
            Err(PipelineError::Io(e)) => {
                let diagnostic = format!("could not run {}: {e}", self.cfg.ogr2ogr_path);
                tracing::error!(table = %table, diagnostic = %diagnostic, "ogr2ogr failed to start");
                return ImportResult::failed(PipelineError::ConversionFailed { diagnostic });
            }
            Err(e) => {
                tracing::error!(table = %table, error = %e, "ogr2ogr could not complete");
                return ImportResult::failed(e);
            }
        };

        if !output.success() {
            let diagnostic = match output.stderr.trim() {
                "" => format!("exited with status {:?}", output.exit_code),
                stderr => stderr.to_string(),
            };
            tracing::error!(table = %table, diagnostic = %diagnostic, "ogr2ogr failed");
            return ImportResult::failed(PipelineError::ConversionFailed { diagnostic });
        }

        let feature_count = match self.store.count_features(table).await {
            Ok(n) => n,
            Err(e) => return ImportResult::failed(e),
        };
        let geom_type = match self.store.sample_geometry_type(table).await {
            Ok(t) => t.unwrap_or_else(|| "UNKNOWN".to_string()),
            Err(e) => return ImportResult::failed(e),
        };

        tracing::info!(table = %table, feature_count, geom_type = %geom_type, "imported features");
        ImportResult::loaded(feature_count, geom_type)
    }
}

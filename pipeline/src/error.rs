use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported file format: {extension}")]
    FormatUnsupported { extension: String },

    #[error("No .shp file found in archive")]
    NoShapefileFound,

    #[error("Archive could not be read: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("ogr2ogr error: {diagnostic}")]
    ConversionFailed { diagnostic: String },

    #[error("Import timed out (>{} seconds)", .0.as_secs())]
    ImportTimeout(Duration),

    #[error("Catalog service unreachable: {0}")]
    CatalogUnreachable(String),

    #[error("Catalog request failed ({status}): {body}")]
    CatalogRequestFailed { status: u16, body: String },

    #[error("Layer {0} not found")]
    RecordNotFound(Uuid),

    #[error("Source file missing: {0}")]
    SourceFileMissing(String),

    #[error("Metadata query failed: {0}")]
    MetadataQueryFailed(String),

    #[error("Spatial database error: {0}")]
    SpatialDb(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Unexpected infrastructure faults are worth another attempt; business
    /// failures (bad input, failed conversion, timeout) will fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Database(_) | PipelineError::Io(_))
    }
}

impl From<tokio_postgres::Error> for PipelineError {
    fn from(e: tokio_postgres::Error) -> Self {
        PipelineError::SpatialDb(e.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

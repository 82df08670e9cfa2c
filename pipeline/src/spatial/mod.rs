use serde::Serialize;

use crate::error::Result;

pub mod postgres;

/// Geometry column name the loader asks ogr2ogr to create.
pub const GEOMETRY_COLUMN: &str = "geom";
/// Identifier column name the loader asks ogr2ogr to create.
pub const ID_COLUMN: &str = "gid";

// ---------- DTOs ----------

/// Axis-aligned extent of a table's geometries, in the target reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// A non-geometry column of an imported table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Postgres type as reported by information_schema (e.g. "character varying")
    pub data_type: String,
}

// ---------- trait ----------

/// Read/drop access to tables in the spatial database.
///
/// Implementations acquire a connection per call; nothing is held between calls.
#[async_trait::async_trait]
pub trait SpatialStore: Send + Sync {
    async fn count_features(&self, table: &str) -> Result<i64>;

    /// `GeometryType()` of one non-null geometry, or `None` if the table has none.
    async fn sample_geometry_type(&self, table: &str) -> Result<Option<String>>;

    /// `ST_Extent` over the geometry column, or `None` if the table has no geometries.
    async fn extent(&self, table: &str) -> Result<Option<BoundingBox>>;

    /// Attribute columns in declaration order, without `gid` and `geom`.
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// `DROP TABLE IF EXISTS ... CASCADE`.
    async fn drop_table(&self, table: &str) -> Result<()>;
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("moraines"), "\"moraines\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}

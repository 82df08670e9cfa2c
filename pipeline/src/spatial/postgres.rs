use tokio_postgres::NoTls;

use super::{BoundingBox, ColumnInfo, GEOMETRY_COLUMN, ID_COLUMN, SpatialStore, quote_ident};
use crate::config::SpatialDbConfig;
use crate::error::{PipelineError, Result};

pub struct PostgresSpatialStore {
    cfg: SpatialDbConfig,
}

impl PostgresSpatialStore {
    pub fn new(cfg: SpatialDbConfig) -> Self {
        Self { cfg }
    }

    async fn connect(&self) -> Result<tokio_postgres::Client> {
        let (client, connection) = self
            .cfg
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| PipelineError::SpatialDb(format!("connect: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("Spatial database connection error: {e}");
            }
        });

        // Set statement timeout to avoid hanging on slow queries
        client
            .execute("SET statement_timeout = '60s'", &[])
            .await?;

        Ok(client)
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.cfg.schema), quote_ident(table))
    }
}

#[async_trait::async_trait]
impl SpatialStore for PostgresSpatialStore {
    async fn count_features(&self, table: &str) -> Result<i64> {
        let client = self.connect().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    async fn sample_geometry_type(&self, table: &str) -> Result<Option<String>> {
        let client = self.connect().await?;
        let geom = quote_ident(GEOMETRY_COLUMN);
        let sql = format!(
            "SELECT GeometryType({geom}) FROM {} WHERE {geom} IS NOT NULL LIMIT 1",
            self.qualified(table)
        );
        let row = client.query_opt(sql.as_str(), &[]).await?;
        Ok(row.and_then(|r| r.get::<_, Option<String>>(0)))
    }

    async fn extent(&self, table: &str) -> Result<Option<BoundingBox>> {
        let client = self.connect().await?;
        let sql = format!(
            "SELECT ST_XMin(e), ST_YMin(e), ST_XMax(e), ST_YMax(e) \
             FROM (SELECT ST_Extent({}) AS e FROM {}) AS extent",
            quote_ident(GEOMETRY_COLUMN),
            self.qualified(table)
        );
        let row = client.query_one(sql.as_str(), &[]).await?;

        let west: Option<f64> = row.get(0);
        let south: Option<f64> = row.get(1);
        let east: Option<f64> = row.get(2);
        let north: Option<f64> = row.get(3);

        Ok(match (west, south, east, north) {
            (Some(west), Some(south), Some(east), Some(north)) => Some(BoundingBox {
                west,
                south,
                east,
                north,
            }),
            _ => None,
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let client = self.connect().await?;
        let rows = client
            .query(
                "SELECT column_name, data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 AND column_name NOT IN ($3, $4) \
                 ORDER BY ordinal_position",
                &[&self.cfg.schema, &table, &ID_COLUMN, &GEOMETRY_COLUMN],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ColumnInfo {
                name: row.get(0),
                data_type: row.get(1),
            })
            .collect())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let client = self.connect().await?;
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified(table));
        client.batch_execute(sql.as_str()).await?;
        tracing::info!(table = %table, "table dropped");
        Ok(())
    }
}

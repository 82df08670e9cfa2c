use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::spatial::BoundingBox;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "portal_layer")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    /// "vector" or "raster"
    pub layer_kind: String,
    /// "point", "line", "polygon" or "multi"
    pub geom_kind: String,
    /// Uploaded source file; relative paths resolve against the media root.
    pub source_file: Option<String>,
    /// Published catalog name, `workspace:table`.
    pub catalog_entry: Option<String>,
    pub table_name: Option<String>,
    pub feature_count: i64,
    pub bbox_west: Option<f64>,
    pub bbox_south: Option<f64>,
    pub bbox_east: Option<f64>,
    pub bbox_north: Option<f64>,
    pub is_published: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::layer_attribute::Entity")]
    LayerAttribute,
}

impl Related<super::layer_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LayerAttribute.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Where a layer stands with respect to the import pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// Table loaded and catalog entry published.
    Imported,
    /// Table loaded but not published to the catalog.
    Loaded,
    /// Source file uploaded, nothing imported yet.
    Pending,
    NoFile,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Imported => "imported",
            ImportStatus::Loaded => "loaded",
            ImportStatus::Pending => "pending",
            ImportStatus::NoFile => "no_file",
        }
    }
}

impl Model {
    /// The cached bounding box, present only when all four edges are set.
    pub fn bbox(&self) -> Option<BoundingBox> {
        Some(BoundingBox {
            west: self.bbox_west?,
            south: self.bbox_south?,
            east: self.bbox_east?,
            north: self.bbox_north?,
        })
    }

    pub fn import_status(&self) -> ImportStatus {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        match (has(&self.table_name), has(&self.catalog_entry)) {
            (true, true) => ImportStatus::Imported,
            (true, false) => ImportStatus::Loaded,
            _ if has(&self.source_file) => ImportStatus::Pending,
            _ => ImportStatus::NoFile,
        }
    }
}

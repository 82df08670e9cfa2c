use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PortalLayer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PortalLayer::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PortalLayer::Title).string().not_null())
                    .col(ColumnDef::new(PortalLayer::Slug).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(PortalLayer::LayerKind)
                            .string()
                            .not_null()
                            .default("vector"),
                    )
                    .col(
                        ColumnDef::new(PortalLayer::GeomKind)
                            .string()
                            .not_null()
                            .default("line"),
                    )
                    .col(ColumnDef::new(PortalLayer::SourceFile).string().null())
                    // workspace:table, set only after a successful publish
                    .col(ColumnDef::new(PortalLayer::CatalogEntry).string().null())
                    .col(ColumnDef::new(PortalLayer::TableName).string().null())
                    .col(
                        ColumnDef::new(PortalLayer::FeatureCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PortalLayer::BboxWest).double().null())
                    .col(ColumnDef::new(PortalLayer::BboxSouth).double().null())
                    .col(ColumnDef::new(PortalLayer::BboxEast).double().null())
                    .col(ColumnDef::new(PortalLayer::BboxNorth).double().null())
                    .col(
                        ColumnDef::new(PortalLayer::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PortalLayer::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PortalLayer::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PortalLayer::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PortalLayer {
    Table,
    Id,
    Title,
    Slug,
    LayerKind,
    GeomKind,
    SourceFile,
    CatalogEntry,
    TableName,
    FeatureCount,
    BboxWest,
    BboxSouth,
    BboxEast,
    BboxNorth,
    IsPublished,
    CreatedAt,
    UpdatedAt,
}

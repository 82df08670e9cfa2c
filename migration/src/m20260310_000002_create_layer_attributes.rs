use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PortalLayerAttribute::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PortalLayerAttribute::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PortalLayerAttribute::LayerId).uuid().not_null())
                    .col(
                        ColumnDef::new(PortalLayerAttribute::FieldName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PortalLayerAttribute::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PortalLayerAttribute::ShowInPopup)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PortalLayerAttribute::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PortalLayerAttribute::Table, PortalLayerAttribute::LayerId)
                            .to(PortalLayer::Table, PortalLayer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_layer_attribute_layer_field")
                    .table(PortalLayerAttribute::Table)
                    .col(PortalLayerAttribute::LayerId)
                    .col(PortalLayerAttribute::FieldName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PortalLayerAttribute::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PortalLayer {
    Table,
    Id,
}

#[derive(Iden)]
enum PortalLayerAttribute {
    Table,
    Id,
    LayerId,
    FieldName,
    DisplayName,
    ShowInPopup,
    SortOrder,
}

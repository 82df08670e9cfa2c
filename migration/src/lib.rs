pub use sea_orm_migration::prelude::*;

mod m20260310_000001_create_layers;
mod m20260310_000002_create_layer_attributes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260310_000001_create_layers::Migration),
            Box::new(m20260310_000002_create_layer_attributes::Migration),
        ]
    }
}

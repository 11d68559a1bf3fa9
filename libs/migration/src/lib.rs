pub use sea_orm_migration::prelude::*;

mod m20250101_000000_create_inventory;
mod m20250101_000001_seed_branches;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000000_create_inventory::Migration),
            Box::new(m20250101_000001_seed_branches::Migration),
        ]
    }
}

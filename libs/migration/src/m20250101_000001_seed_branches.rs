use sea_orm_migration::prelude::*;

use crate::m20250101_000000_create_inventory::Branches;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let insert = Query::insert()
            .into_table(Branches::Table)
            .columns([Branches::Name, Branches::Address])
            .values_panic(["Casa Matriz".into(), "Av. Libertador 1234, Santiago".into()])
            .values_panic(["Sucursal Norte".into(), "Av. Recoleta 567, Santiago".into()])
            .to_owned();

        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(Branches::Table)
            .and_where(Expr::col(Branches::Name).is_in(["Casa Matriz", "Sucursal Norte"]))
            .to_owned();

        manager.exec_stmt(delete).await
    }
}

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Branches::Table)
                    .if_not_exists()
                    .col(pk_auto(Branches::Id))
                    .col(string_len(Branches::Name, 100))
                    .col(string_len(Branches::Address, 255))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(pk_auto(Products::Id))
                    .col(string_len_uniq(Products::ProductCode, 50))
                    .col(string_len(Products::Brand, 100))
                    .col(string_len_uniq(Products::Code, 50))
                    .col(string_len(Products::Name, 100))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Prices::Table)
                    .if_not_exists()
                    .col(pk_auto(Prices::Id))
                    .col(timestamp_with_time_zone(Prices::Date).default(Expr::current_timestamp()))
                    .col(double(Prices::Value))
                    .col(integer(Prices::ProductId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prices_product_id")
                            .from(Prices::Table, Prices::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stock::Table)
                    .if_not_exists()
                    .col(pk_auto(Stock::Id))
                    .col(integer(Stock::Quantity).default(0))
                    .col(integer(Stock::ProductId))
                    .col(integer(Stock::BranchId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_product_id")
                            .from(Stock::Table, Stock::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_branch_id")
                            .from(Stock::Table, Stock::BranchId)
                            .to(Branches::Table, Branches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Target of the stock upsert
        manager
            .create_index(
                Index::create()
                    .name("uq_stock_product_branch")
                    .table(Stock::Table)
                    .col(Stock::ProductId)
                    .col(Stock::BranchId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TABLE stock ADD CONSTRAINT ck_stock_quantity_non_negative CHECK (quantity >= 0)",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_branch_id")
                    .table(Stock::Table)
                    .col(Stock::BranchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_quantity")
                    .table(Stock::Table)
                    .col(Stock::Quantity)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prices_product_date")
                    .table(Prices::Table)
                    .col(Prices::ProductId)
                    .col(Prices::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stock::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Branches::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Branches {
    Table,
    Id,
    Name,
    Address,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    ProductCode,
    Brand,
    Code,
    Name,
}

#[derive(DeriveIden)]
enum Prices {
    Table,
    Id,
    Date,
    Value,
    ProductId,
}

#[derive(DeriveIden)]
enum Stock {
    Table,
    Id,
    Quantity,
    ProductId,
    BranchId,
}

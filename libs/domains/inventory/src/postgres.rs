use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, SqlErr,
    TransactionTrait,
};
use std::collections::HashMap;
use tracing::info;

use crate::{
    entity::{branch, price, product, stock},
    error::{InventoryError, InventoryResult},
    models::{
        Branch, LowStockRow, NewPrice, NewProduct, PricePoint, ProductUpdate, ProductWithPrices,
        StockBatch, StockDelta, StockDetail, StockLine, StockQuantity,
    },
    repository::InventoryRepository,
};

/// PostgreSQL-backed inventory store.
///
/// Helpers below take the connection or transaction explicitly so each
/// public operation decides its own unit of work.
#[derive(Clone)]
pub struct PgInventoryRepository {
    db: DatabaseConnection,
}

impl PgInventoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct StockLineRow {
    product_code: String,
    name: String,
    brand: String,
    quantity: i32,
}

#[derive(Debug, FromQueryResult)]
struct LowStockQueryRow {
    branch_id: i32,
    branch_name: String,
    product_code: String,
    product_name: String,
    quantity: i32,
}

fn map_write_err(err: DbErr) -> InventoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            InventoryError::Conflict(format!("Registro duplicado: {detail}"))
        }
        _ => err.into(),
    }
}

fn quantity_overflow(product_code: &str) -> InventoryError {
    InventoryError::Validation(format!(
        "Cantidad inválida para el producto {product_code}: excede el máximo permitido"
    ))
}

/// Postgres reports `i32` overflow in `quantity + excluded.quantity` as
/// SQLSTATE 22003, "integer out of range".
fn map_increment_err(err: DbErr, product_code: &str) -> InventoryError {
    let text = err.to_string();
    if text.contains("22003") || text.contains("out of range") {
        quantity_overflow(product_code)
    } else {
        err.into()
    }
}

async fn find_product_model<C: ConnectionTrait>(
    conn: &C,
    product_code: &str,
) -> InventoryResult<Option<product::Model>> {
    Ok(product::Entity::find()
        .filter(product::Column::ProductCode.eq(product_code))
        .one(conn)
        .await?)
}

async fn code_taken<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    except_id: Option<i32>,
) -> InventoryResult<bool> {
    let mut query = product::Entity::find().filter(product::Column::Code.eq(code));
    if let Some(id) = except_id {
        query = query.filter(product::Column::Id.ne(id));
    }
    Ok(query.one(conn).await?.is_some())
}

/// Chronological price histories keyed by product id
async fn price_histories<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i32],
) -> InventoryResult<HashMap<i32, Vec<PricePoint>>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = price::Entity::find()
        .filter(price::Column::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(price::Column::Date)
        .order_by_asc(price::Column::Id)
        .all(conn)
        .await?;

    let mut histories: HashMap<i32, Vec<PricePoint>> = HashMap::new();
    for row in rows {
        histories.entry(row.product_id).or_default().push(row.into());
    }
    Ok(histories)
}

async fn load_product<C: ConnectionTrait>(
    conn: &C,
    model: product::Model,
) -> InventoryResult<ProductWithPrices> {
    let mut histories = price_histories(conn, &[model.id]).await?;
    let prices = histories.remove(&model.id).unwrap_or_default();
    Ok(ProductWithPrices::new(model.into(), prices))
}

async fn insert_prices<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    prices: &[NewPrice],
) -> InventoryResult<()> {
    if prices.is_empty() {
        return Ok(());
    }
    price::Entity::insert_many(
        prices
            .iter()
            .map(|p| price::ActiveModel::for_product(product_id, p)),
    )
    .exec(conn)
    .await?;
    Ok(())
}

/// Increments the (product, branch) row, creating it on first use.
///
/// The existing row is read with `FOR UPDATE`; the insert path upserts so a
/// concurrent first insert for the same pair adds instead of failing.
async fn increment_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    branch_id: i32,
    delta: &StockDelta,
) -> InventoryResult<()> {
    let existing = stock::Entity::find()
        .filter(stock::Column::ProductId.eq(product_id))
        .filter(stock::Column::BranchId.eq(branch_id))
        .lock_exclusive()
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            let quantity = row
                .quantity
                .checked_add(delta.quantity)
                .ok_or_else(|| quantity_overflow(&delta.product_code))?;
            let mut active: stock::ActiveModel = row.into();
            active.quantity = Set(quantity);
            active.update(conn).await?;
        }
        None => {
            let upsert = OnConflict::columns([stock::Column::ProductId, stock::Column::BranchId])
                .value(
                    stock::Column::Quantity,
                    Expr::cust("stock.quantity + excluded.quantity"),
                )
                .to_owned();

            stock::Entity::insert(stock::ActiveModel {
                product_id: Set(product_id),
                branch_id: Set(branch_id),
                quantity: Set(delta.quantity),
                ..Default::default()
            })
            .on_conflict(upsert)
            .exec(conn)
            .await
            .map_err(|err| map_increment_err(err, &delta.product_code))?;
        }
    }

    Ok(())
}

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn list_branches(&self) -> InventoryResult<Vec<Branch>> {
        let models = branch::Entity::find()
            .order_by_asc(branch::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_branch(&self, id: i32) -> InventoryResult<Option<Branch>> {
        let model = branch::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn apply_stock_batch(&self, branch_id: i32, batch: &StockBatch) -> InventoryResult<()> {
        // Dropping `txn` on any early return rolls the batch back.
        let txn = self.db.begin().await?;

        if branch::Entity::find_by_id(branch_id)
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(InventoryError::BranchNotFound(branch_id));
        }

        for delta in batch.items() {
            let product = find_product_model(&txn, &delta.product_code)
                .await?
                .ok_or_else(|| InventoryError::ProductNotFound(delta.product_code.clone()))?;

            increment_stock(&txn, product.id, branch_id, delta).await?;
        }

        txn.commit().await?;

        info!(branch_id, items = batch.len(), "Applied stock batch");
        Ok(())
    }

    async fn branch_stock(&self, branch_id: i32) -> InventoryResult<Vec<StockLine>> {
        let rows = stock::Entity::find()
            .select_only()
            .column(product::Column::ProductCode)
            .column(product::Column::Name)
            .column(product::Column::Brand)
            .column(stock::Column::Quantity)
            .join(JoinType::InnerJoin, stock::Relation::Product.def())
            .filter(stock::Column::BranchId.eq(branch_id))
            .order_by_asc(product::Column::ProductCode)
            .into_model::<StockLineRow>()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| StockLine {
                product_code: row.product_code,
                name: row.name,
                brand: row.brand,
                quantity: row.quantity,
            })
            .collect())
    }

    async fn branch_stock_detailed(&self, branch_id: i32) -> InventoryResult<Vec<StockDetail>> {
        let rows = stock::Entity::find()
            .filter(stock::Column::BranchId.eq(branch_id))
            .find_also_related(product::Entity)
            .order_by_asc(product::Column::ProductCode)
            .all(&self.db)
            .await?;

        let product_ids: Vec<i32> = rows.iter().map(|(s, _)| s.product_id).collect();
        let mut histories = price_histories(&self.db, &product_ids).await?;

        Ok(rows
            .into_iter()
            .filter_map(|(stock_row, product_row)| {
                let product_row = product_row?;
                let prices = histories.remove(&product_row.id).unwrap_or_default();
                Some(StockDetail {
                    product: ProductWithPrices::new(product_row.into(), prices),
                    stock: StockQuantity {
                        quantity: stock_row.quantity,
                    },
                })
            })
            .collect())
    }

    async fn low_stock(&self, threshold: i32) -> InventoryResult<Vec<LowStockRow>> {
        let rows = stock::Entity::find()
            .select_only()
            .column(stock::Column::BranchId)
            .column_as(branch::Column::Name, "branch_name")
            .column(product::Column::ProductCode)
            .column_as(product::Column::Name, "product_name")
            .column(stock::Column::Quantity)
            .join(JoinType::InnerJoin, stock::Relation::Product.def())
            .join(JoinType::InnerJoin, stock::Relation::Branch.def())
            .filter(stock::Column::Quantity.lt(threshold))
            .order_by_asc(stock::Column::BranchId)
            .order_by_asc(product::Column::ProductCode)
            .into_model::<LowStockQueryRow>()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| LowStockRow {
                branch_id: row.branch_id,
                branch_name: row.branch_name,
                product_code: row.product_code,
                product_name: row.product_name,
                quantity: row.quantity,
            })
            .collect())
    }

    async fn create_product(&self, input: NewProduct) -> InventoryResult<ProductWithPrices> {
        let txn = self.db.begin().await?;

        if find_product_model(&txn, &input.product_code).await?.is_some() {
            return Err(InventoryError::Conflict(
                "Ya existe un producto con este código".to_string(),
            ));
        }
        if code_taken(&txn, &input.code, None).await? {
            return Err(InventoryError::Conflict(format!(
                "Ya existe un producto con el código {}",
                input.code
            )));
        }

        let model = product::ActiveModel::from(&input)
            .insert(&txn)
            .await
            .map_err(map_write_err)?;
        insert_prices(&txn, model.id, &input.prices).await?;
        let created = load_product(&txn, model).await?;

        txn.commit().await?;

        info!(product_id = created.id, product_code = %created.product_code, "Created product");
        Ok(created)
    }

    async fn update_product(
        &self,
        product_code: &str,
        update: ProductUpdate,
    ) -> InventoryResult<ProductWithPrices> {
        let txn = self.db.begin().await?;

        let model = find_product_model(&txn, product_code)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_code.to_string()))?;
        let product_id = model.id;

        if let Some(code) = &update.code {
            if code_taken(&txn, code, Some(product_id)).await? {
                return Err(InventoryError::Conflict(format!(
                    "Ya existe un producto con el código {code}"
                )));
            }
        }

        let mut active: product::ActiveModel = model.clone().into();
        if let Some(brand) = update.brand {
            active.brand = Set(brand);
        }
        if let Some(code) = update.code {
            active.code = Set(code);
        }
        if let Some(name) = update.name {
            active.name = Set(name);
        }

        let model = if active.is_changed() {
            active.update(&txn).await.map_err(map_write_err)?
        } else {
            model
        };
        insert_prices(&txn, product_id, &update.prices).await?;
        let updated = load_product(&txn, model).await?;

        txn.commit().await?;

        info!(product_id, product_code, "Updated product");
        Ok(updated)
    }

    async fn delete_product(&self, product_code: &str) -> InventoryResult<()> {
        let txn = self.db.begin().await?;

        let model = find_product_model(&txn, product_code)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_code.to_string()))?;

        // Dependents first: prices and stock hold non-nullable keys to the product.
        let prices = price::Entity::delete_many()
            .filter(price::Column::ProductId.eq(model.id))
            .exec(&txn)
            .await?;
        let stock_rows = stock::Entity::delete_many()
            .filter(stock::Column::ProductId.eq(model.id))
            .exec(&txn)
            .await?;
        product::Entity::delete_by_id(model.id).exec(&txn).await?;

        txn.commit().await?;

        info!(
            product_id = model.id,
            product_code,
            prices_removed = prices.rows_affected,
            stock_removed = stock_rows.rows_affected,
            "Deleted product"
        );
        Ok(())
    }

    async fn list_products(&self) -> InventoryResult<Vec<ProductWithPrices>> {
        let models = product::Entity::find()
            .order_by_asc(product::Column::ProductCode)
            .all(&self.db)
            .await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let mut histories = price_histories(&self.db, &ids).await?;

        Ok(models
            .into_iter()
            .map(|model| {
                let prices = histories.remove(&model.id).unwrap_or_default();
                ProductWithPrices::new(model.into(), prices)
            })
            .collect())
    }

    async fn find_product(&self, product_code: &str) -> InventoryResult<Option<ProductWithPrices>> {
        match find_product_model(&self.db, product_code).await? {
            Some(model) => Ok(Some(load_product(&self.db, model).await?)),
            None => Ok(None),
        }
    }
}

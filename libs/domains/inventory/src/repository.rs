use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{InventoryError, InventoryResult};
use crate::models::{
    Branch, LowStockRow, NewProduct, PricePoint, Product, ProductUpdate, ProductWithPrices,
    StockBatch, StockDetail, StockLine, StockQuantity,
};

/// Data access for branches, catalog and stock.
///
/// Every method is one unit of work: implementations acquire and release
/// their own transaction or session per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// All branches ordered by id
    async fn list_branches(&self) -> InventoryResult<Vec<Branch>>;

    async fn find_branch(&self, id: i32) -> InventoryResult<Option<Branch>>;

    /// Applies every delta of the batch or none of them.
    ///
    /// Fails with `BranchNotFound` before reading any product, and with
    /// `ProductNotFound` on the first unknown code.
    async fn apply_stock_batch(&self, branch_id: i32, batch: &StockBatch) -> InventoryResult<()>;

    /// Stock lines of a branch ordered by product code
    async fn branch_stock(&self, branch_id: i32) -> InventoryResult<Vec<StockLine>>;

    /// Stock of a branch with each product's chronological price history
    async fn branch_stock_detailed(&self, branch_id: i32) -> InventoryResult<Vec<StockDetail>>;

    /// Stock rows with `quantity < threshold`, ordered by branch then product code
    async fn low_stock(&self, threshold: i32) -> InventoryResult<Vec<LowStockRow>>;

    async fn create_product(&self, input: NewProduct) -> InventoryResult<ProductWithPrices>;

    async fn update_product(
        &self,
        product_code: &str,
        update: ProductUpdate,
    ) -> InventoryResult<ProductWithPrices>;

    /// Removes prices and stock of the product, then the product itself
    async fn delete_product(&self, product_code: &str) -> InventoryResult<()>;

    async fn list_products(&self) -> InventoryResult<Vec<ProductWithPrices>>;

    async fn find_product(&self, product_code: &str) -> InventoryResult<Option<ProductWithPrices>>;
}

#[derive(Debug, Clone)]
struct PriceRow {
    id: i32,
    product_id: i32,
    date: DateTime<Utc>,
    value: f64,
}

#[derive(Default)]
struct Store {
    branches: BTreeMap<i32, Branch>,
    products: BTreeMap<i32, Product>,
    prices: Vec<PriceRow>,
    /// (product_id, branch_id) -> quantity
    stock: BTreeMap<(i32, i32), i32>,
    next_branch_id: i32,
    next_product_id: i32,
    next_price_id: i32,
}

impl Store {
    fn product_by_code(&self, product_code: &str) -> Option<&Product> {
        self.products
            .values()
            .find(|p| p.product_code == product_code)
    }

    fn price_history(&self, product_id: i32) -> Vec<PricePoint> {
        let mut rows: Vec<&PriceRow> = self
            .prices
            .iter()
            .filter(|p| p.product_id == product_id)
            .collect();
        rows.sort_by_key(|p| (p.date, p.id));
        rows.into_iter()
            .map(|p| PricePoint {
                date: p.date,
                value: p.value,
            })
            .collect()
    }

    fn with_prices(&self, product: &Product) -> ProductWithPrices {
        ProductWithPrices::new(product.clone(), self.price_history(product.id))
    }

    fn push_prices(&mut self, product_id: i32, prices: &[crate::models::NewPrice]) {
        for price in prices {
            self.next_price_id += 1;
            self.prices.push(PriceRow {
                id: self.next_price_id,
                product_id,
                date: price.date,
                value: price.value,
            });
        }
    }

    /// Branch stock entries sorted by product code
    fn stock_of(&self, branch_id: i32) -> Vec<(&Product, i32)> {
        let mut entries: Vec<(&Product, i32)> = self
            .stock
            .iter()
            .filter(|((_, b), _)| *b == branch_id)
            .filter_map(|((p, _), qty)| self.products.get(p).map(|product| (product, *qty)))
            .collect();
        entries.sort_by(|a, b| a.0.product_code.cmp(&b.0.product_code));
        entries
    }
}

/// In-memory implementation of InventoryRepository (for development/testing)
#[derive(Clone, Default)]
pub struct InMemoryInventoryRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a branch. Branch management is not part of the public API.
    pub async fn add_branch(&self, name: &str, address: &str) -> Branch {
        let mut store = self.store.write().await;
        store.next_branch_id += 1;
        let branch = Branch {
            id: store.next_branch_id,
            name: name.to_string(),
            address: address.to_string(),
        };
        store.branches.insert(branch.id, branch.clone());
        branch
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn list_branches(&self) -> InventoryResult<Vec<Branch>> {
        let store = self.store.read().await;
        Ok(store.branches.values().cloned().collect())
    }

    async fn find_branch(&self, id: i32) -> InventoryResult<Option<Branch>> {
        let store = self.store.read().await;
        Ok(store.branches.get(&id).cloned())
    }

    async fn apply_stock_batch(&self, branch_id: i32, batch: &StockBatch) -> InventoryResult<()> {
        let mut store = self.store.write().await;

        if !store.branches.contains_key(&branch_id) {
            return Err(InventoryError::BranchNotFound(branch_id));
        }

        // Stage every change first; nothing is written unless all items resolve.
        let mut staged: HashMap<(i32, i32), i32> = HashMap::new();
        for delta in batch.items() {
            let product_id = store
                .product_by_code(&delta.product_code)
                .map(|p| p.id)
                .ok_or_else(|| InventoryError::ProductNotFound(delta.product_code.clone()))?;

            let key = (product_id, branch_id);
            let current = staged
                .get(&key)
                .copied()
                .or_else(|| store.stock.get(&key).copied())
                .unwrap_or(0);
            let updated = current.checked_add(delta.quantity).ok_or_else(|| {
                InventoryError::Validation(format!(
                    "Cantidad inválida para el producto {}: excede el máximo permitido",
                    delta.product_code
                ))
            })?;
            staged.insert(key, updated);
        }

        store.stock.extend(staged);
        Ok(())
    }

    async fn branch_stock(&self, branch_id: i32) -> InventoryResult<Vec<StockLine>> {
        let store = self.store.read().await;
        Ok(store
            .stock_of(branch_id)
            .into_iter()
            .map(|(product, quantity)| StockLine {
                product_code: product.product_code.clone(),
                name: product.name.clone(),
                brand: product.brand.clone(),
                quantity,
            })
            .collect())
    }

    async fn branch_stock_detailed(&self, branch_id: i32) -> InventoryResult<Vec<StockDetail>> {
        let store = self.store.read().await;
        Ok(store
            .stock_of(branch_id)
            .into_iter()
            .map(|(product, quantity)| StockDetail {
                product: store.with_prices(product),
                stock: StockQuantity { quantity },
            })
            .collect())
    }

    async fn low_stock(&self, threshold: i32) -> InventoryResult<Vec<LowStockRow>> {
        let store = self.store.read().await;
        let mut rows: Vec<LowStockRow> = store
            .stock
            .iter()
            .filter(|(_, qty)| **qty < threshold)
            .filter_map(|((product_id, branch_id), qty)| {
                let product = store.products.get(product_id)?;
                let branch = store.branches.get(branch_id)?;
                Some(LowStockRow {
                    branch_id: branch.id,
                    branch_name: branch.name.clone(),
                    product_code: product.product_code.clone(),
                    product_name: product.name.clone(),
                    quantity: *qty,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.branch_id, &a.product_code).cmp(&(b.branch_id, &b.product_code))
        });
        Ok(rows)
    }

    async fn create_product(&self, input: NewProduct) -> InventoryResult<ProductWithPrices> {
        let mut store = self.store.write().await;

        if store.product_by_code(&input.product_code).is_some() {
            return Err(InventoryError::Conflict(
                "Ya existe un producto con este código".to_string(),
            ));
        }
        if store.products.values().any(|p| p.code == input.code) {
            return Err(InventoryError::Conflict(format!(
                "Ya existe un producto con el código {}",
                input.code
            )));
        }

        store.next_product_id += 1;
        let product = Product {
            id: store.next_product_id,
            product_code: input.product_code,
            brand: input.brand,
            code: input.code,
            name: input.name,
        };
        store.products.insert(product.id, product.clone());
        store.push_prices(product.id, &input.prices);

        Ok(store.with_prices(&product))
    }

    async fn update_product(
        &self,
        product_code: &str,
        update: ProductUpdate,
    ) -> InventoryResult<ProductWithPrices> {
        let mut store = self.store.write().await;

        let mut product = store
            .product_by_code(product_code)
            .cloned()
            .ok_or_else(|| InventoryError::ProductNotFound(product_code.to_string()))?;

        if let Some(code) = &update.code {
            let taken = store
                .products
                .values()
                .any(|p| p.id != product.id && &p.code == code);
            if taken {
                return Err(InventoryError::Conflict(format!(
                    "Ya existe un producto con el código {code}"
                )));
            }
        }

        if let Some(brand) = update.brand {
            product.brand = brand;
        }
        if let Some(code) = update.code {
            product.code = code;
        }
        if let Some(name) = update.name {
            product.name = name;
        }
        store.products.insert(product.id, product.clone());
        store.push_prices(product.id, &update.prices);

        Ok(store.with_prices(&product))
    }

    async fn delete_product(&self, product_code: &str) -> InventoryResult<()> {
        let mut store = self.store.write().await;

        let product_id = store
            .product_by_code(product_code)
            .map(|p| p.id)
            .ok_or_else(|| InventoryError::ProductNotFound(product_code.to_string()))?;

        store.prices.retain(|p| p.product_id != product_id);
        store.stock.retain(|(p, _), _| *p != product_id);
        store.products.remove(&product_id);
        Ok(())
    }

    async fn list_products(&self) -> InventoryResult<Vec<ProductWithPrices>> {
        let store = self.store.read().await;
        let mut products: Vec<ProductWithPrices> =
            store.products.values().map(|p| store.with_prices(p)).collect();
        products.sort_by(|a, b| a.product_code.cmp(&b.product_code));
        Ok(products)
    }

    async fn find_product(&self, product_code: &str) -> InventoryResult<Option<ProductWithPrices>> {
        let store = self.store.read().await;
        Ok(store.product_by_code(product_code).map(|p| store.with_prices(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPrice, StockDelta, parse_price_date};

    fn new_product(product_code: &str, code: &str) -> NewProduct {
        NewProduct {
            product_code: product_code.to_string(),
            brand: "Stanley".to_string(),
            code: code.to_string(),
            name: format!("Producto {product_code}"),
            prices: vec![],
        }
    }

    fn batch(items: &[(&str, i32)]) -> StockBatch {
        StockBatch::try_from(
            items
                .iter()
                .map(|(code, qty)| StockDelta {
                    product_code: code.to_string(),
                    quantity: *qty,
                })
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    async fn seeded() -> (InMemoryInventoryRepository, Branch) {
        let repo = InMemoryInventoryRepository::new();
        let branch = repo.add_branch("Casa Matriz", "Av. Siempre Viva 123").await;
        repo.create_product(new_product("P-100", "C-100")).await.unwrap();
        repo.create_product(new_product("P-200", "C-200")).await.unwrap();
        (repo, branch)
    }

    #[tokio::test]
    async fn test_apply_batch_is_additive() {
        let (repo, branch) = seeded().await;

        repo.apply_stock_batch(branch.id, &batch(&[("P-100", 3)])).await.unwrap();
        repo.apply_stock_batch(branch.id, &batch(&[("P-100", 3)])).await.unwrap();

        let stock = repo.branch_stock(branch.id).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].quantity, 6);
    }

    #[tokio::test]
    async fn test_repeated_code_within_batch_accumulates() {
        let (repo, branch) = seeded().await;

        repo.apply_stock_batch(branch.id, &batch(&[("P-100", 2), ("P-100", 5)]))
            .await
            .unwrap();

        let stock = repo.branch_stock(branch.id).await.unwrap();
        assert_eq!(stock[0].quantity, 7);
    }

    #[tokio::test]
    async fn test_unknown_product_leaves_all_rows_untouched() {
        let (repo, branch) = seeded().await;
        repo.apply_stock_batch(branch.id, &batch(&[("P-200", 4)])).await.unwrap();

        let err = repo
            .apply_stock_batch(branch.id, &batch(&[("P-100", 10), ("P-200", 1), ("NOPE", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(code) if code == "NOPE"));

        let stock = repo.branch_stock(branch.id).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].product_code, "P-200");
        assert_eq!(stock[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_missing_branch_fails_before_products() {
        let (repo, _) = seeded().await;

        let err = repo
            .apply_stock_batch(99, &batch(&[("NOPE", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::BranchNotFound(99)));
    }

    #[tokio::test]
    async fn test_overflow_is_rejected_without_mutation() {
        let (repo, branch) = seeded().await;
        repo.apply_stock_batch(branch.id, &batch(&[("P-100", i32::MAX)])).await.unwrap();

        let err = repo
            .apply_stock_batch(branch.id, &batch(&[("P-100", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert_eq!(repo.branch_stock(branch.id).await.unwrap()[0].quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_low_stock_filters_and_orders_rows() {
        let (repo, branch) = seeded().await;
        let other = repo.add_branch("Sucursal Norte", "Ruta 9 km 4").await;

        repo.apply_stock_batch(branch.id, &batch(&[("P-200", 2), ("P-100", 1)]))
            .await
            .unwrap();
        repo.apply_stock_batch(other.id, &batch(&[("P-100", 50), ("P-200", 4)]))
            .await
            .unwrap();

        let rows = repo.low_stock(5).await.unwrap();
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.branch_name.as_str(), r.product_code.as_str(), r.quantity))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Casa Matriz", "P-100", 1),
                ("Casa Matriz", "P-200", 2),
                ("Sucursal Norte", "P-200", 4),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_product_codes_conflict() {
        let (repo, _) = seeded().await;

        let err = repo.create_product(new_product("P-100", "C-999")).await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let err = repo.create_product(new_product("P-999", "C-100")).await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_appends_every_price() {
        let (repo, _) = seeded().await;

        let update = ProductUpdate {
            name: Some("Martillo".into()),
            prices: vec![
                NewPrice { date: parse_price_date("2024-02-01").unwrap(), value: 11.0 },
                NewPrice { date: parse_price_date("2024-01-01").unwrap(), value: 10.0 },
            ],
            ..Default::default()
        };
        let product = repo.update_product("P-100", update).await.unwrap();

        assert_eq!(product.name, "Martillo");
        let values: Vec<f64> = product.prices.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 11.0]);
    }

    #[tokio::test]
    async fn test_delete_product_removes_prices_and_stock() {
        let (repo, branch) = seeded().await;
        repo.apply_stock_batch(branch.id, &batch(&[("P-100", 5), ("P-200", 1)]))
            .await
            .unwrap();

        repo.delete_product("P-100").await.unwrap();

        assert!(repo.find_product("P-100").await.unwrap().is_none());
        let stock = repo.branch_stock(branch.id).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].product_code, "P-200");

        let err = repo.delete_product("P-100").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

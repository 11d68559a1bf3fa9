use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{InventoryError, InventoryResult};
use crate::models::{
    Branch, BranchStock, NewProduct, ProductUpdate, ProductWithPrices, StockBatch, StockLine,
};
use crate::monitor::{LowStockMonitor, MonitorConfig, MonitorSubscription};
use crate::repository::InventoryRepository;

/// Service layer for stock reconciliation, stock queries and the catalog
pub struct InventoryService<R: InventoryRepository> {
    repository: Arc<R>,
    monitor: LowStockMonitor<R>,
}

impl<R: InventoryRepository> Clone for InventoryService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            monitor: self.monitor.clone(),
        }
    }
}

impl<R: InventoryRepository + 'static> InventoryService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_monitor_config(repository, MonitorConfig::default())
    }

    pub fn with_monitor_config(repository: R, config: MonitorConfig) -> Self {
        let repository = Arc::new(repository);
        Self {
            monitor: LowStockMonitor::new(Arc::clone(&repository), config),
            repository,
        }
    }

    pub fn monitor_config(&self) -> &MonitorConfig {
        self.monitor.config()
    }

    pub async fn list_branches(&self) -> InventoryResult<Vec<Branch>> {
        self.repository.list_branches().await
    }

    pub async fn get_branch(&self, id: i32) -> InventoryResult<Branch> {
        self.repository
            .find_branch(id)
            .await?
            .ok_or(InventoryError::BranchNotFound(id))
    }

    /// Applies the batch atomically and returns the branch's committed stock.
    #[instrument(skip(self, batch), fields(items = batch.len()))]
    pub async fn apply_stock_batch(
        &self,
        branch_id: i32,
        batch: StockBatch,
    ) -> InventoryResult<Vec<StockLine>> {
        self.repository.apply_stock_batch(branch_id, &batch).await?;
        self.repository.branch_stock(branch_id).await
    }

    #[instrument(skip(self))]
    pub async fn branch_stock(&self, branch_id: i32) -> InventoryResult<Vec<StockLine>> {
        self.get_branch(branch_id).await?;
        self.repository.branch_stock(branch_id).await
    }

    #[instrument(skip(self))]
    pub async fn branch_stock_detailed(&self, branch_id: i32) -> InventoryResult<BranchStock> {
        let branch = self.get_branch(branch_id).await?;
        let items = self.repository.branch_stock_detailed(branch_id).await?;
        Ok(BranchStock { branch, items })
    }

    /// Starts a low-stock subscription. Falls back to the configured default threshold.
    pub fn subscribe_low_stock(&self, threshold: Option<i32>) -> MonitorSubscription {
        let threshold = threshold.unwrap_or(self.monitor.config().default_threshold);
        self.monitor.subscribe(threshold)
    }

    #[instrument(skip(self, input), fields(product_code = %input.product_code))]
    pub async fn create_product(&self, input: NewProduct) -> InventoryResult<ProductWithPrices> {
        self.repository.create_product(input).await
    }

    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        product_code: &str,
        update: ProductUpdate,
    ) -> InventoryResult<ProductWithPrices> {
        self.repository.update_product(product_code, update).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_code: &str) -> InventoryResult<()> {
        self.repository.delete_product(product_code).await?;
        info!(product_code, "Product removed from catalog");
        Ok(())
    }

    pub async fn list_products(&self) -> InventoryResult<Vec<ProductWithPrices>> {
        self.repository.list_products().await
    }

    pub async fn get_product(&self, product_code: &str) -> InventoryResult<ProductWithPrices> {
        self.repository
            .find_product(product_code)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StockDelta, StockDetail};
    use crate::repository::MockInventoryRepository;
    use mockall::predicate::eq;

    fn branch(id: i32) -> Branch {
        Branch {
            id,
            name: "Casa Matriz".into(),
            address: "Av. Siempre Viva 123".into(),
        }
    }

    fn batch() -> StockBatch {
        StockBatch::try_from(vec![StockDelta {
            product_code: "P-100".into(),
            quantity: 10,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_batch_returns_committed_stock() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_apply_stock_batch()
            .withf(|branch_id, batch| *branch_id == 1 && batch.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_branch_stock().with(eq(1)).times(1).returning(|_| {
            Ok(vec![StockLine {
                product_code: "P-100".into(),
                name: "Martillo".into(),
                brand: "Stanley".into(),
                quantity: 10,
            }])
        });

        let service = InventoryService::new(repo);
        let stock = service.apply_stock_batch(1, batch()).await.unwrap();

        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_failed_batch_skips_stock_reload() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_apply_stock_batch()
            .returning(|_, _| Err(InventoryError::ProductNotFound("NOPE".into())));
        repo.expect_branch_stock().never();

        let service = InventoryService::new(repo);
        let err = service.apply_stock_batch(1, batch()).await.unwrap_err();

        assert!(matches!(err, InventoryError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_branch_stock_requires_existing_branch() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_find_branch().with(eq(42)).returning(|_| Ok(None));
        repo.expect_branch_stock().never();

        let service = InventoryService::new(repo);
        let err = service.branch_stock(42).await.unwrap_err();

        assert!(matches!(err, InventoryError::BranchNotFound(42)));
    }

    #[tokio::test]
    async fn test_empty_branch_returns_empty_stock() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_find_branch().returning(|id| Ok(Some(branch(id))));
        repo.expect_branch_stock_detailed()
            .returning(|_| Ok(Vec::<StockDetail>::new()));

        let service = InventoryService::new(repo);
        let stock = service.branch_stock_detailed(2).await.unwrap();

        assert_eq!(stock.branch.id, 2);
        assert!(stock.items.is_empty());
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_find_product().returning(|_| Ok(None));

        let service = InventoryService::new(repo);
        let err = service.get_product("P-404").await.unwrap_err();

        assert!(matches!(err, InventoryError::ProductNotFound(code) if code == "P-404"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_uses_default_threshold() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_low_stock().with(eq(8)).returning(|_| Ok(vec![]));

        let service = InventoryService::with_monitor_config(
            repo,
            MonitorConfig {
                default_threshold: 8,
                ..Default::default()
            },
        );
        let mut sub = service.subscribe_low_stock(None);

        assert!(matches!(
            sub.recv().await,
            Some(crate::monitor::MonitorEvent::Connected { threshold: 8, .. })
        ));
        assert_eq!(sub.recv().await.map(|e| e.kind()), Some("scan_summary"));
    }
}

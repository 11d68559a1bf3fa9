//! Low-stock monitor.
//!
//! Each subscriber gets its own polling task. The task walks a small state
//! machine and pushes [`MonitorEvent`]s into a bounded channel:
//!
//! ```text
//!  Connecting ──► Polling ──► Waiting ──┐
//!                    ▲                  │ poll_interval elapsed
//!                    └──────────────────┘
//!        any state ──► Terminated   (cancel, receiver gone, storage error)
//! ```
//!
//! Dropping the [`MonitorSubscription`] signals cancellation; the task exits at
//! its next suspension point.

use chrono::{DateTime, Utc};
use core_config::{ConfigError, FromEnv, parse_env_or};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::LowStockRow;
use crate::repository::InventoryRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub default_threshold: i32,
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            default_threshold: 5,
            channel_capacity: 16,
        }
    }
}

impl FromEnv for MonitorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs: u64 = parse_env_or("STOCK_MONITOR_INTERVAL_SECS", 10)?;
        if interval_secs == 0 {
            return Err(ConfigError::ParseError {
                key: "STOCK_MONITOR_INTERVAL_SECS".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        let channel_capacity: usize = parse_env_or("STOCK_MONITOR_CHANNEL_CAPACITY", 16)?;
        if channel_capacity == 0 {
            return Err(ConfigError::ParseError {
                key: "STOCK_MONITOR_CHANNEL_CAPACITY".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            poll_interval: Duration::from_secs(interval_secs),
            default_threshold: parse_env_or("STOCK_ALERT_DEFAULT_THRESHOLD", 5)?,
            channel_capacity,
        })
    }
}

/// Event pushed to a subscriber. Serialized with a `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Connected {
        message: String,
        threshold: i32,
    },
    ScanSummary {
        message: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    LowStockAlert {
        message: String,
        product_name: String,
        product_code: String,
        branch_name: String,
        quantity: i32,
        timestamp: DateTime<Utc>,
    },
    NoLowStock {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    fn connected(threshold: i32) -> Self {
        MonitorEvent::Connected {
            message: format!("Conectado al monitor de stock (umbral: {threshold})"),
            threshold,
        }
    }

    fn scan_summary(count: usize) -> Self {
        MonitorEvent::ScanSummary {
            message: format!("Se encontraron {count} productos con stock bajo"),
            count,
            timestamp: Utc::now(),
        }
    }

    fn alert(row: LowStockRow) -> Self {
        MonitorEvent::LowStockAlert {
            message: format!(
                "Stock bajo: {} ({}) en {} con {} unidades",
                row.product_name, row.product_code, row.branch_name, row.quantity
            ),
            product_name: row.product_name,
            product_code: row.product_code,
            branch_name: row.branch_name,
            quantity: row.quantity,
            timestamp: Utc::now(),
        }
    }

    fn no_low_stock() -> Self {
        MonitorEvent::NoLowStock {
            message: "No hay productos con stock bajo".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn heartbeat() -> Self {
        MonitorEvent::Heartbeat {
            message: "Monitor activo".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn error() -> Self {
        MonitorEvent::Error {
            message: "Error al consultar el stock".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Value of the `type` tag on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::Connected { .. } => "connected",
            MonitorEvent::ScanSummary { .. } => "scan_summary",
            MonitorEvent::LowStockAlert { .. } => "low_stock_alert",
            MonitorEvent::NoLowStock { .. } => "no_low_stock",
            MonitorEvent::Heartbeat { .. } => "heartbeat",
            MonitorEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Connecting,
    Polling,
    Waiting,
    Terminated,
}

/// Spawns one polling task per subscriber.
pub struct LowStockMonitor<R: InventoryRepository> {
    repository: Arc<R>,
    config: MonitorConfig,
}

impl<R: InventoryRepository> Clone for LowStockMonitor<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            config: self.config.clone(),
        }
    }
}

impl<R: InventoryRepository + 'static> LowStockMonitor<R> {
    pub fn new(repository: Arc<R>, config: MonitorConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, threshold: i32) -> MonitorSubscription {
        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let task = MonitorTask {
            repository: Arc::clone(&self.repository),
            threshold,
            poll_interval: self.config.poll_interval,
            events: events_tx,
            cancel: cancel_rx,
        };

        info!(threshold, "Low-stock monitor subscribed");

        MonitorSubscription {
            events: events_rx,
            cancel: cancel_tx,
            task: tokio::spawn(task.run()),
        }
    }
}

/// Receiving end of a monitor. Cancels its task when dropped.
pub struct MonitorSubscription {
    events: mpsc::Receiver<MonitorEvent>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorSubscription {
    /// Next event, or `None` once the task has terminated and the buffer is drained.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for MonitorSubscription {
    type Item = MonitorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for MonitorSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct MonitorTask<R: InventoryRepository> {
    repository: Arc<R>,
    threshold: i32,
    poll_interval: Duration,
    events: mpsc::Sender<MonitorEvent>,
    cancel: watch::Receiver<bool>,
}

impl<R: InventoryRepository> MonitorTask<R> {
    async fn run(mut self) {
        let mut state = MonitorState::Connecting;

        while state != MonitorState::Terminated {
            state = match state {
                MonitorState::Connecting => {
                    if self.emit(MonitorEvent::connected(self.threshold)).await {
                        MonitorState::Polling
                    } else {
                        MonitorState::Terminated
                    }
                }
                MonitorState::Polling => self.poll().await,
                MonitorState::Waiting => self.wait().await,
                MonitorState::Terminated => MonitorState::Terminated,
            };
        }

        info!(threshold = self.threshold, "Low-stock monitor stopped");
    }

    /// Sends one event unless cancelled first. Returns false when the
    /// subscription is gone.
    async fn emit(&mut self, event: MonitorEvent) -> bool {
        if *self.cancel.borrow() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.changed() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    async fn poll(&mut self) -> MonitorState {
        let scan = tokio::select! {
            biased;
            _ = self.cancel.changed() => return MonitorState::Terminated,
            rows = self.repository.low_stock(self.threshold) => rows,
        };

        let rows = match scan {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, threshold = self.threshold, "Low-stock scan failed, closing subscription");
                self.emit(MonitorEvent::error()).await;
                return MonitorState::Terminated;
            }
        };

        debug!(threshold = self.threshold, count = rows.len(), "Low-stock scan completed");

        let mut batch = Vec::with_capacity(rows.len() + 3);
        batch.push(MonitorEvent::scan_summary(rows.len()));
        if rows.is_empty() {
            batch.push(MonitorEvent::no_low_stock());
        } else {
            batch.extend(rows.into_iter().map(MonitorEvent::alert));
        }
        batch.push(MonitorEvent::heartbeat());

        for event in batch {
            if !self.emit(event).await {
                return MonitorState::Terminated;
            }
        }

        MonitorState::Waiting
    }

    async fn wait(&mut self) -> MonitorState {
        tokio::select! {
            biased;
            _ = self.cancel.changed() => MonitorState::Terminated,
            _ = self.events.closed() => MonitorState::Terminated,
            _ = tokio::time::sleep(self.poll_interval) => MonitorState::Polling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;
    use crate::models::{NewProduct, StockBatch, StockDelta};
    use crate::repository::{InMemoryInventoryRepository, MockInventoryRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_secs(10);

    fn config() -> MonitorConfig {
        MonitorConfig {
            poll_interval: INTERVAL,
            ..Default::default()
        }
    }

    async fn repo_with_stock(quantity: i32) -> InMemoryInventoryRepository {
        let repo = InMemoryInventoryRepository::new();
        let branch = repo.add_branch("Casa Matriz", "Av. Siempre Viva 123").await;
        repo.create_product(NewProduct {
            product_code: "P-100".into(),
            brand: "Stanley".into(),
            code: "STN-100".into(),
            name: "Martillo".into(),
            prices: vec![],
        })
        .await
        .unwrap();
        let batch = StockBatch::try_from(vec![StockDelta {
            product_code: "P-100".into(),
            quantity,
        }])
        .unwrap();
        repo.apply_stock_batch(branch.id, &batch).await.unwrap();
        repo
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_reports_low_stock_row() {
        let monitor = LowStockMonitor::new(Arc::new(repo_with_stock(3).await), config());
        let mut sub = monitor.subscribe(5);

        assert!(matches!(
            sub.recv().await,
            Some(MonitorEvent::Connected { threshold: 5, .. })
        ));
        assert!(matches!(
            sub.recv().await,
            Some(MonitorEvent::ScanSummary { count: 1, .. })
        ));
        match sub.recv().await {
            Some(MonitorEvent::LowStockAlert {
                product_code,
                branch_name,
                quantity,
                ..
            }) => {
                assert_eq!(product_code, "P-100");
                assert_eq!(branch_name, "Casa Matriz");
                assert_eq!(quantity, 3);
            }
            other => panic!("expected alert, got {other:?}"),
        }
        assert!(matches!(sub.recv().await, Some(MonitorEvent::Heartbeat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_store_repeats_every_interval() {
        let monitor = LowStockMonitor::new(Arc::new(repo_with_stock(50).await), config());
        let mut sub = monitor.subscribe(5);

        assert_eq!(sub.recv().await.map(|e| e.kind()), Some("connected"));

        for _ in 0..3 {
            let started = tokio::time::Instant::now();
            let kinds: Vec<_> = [
                sub.recv().await,
                sub.recv().await,
                sub.recv().await,
            ]
            .into_iter()
            .map(|e| e.map(|e| e.kind()))
            .collect();
            assert_eq!(
                kinds,
                vec![Some("scan_summary"), Some("no_low_stock"), Some("heartbeat")]
            );
            assert!(started.elapsed() <= INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_error_emits_error_and_ends_stream() {
        let mut repo = MockInventoryRepository::new();
        repo.expect_low_stock()
            .times(1)
            .returning(|_| Err(InventoryError::Storage("connection refused".into())));

        let monitor = LowStockMonitor::new(Arc::new(repo), config());
        let mut sub = monitor.subscribe(5);

        assert_eq!(sub.recv().await.map(|e| e.kind()), Some("connected"));
        match sub.recv().await {
            Some(MonitorEvent::Error { message, .. }) => {
                assert!(!message.contains("connection refused"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling_within_one_interval() {
        let scans = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&scans);

        let mut repo = MockInventoryRepository::new();
        repo.expect_low_stock().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });

        let monitor = LowStockMonitor::new(Arc::new(repo), config());
        let mut sub = monitor.subscribe(5);
        for _ in 0..4 {
            sub.recv().await;
        }

        sub.cancel();
        let drained = tokio::time::timeout(INTERVAL, async {
            while sub.recv().await.is_some() {}
        })
        .await;

        assert!(drained.is_ok(), "task should stop before the next poll");
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_subscription_cancels_task() {
        let scans = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&scans);

        let mut repo = MockInventoryRepository::new();
        repo.expect_low_stock().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });

        let monitor = LowStockMonitor::new(Arc::new(repo), config());
        let mut sub = monitor.subscribe(5);
        sub.recv().await;
        sub.recv().await;
        drop(sub);

        tokio::time::sleep(INTERVAL * 5).await;
        assert!(scans.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn test_event_wire_format() {
        let event = MonitorEvent::connected(7);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "type": "connected",
                "message": "Conectado al monitor de stock (umbral: 7)",
                "threshold": 7
            })
        );

        let value = serde_json::to_value(MonitorEvent::heartbeat()).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_monitor_config_from_env() {
        temp_env::with_vars(
            [
                ("STOCK_MONITOR_INTERVAL_SECS", None::<&str>),
                ("STOCK_ALERT_DEFAULT_THRESHOLD", None),
                ("STOCK_MONITOR_CHANNEL_CAPACITY", None),
            ],
            || {
                assert_eq!(MonitorConfig::from_env().unwrap(), MonitorConfig::default());
            },
        );

        temp_env::with_vars(
            [
                ("STOCK_MONITOR_INTERVAL_SECS", Some("2")),
                ("STOCK_ALERT_DEFAULT_THRESHOLD", Some("12")),
                ("STOCK_MONITOR_CHANNEL_CAPACITY", Some("4")),
            ],
            || {
                let config = MonitorConfig::from_env().unwrap();
                assert_eq!(config.poll_interval, Duration::from_secs(2));
                assert_eq!(config.default_threshold, 12);
                assert_eq!(config.channel_capacity, 4);
            },
        );
    }

    #[test]
    fn test_monitor_config_rejects_zero_interval() {
        temp_env::with_var("STOCK_MONITOR_INTERVAL_SECS", Some("0"), || {
            assert!(MonitorConfig::from_env().is_err());
        });
    }
}

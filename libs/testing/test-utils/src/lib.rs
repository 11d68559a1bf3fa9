//! Shared test utilities for the inventory crates
//!
//! - `TestDatabase`: PostgreSQL container with the SeaORM migrations applied
//! - `TestDataBuilder`: deterministic, collision-free product codes per test
//! - `assertions`: small assertion helpers
//!
//! ```rust,ignore
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let product_code = builder.product_code("drill");
//! }
//! ```

mod postgres;

pub use postgres::TestDatabase;

/// Deterministic test data keyed on the test name.
///
/// Tests share one database schema per container, so codes carry the seed to
/// stay unique across tests.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_add_stock");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Value for `"Código del producto"`, at most 50 characters
    pub fn product_code(&self, suffix: &str) -> String {
        format!("P-{:08x}-{suffix}", self.seed as u32)
    }

    /// Value for `"Código"`, the supplier code
    pub fn supplier_code(&self, suffix: &str) -> String {
        format!("S-{:08x}-{suffix}", self.seed as u32)
    }
}

pub mod assertions {
    /// Unwraps `Some`, panicking with `context` otherwise
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let a = TestDataBuilder::new(42);
        let b = TestDataBuilder::new(42);

        assert_eq!(a.product_code("x"), b.product_code("x"));
        assert_eq!(a.supplier_code("x"), b.supplier_code("x"));
    }

    #[test]
    fn test_different_names_give_different_codes() {
        let a = TestDataBuilder::from_test_name("test1");
        let b = TestDataBuilder::from_test_name("test2");

        assert_ne!(a.product_code("main"), b.product_code("main"));
    }

    #[test]
    fn test_codes_fit_column_width() {
        let builder = TestDataBuilder::new(u64::MAX);
        assert!(builder.product_code("a-fairly-long-suffix").len() <= 50);
    }
}

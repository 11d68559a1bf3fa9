//! SeaORM entities for the inventory tables.

pub mod branch;
pub mod price;
pub mod product;
pub mod stock;

pub mod prelude {
    pub use super::branch::Entity as Branches;
    pub use super::price::Entity as Prices;
    pub use super::product::Entity as Products;
    pub use super::stock::Entity as Stock;
}

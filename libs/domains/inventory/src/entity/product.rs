use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub product_code: String,
    pub brand: String,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price::Entity")]
    Price,
    #[sea_orm(has_many = "super::stock::Entity")]
    Stock,
}

impl Related<super::price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Price.def()
    }
}

impl Related<super::stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Product {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            product_code: model.product_code,
            brand: model.brand,
            code: model.code,
            name: model.name,
        }
    }
}

impl From<&crate::models::NewProduct> for ActiveModel {
    fn from(input: &crate::models::NewProduct) -> Self {
        Self {
            product_code: Set(input.product_code.clone()),
            brand: Set(input.brand.clone()),
            code: Set(input.code.clone()),
            name: Set(input.name.clone()),
            ..Default::default()
        }
    }
}

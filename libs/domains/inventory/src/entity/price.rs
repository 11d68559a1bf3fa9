use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub date: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Double")]
    pub value: f64,
    pub product_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::PricePoint {
    fn from(model: Model) -> Self {
        Self {
            date: model.date.to_utc(),
            value: model.value,
        }
    }
}

impl ActiveModel {
    pub fn for_product(product_id: i32, price: &crate::models::NewPrice) -> Self {
        Self {
            product_id: Set(product_id),
            date: Set(price.date.fixed_offset()),
            value: Set(price.value),
            ..Default::default()
        }
    }
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{InventoryError, InventoryResult};

pub const FIELD_PRODUCT_CODE: &str = "Código del producto";
pub const FIELD_QUANTITY: &str = "Cantidad";
pub const FIELD_BRAND: &str = "Marca";
pub const FIELD_CODE: &str = "Código";
pub const FIELD_NAME: &str = "Nombre";
pub const FIELD_PRICES: &str = "Precio";

/// A physical store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Branch {
    pub id: i32,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Dirección")]
    pub address: String,
}

/// Branch header embedded in stock listings.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BranchInfo {
    pub id: i32,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
}

impl From<Branch> for BranchInfo {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            name: branch.name,
            address: branch.address,
        }
    }
}

/// Catalog product without its price history.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i32,
    pub product_code: String,
    pub brand: String,
    pub code: String,
    pub name: String,
}

/// One entry of a product's price history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PricePoint {
    #[serde(rename = "Fecha")]
    pub date: DateTime<Utc>,
    #[serde(rename = "Valor")]
    pub value: f64,
}

/// Product together with its chronological price history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductWithPrices {
    #[serde(skip)]
    pub id: i32,
    #[serde(rename = "Código del producto")]
    pub product_code: String,
    #[serde(rename = "Marca")]
    pub brand: String,
    #[serde(rename = "Código")]
    pub code: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Precio")]
    pub prices: Vec<PricePoint>,
}

impl ProductWithPrices {
    pub fn new(product: Product, prices: Vec<PricePoint>) -> Self {
        Self {
            id: product.id,
            product_code: product.product_code,
            brand: product.brand,
            code: product.code,
            name: product.name,
            prices,
        }
    }

    /// Most recent price by date, if any.
    pub fn current_price(&self) -> Option<&PricePoint> {
        self.prices.iter().max_by_key(|p| p.date)
    }
}

/// Flat stock projection for a branch.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockLine {
    #[serde(rename = "Código del producto")]
    pub product_code: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Marca")]
    pub brand: String,
    #[serde(rename = "Cantidad")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct StockQuantity {
    #[serde(rename = "Cantidad")]
    pub quantity: i32,
}

/// Stock projection carrying the product's full price history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockDetail {
    #[serde(rename = "producto")]
    pub product: ProductWithPrices,
    #[serde(rename = "stock")]
    pub stock: StockQuantity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchStock {
    pub branch: Branch,
    pub items: Vec<StockDetail>,
}

/// A stock row below the alert threshold, joined with product and branch.
#[derive(Debug, Clone, PartialEq)]
pub struct LowStockRow {
    pub branch_id: i32,
    pub branch_name: String,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// Stock batch input
// ---------------------------------------------------------------------------

/// Raw item of an add-stock request body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StockItemInput {
    #[serde(rename = "Código del producto")]
    pub product_code: Option<String>,
    #[serde(rename = "Cantidad")]
    #[schema(value_type = Option<i64>)]
    pub quantity: Option<Value>,
}

/// A validated positive stock increment for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDelta {
    pub product_code: String,
    pub quantity: i32,
}

/// Non-empty, fully validated add-stock batch.
///
/// Quantities are increments: applying the same batch twice adds twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockBatch(Vec<StockDelta>);

impl StockBatch {
    pub fn items(&self) -> &[StockDelta] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<StockItemInput>> for StockBatch {
    type Error = InventoryError;

    fn try_from(items: Vec<StockItemInput>) -> InventoryResult<Self> {
        if items.is_empty() {
            return Err(InventoryError::Validation(
                "Se debe enviar una lista de productos".to_string(),
            ));
        }

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| parse_stock_item(index + 1, item))
            .collect::<InventoryResult<Vec<_>>>()
            .map(StockBatch)
    }
}

impl TryFrom<Vec<StockDelta>> for StockBatch {
    type Error = InventoryError;

    fn try_from(items: Vec<StockDelta>) -> InventoryResult<Self> {
        if items.is_empty() {
            return Err(InventoryError::Validation(
                "Se debe enviar una lista de productos".to_string(),
            ));
        }
        if let Some(bad) = items.iter().find(|d| d.quantity <= 0) {
            return Err(InventoryError::Validation(format!(
                "Cantidad inválida para el producto {}",
                bad.product_code
            )));
        }
        Ok(StockBatch(items))
    }
}

fn parse_stock_item(position: usize, item: StockItemInput) -> InventoryResult<StockDelta> {
    let product_code = item
        .product_code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());

    let (Some(product_code), Some(raw_quantity)) = (product_code, item.quantity) else {
        return Err(InventoryError::Validation(format!(
            "Faltan campos requeridos en el elemento {position}: se requieren '{FIELD_PRODUCT_CODE}' y '{FIELD_QUANTITY}'"
        )));
    };

    let quantity = parse_quantity(&raw_quantity).map_err(|reason| {
        InventoryError::Validation(format!(
            "Cantidad inválida para el producto {product_code}: {reason}"
        ))
    })?;

    Ok(StockDelta {
        product_code,
        quantity,
    })
}

/// Accepts JSON integers and integer strings; the result must be in `1..=i32::MAX`.
fn parse_quantity(value: &Value) -> Result<i32, &'static str> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().ok_or("debe ser un número entero")?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| "debe ser un número entero")?,
        _ => return Err("debe ser un número entero"),
    };

    if parsed <= 0 {
        return Err("debe ser mayor que cero");
    }
    i32::try_from(parsed).map_err(|_| "excede el máximo permitido")
}

// ---------------------------------------------------------------------------
// Catalog input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PriceInput {
    #[serde(rename = "Fecha")]
    pub date: Option<String>,
    #[serde(rename = "Valor")]
    #[schema(value_type = Option<f64>)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrice {
    pub date: DateTime<Utc>,
    pub value: f64,
}

/// Raw body of `POST /products/add`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateProductInput {
    #[serde(rename = "Código del producto")]
    pub product_code: Option<String>,
    #[serde(rename = "Marca")]
    pub brand: Option<String>,
    #[serde(rename = "Código")]
    pub code: Option<String>,
    #[serde(rename = "Nombre")]
    pub name: Option<String>,
    #[serde(rename = "Precio")]
    pub prices: Option<Vec<PriceInput>>,
}

/// Raw body of `PUT /products/update/{code}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProductInput {
    #[serde(rename = "Marca")]
    pub brand: Option<String>,
    #[serde(rename = "Código")]
    pub code: Option<String>,
    #[serde(rename = "Nombre")]
    pub name: Option<String>,
    #[serde(rename = "Precio")]
    pub prices: Option<Vec<PriceInput>>,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 50))]
    pub product_code: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub prices: Vec<NewPrice>,
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub prices: Vec<NewPrice>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.code.is_none() && self.name.is_none() && self.prices.is_empty()
    }
}

impl TryFrom<CreateProductInput> for NewProduct {
    type Error = InventoryError;

    fn try_from(input: CreateProductInput) -> InventoryResult<Self> {
        let mut missing = Vec::new();
        if input.product_code.is_none() {
            missing.push(FIELD_PRODUCT_CODE);
        }
        if input.brand.is_none() {
            missing.push(FIELD_BRAND);
        }
        if input.code.is_none() {
            missing.push(FIELD_CODE);
        }
        if input.name.is_none() {
            missing.push(FIELD_NAME);
        }
        if input.prices.is_none() {
            missing.push(FIELD_PRICES);
        }

        let (Some(product_code), Some(brand), Some(code), Some(name), Some(prices)) = (
            input.product_code,
            input.brand,
            input.code,
            input.name,
            input.prices,
        ) else {
            return Err(InventoryError::MissingFields(missing));
        };

        let product = NewProduct {
            product_code: product_code.trim().to_string(),
            brand: brand.trim().to_string(),
            code: code.trim().to_string(),
            name: name.trim().to_string(),
            prices: parse_prices(prices)?,
        };
        product.validate()?;
        Ok(product)
    }
}

impl TryFrom<UpdateProductInput> for ProductUpdate {
    type Error = InventoryError;

    fn try_from(input: UpdateProductInput) -> InventoryResult<Self> {
        let update = ProductUpdate {
            brand: input.brand.map(|s| s.trim().to_string()),
            code: input.code.map(|s| s.trim().to_string()),
            name: input.name.map(|s| s.trim().to_string()),
            prices: parse_prices(input.prices.unwrap_or_default())?,
        };

        if update.is_empty() {
            return Err(InventoryError::Validation(
                "No se enviaron datos para actualizar el producto".to_string(),
            ));
        }
        update.validate()?;
        Ok(update)
    }
}

fn parse_prices(prices: Vec<PriceInput>) -> InventoryResult<Vec<NewPrice>> {
    prices
        .into_iter()
        .map(|price| {
            let (Some(date), Some(value)) = (price.date, price.value) else {
                return Err(InventoryError::Validation(
                    "Formato de precio incorrecto: cada precio debe tener Fecha y Valor"
                        .to_string(),
                ));
            };

            let date = parse_price_date(&date).ok_or_else(|| {
                InventoryError::Validation(format!("Fecha de precio inválida: {date}"))
            })?;

            let value = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| {
                InventoryError::Validation(format!("Valor de precio inválido: {value}"))
            })?;

            Ok(NewPrice { date, value })
        })
        .collect()
}

/// Parses ISO-8601 dates as sent by clients: RFC 3339, naive date-time, or plain date (UTC midnight).
pub fn parse_price_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

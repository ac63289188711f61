use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Standard,
    Deep,
    MoveIn,
    MoveOut,
    AddOn,
}

/// Catalog entry a booking line item is priced from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub category: ServiceCategory,
    pub base_price: Decimal,
    pub price_per_sqft: Decimal,
    pub duration_minutes: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeDetails {
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub square_footage: u32,
    pub floors: u32,
    #[serde(default)]
    pub pets: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_instructions: Option<String>,
}

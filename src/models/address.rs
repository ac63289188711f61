use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub label: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub location: GeoPoint,
}

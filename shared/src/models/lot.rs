//! Inventory lot models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{not_blank, positive_decimal};

/// A discrete quantity of processed fiber awaiting sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryLot {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub variety: String,
    pub grade: String,
    pub quantity_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub location: String,
    /// Delivery currently holding the claim on this lot
    pub claimed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl InventoryLot {
    /// Build a lot from an intake record
    pub fn from_intake(producer_id: Uuid, input: RegisterLotInput, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            producer_id,
            variety: input.variety.trim().to_string(),
            grade: input.grade.trim().to_string(),
            quantity_kg: input.quantity_kg,
            harvest_date: input.harvest_date,
            location: input.location.trim().to_string(),
            claimed_by: None,
            created_at: now,
        }
    }

    /// Whether the lot is still an allocation candidate
    pub fn is_available(&self) -> bool {
        self.claimed_by.is_none()
    }
}

/// Harvest/processing intake of a new lot
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterLotInput {
    #[validate(length(max = 100), custom = "not_blank")]
    pub variety: String,
    #[validate(length(max = 50), custom = "not_blank")]
    pub grade: String,
    #[validate(custom = "positive_decimal")]
    pub quantity_kg: Decimal,
    pub harvest_date: NaiveDate,
    #[validate(length(max = 200), custom = "not_blank")]
    pub location: String,
}

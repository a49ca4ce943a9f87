//! Delivery models

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{InventoryLot, PaymentMethod};
use crate::validation::{
    contact_number, non_negative_decimal, not_blank, positive_decimal, FieldError,
};

/// Payment state assigned to every new delivery
pub const DEFAULT_PAYMENT_STATUS: PaymentStatus = PaymentStatus::Unpaid;

/// Lifecycle status of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Allocation confirmed, fiber on its way
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Cancelled)
    }

    /// Field edits and deletion are only allowed in transit
    pub fn is_editable(&self) -> bool {
        matches!(self, DeliveryStatus::InTransit)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::InTransit => write!(f, "In Transit"),
            DeliveryStatus::Delivered => write!(f, "Delivered"),
            DeliveryStatus::Completed => write!(f, "Completed"),
            DeliveryStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_transit" => Ok(DeliveryStatus::InTransit),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "completed" => Ok(DeliveryStatus::Completed),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            other => Err(format!("unknown delivery status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// How the fiber reaches the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Buyer collects at the pickup location
    Pickup,
    FarmerDelivery,
    Courier,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::FarmerDelivery => "farmer_delivery",
            DeliveryMethod::Courier => "courier",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryMethod::Pickup),
            "farmer_delivery" => Ok(DeliveryMethod::FarmerDelivery),
            "courier" => Ok(DeliveryMethod::Courier),
            other => Err(format!("unknown delivery method '{}'", other)),
        }
    }
}

/// A tracked shipment of one claimed lot to a buyer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub buyer_id: Uuid,
    pub lot_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub variety: String,
    pub grade: String,
    pub quantity_kg: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub producer_contact: String,
    pub buyer_contact: String,
    pub delivery_method: DeliveryMethod,
    pub status: DeliveryStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Draft the delivery that will claim `lot`. Variety and grade come from the lot.
    pub fn allocate(
        producer_id: Uuid,
        lot: &InventoryLot,
        input: CreateDeliveryInput,
        now: DateTime<Utc>,
    ) -> Result<Self, FieldError> {
        let total_amount = line_total(input.quantity_kg, input.unit_price)?;
        Ok(Self {
            id: Uuid::new_v4(),
            producer_id,
            buyer_id: input.buyer_id,
            lot_id: lot.id,
            scheduled_date: input.scheduled_date,
            scheduled_time: input.scheduled_time,
            variety: lot.variety.clone(),
            grade: lot.grade.clone(),
            quantity_kg: input.quantity_kg,
            unit_price: input.unit_price,
            total_amount,
            pickup_location: input.pickup_location.trim().to_string(),
            dropoff_location: input.dropoff_location.trim().to_string(),
            producer_contact: input.producer_contact.trim().to_string(),
            buyer_contact: input.buyer_contact.trim().to_string(),
            delivery_method: input.delivery_method,
            status: DeliveryStatus::InTransit,
            payment_status: DEFAULT_PAYMENT_STATUS,
            payment_method: input.payment_method,
            notes: input.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a field edit, keeping the total in step with quantity and price.
    /// Nothing changes when the new total is out of range.
    pub fn apply_changes(
        &mut self,
        changes: UpdateDeliveryInput,
        now: DateTime<Utc>,
    ) -> Result<(), FieldError> {
        let total_amount = line_total(
            changes.quantity_kg.unwrap_or(self.quantity_kg),
            changes.unit_price.unwrap_or(self.unit_price),
        )?;
        if let Some(date) = changes.scheduled_date {
            self.scheduled_date = date;
        }
        if let Some(time) = changes.scheduled_time {
            self.scheduled_time = time;
        }
        if let Some(quantity) = changes.quantity_kg {
            self.quantity_kg = quantity;
        }
        if let Some(price) = changes.unit_price {
            self.unit_price = price;
        }
        if let Some(location) = changes.pickup_location {
            self.pickup_location = location.trim().to_string();
        }
        if let Some(location) = changes.dropoff_location {
            self.dropoff_location = location.trim().to_string();
        }
        if let Some(contact) = changes.producer_contact {
            self.producer_contact = contact.trim().to_string();
        }
        if let Some(contact) = changes.buyer_contact {
            self.buyer_contact = contact.trim().to_string();
        }
        if let Some(method) = changes.delivery_method {
            self.delivery_method = method;
        }
        if let Some(status) = changes.payment_status {
            self.payment_status = status;
        }
        if let Some(method) = changes.payment_method {
            self.payment_method = method;
        }
        if let Some(notes) = changes.notes {
            self.notes = Some(notes);
        }
        self.total_amount = total_amount;
        self.updated_at = now;
        Ok(())
    }
}

fn line_total(quantity_kg: Decimal, unit_price: Decimal) -> Result<Decimal, FieldError> {
    quantity_kg
        .checked_mul(unit_price)
        .ok_or_else(|| FieldError::new("unit_price", "amount out of range"))
}

/// Body of a delivery request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateDeliveryInput {
    pub lot_id: Uuid,
    pub buyer_id: Uuid,
    #[validate(custom = "positive_decimal")]
    pub quantity_kg: Decimal,
    #[validate(custom = "non_negative_decimal")]
    pub unit_price: Decimal,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[validate(length(max = 200), custom = "not_blank")]
    pub pickup_location: String,
    #[validate(length(max = 200), custom = "not_blank")]
    pub dropoff_location: String,
    #[validate(custom = "contact_number")]
    pub producer_contact: String,
    #[validate(custom = "contact_number")]
    pub buyer_contact: String,
    pub delivery_method: DeliveryMethod,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Partial edit of an in-transit delivery
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeliveryInput {
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    #[validate(custom = "positive_decimal")]
    pub quantity_kg: Option<Decimal>,
    #[validate(custom = "non_negative_decimal")]
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 200), custom = "not_blank")]
    pub pickup_location: Option<String>,
    #[validate(length(max = 200), custom = "not_blank")]
    pub dropoff_location: Option<String>,
    #[validate(custom = "contact_number")]
    pub producer_contact: Option<String>,
    #[validate(custom = "contact_number")]
    pub buyer_contact: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl UpdateDeliveryInput {
    pub fn is_empty(&self) -> bool {
        self.scheduled_date.is_none()
            && self.scheduled_time.is_none()
            && self.quantity_kg.is_none()
            && self.unit_price.is_none()
            && self.pickup_location.is_none()
            && self.dropoff_location.is_none()
            && self.producer_contact.is_none()
            && self.buyer_contact.is_none()
            && self.delivery_method.is_none()
            && self.payment_status.is_none()
            && self.payment_method.is_none()
            && self.notes.is_none()
    }
}

/// Body of a cancellation request. The reason is checked by the workflow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelDeliveryInput {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot() -> InventoryLot {
        InventoryLot {
            id: Uuid::new_v4(),
            producer_id: Uuid::new_v4(),
            variety: "Tangongon".to_string(),
            grade: "S-S2".to_string(),
            quantity_kg: Decimal::from(500),
            harvest_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            location: "Warehouse 3".to_string(),
            claimed_by: None,
            created_at: Utc::now(),
        }
    }

    fn input(lot_id: Uuid) -> CreateDeliveryInput {
        CreateDeliveryInput {
            lot_id,
            buyer_id: Uuid::new_v4(),
            quantity_kg: Decimal::from(120),
            unit_price: Decimal::new(8550, 2),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            pickup_location: "Barangay hall".to_string(),
            dropoff_location: "Buyer depot".to_string(),
            producer_contact: "0917 123 4567".to_string(),
            buyer_contact: "+63 2 8123 4567".to_string(),
            delivery_method: DeliveryMethod::Pickup,
            payment_method: PaymentMethod::BankTransfer,
            notes: None,
        }
    }

    #[test]
    fn test_allocate_copies_lot_and_computes_total() {
        let lot = lot();
        let delivery =
            Delivery::allocate(lot.producer_id, &lot, input(lot.id), Utc::now()).unwrap();

        assert_eq!(delivery.lot_id, lot.id);
        assert_eq!(delivery.variety, "Tangongon");
        assert_eq!(delivery.grade, "S-S2");
        assert_eq!(delivery.status, DeliveryStatus::InTransit);
        assert_eq!(delivery.payment_status, PaymentStatus::Unpaid);
        assert_eq!(delivery.total_amount, Decimal::from(10260));
    }

    #[test]
    fn test_apply_changes_recomputes_total() {
        let lot = lot();
        let mut delivery =
            Delivery::allocate(lot.producer_id, &lot, input(lot.id), Utc::now()).unwrap();
        delivery
            .apply_changes(
                UpdateDeliveryInput {
                    quantity_kg: Some(Decimal::from(100)),
                    payment_status: Some(PaymentStatus::Partial),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(delivery.quantity_kg, Decimal::from(100));
        assert_eq!(delivery.total_amount, Decimal::from(8550));
        assert_eq!(delivery.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_oversized_total_is_refused() {
        let lot = lot();
        let mut huge = input(lot.id);
        huge.quantity_kg = Decimal::from(50);
        huge.unit_price = Decimal::MAX;
        let err = Delivery::allocate(lot.producer_id, &lot, huge.clone(), Utc::now()).unwrap_err();
        assert_eq!(err.field, "unit_price");
        assert!(huge.validate().is_err());

        let mut delivery =
            Delivery::allocate(lot.producer_id, &lot, input(lot.id), Utc::now()).unwrap();
        let before = delivery.clone();
        let result = delivery.apply_changes(
            UpdateDeliveryInput {
                quantity_kg: Some(Decimal::from(100)),
                unit_price: Some(Decimal::MAX),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
        assert_eq!(delivery.quantity_kg, before.quantity_kg);
        assert_eq!(delivery.total_amount, before.total_amount);
    }

    #[test]
    fn test_bad_contact_fails_validation() {
        let mut input = input(Uuid::new_v4());
        input.buyer_contact = "call me".to_string();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("buyer_contact"));
    }

    #[test]
    fn test_editable_only_in_transit() {
        assert!(DeliveryStatus::InTransit.is_editable());
        assert!(!DeliveryStatus::Delivered.is_editable());
        assert!(!DeliveryStatus::Completed.is_editable());
        assert!(!DeliveryStatus::Cancelled.is_editable());
    }
}

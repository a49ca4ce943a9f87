//! Delivery service: lot allocation and the delivery lifecycle

use std::sync::Arc;

use chrono::Utc;
use shared::{
    advance_delivery, Actor, CancelDeliveryInput, CreateDeliveryInput, Delivery, DeliveryAction,
    DeliveryStatus, UpdateDeliveryInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{DeliveryFilter, DeliveryTransition, LedgerStore};

/// Service for deliveries
#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<dyn LedgerStore>,
    ledger: LedgerConfig,
}

fn forbidden(action: &DeliveryAction<'_>) -> AppError {
    AppError::InsufficientPermissions(format!("not allowed to {} this delivery", action.name()))
}

fn may_perform(actor: &Actor, delivery: &Delivery, action: &DeliveryAction<'_>) -> bool {
    let is_producer = actor.is_farmer() && delivery.producer_id == actor.id;
    let is_buyer = actor.is_buyer() && delivery.buyer_id == actor.id;
    match action {
        DeliveryAction::Edit | DeliveryAction::Delete => is_producer,
        DeliveryAction::MarkDelivered | DeliveryAction::Cancel { .. } => is_producer || is_buyer,
        DeliveryAction::Complete => is_buyer || actor.is_reviewer(),
    }
}

fn can_view(actor: &Actor, delivery: &Delivery) -> bool {
    actor.is_reviewer()
        || (actor.is_farmer() && delivery.producer_id == actor.id)
        || (actor.is_buyer() && delivery.buyer_id == actor.id)
}

impl DeliveryService {
    pub fn new(store: Arc<dyn LedgerStore>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Allocate one of the farmer's lots to a new in-transit delivery
    pub async fn create(&self, actor: &Actor, input: CreateDeliveryInput) -> AppResult<Delivery> {
        if !actor.is_farmer() {
            return Err(AppError::InsufficientPermissions(
                "only farmers can create deliveries".to_string(),
            ));
        }
        input.validate()?;

        let lot = self
            .store
            .get_lot(input.lot_id)
            .await?
            .ok_or(AppError::LotNotFound(input.lot_id))?;
        if lot.producer_id != actor.id {
            return Err(AppError::InsufficientPermissions(
                "lot belongs to another producer".to_string(),
            ));
        }

        let delivery = Delivery::allocate(actor.id, &lot, input, Utc::now())?;
        self.store
            .claim_lot_for_delivery(&delivery)
            .await
            .map_err(|e| {
                tracing::warn!(lot_id = %lot.id, "Lot allocation refused: {}", e);
                e
            })?;

        tracing::info!(
            delivery_id = %delivery.id,
            lot_id = %delivery.lot_id,
            buyer_id = %delivery.buyer_id,
            quantity_kg = %delivery.quantity_kg,
            "Delivery created"
        );
        Ok(delivery)
    }

    /// Deliveries visible to `actor`, newest first
    pub async fn list(&self, actor: &Actor, filter: DeliveryFilter) -> AppResult<Vec<Delivery>> {
        let filter = if actor.is_reviewer() {
            filter
        } else if actor.is_farmer() {
            DeliveryFilter {
                producer_id: Some(actor.id),
                ..filter
            }
        } else {
            DeliveryFilter {
                buyer_id: Some(actor.id),
                ..filter
            }
        };
        self.store.list_deliveries(&filter).await
    }

    pub async fn get(&self, actor: &Actor, delivery_id: Uuid) -> AppResult<Delivery> {
        self.store
            .get_delivery(delivery_id)
            .await?
            .filter(|d| can_view(actor, d))
            .ok_or_else(|| AppError::NotFound("Delivery".to_string()))
    }

    /// Edit an in-transit delivery. The total follows quantity and price.
    pub async fn update(
        &self,
        actor: &Actor,
        delivery_id: Uuid,
        input: UpdateDeliveryInput,
    ) -> AppResult<Delivery> {
        input.validate()?;
        if input.is_empty() {
            return Err(AppError::validation("body", "No fields to update"));
        }

        let action = DeliveryAction::Edit;
        let mut delivery = self.authorize(actor, delivery_id, &action).await?;
        let expected = delivery.status;
        self.check_transition(&delivery, action)?;

        delivery.apply_changes(input, Utc::now())?;
        let updated = self
            .store
            .update_delivery(&delivery, expected)
            .await?
            .ok_or_else(|| self.lost_race(delivery_id, &action))?;

        tracing::info!(delivery_id = %delivery_id, "Delivery updated");
        Ok(updated)
    }

    /// Remove an in-transit delivery and free its lot
    pub async fn delete(&self, actor: &Actor, delivery_id: Uuid) -> AppResult<()> {
        let action = DeliveryAction::Delete;
        let delivery = self.authorize(actor, delivery_id, &action).await?;
        self.check_transition(&delivery, action)?;

        if !self.store.delete_delivery(delivery_id, delivery.status).await? {
            return Err(self.lost_race(delivery_id, &action));
        }

        tracing::info!(delivery_id = %delivery_id, lot_id = %delivery.lot_id, "Delivery deleted");
        Ok(())
    }

    pub async fn mark_delivered(&self, actor: &Actor, delivery_id: Uuid) -> AppResult<Delivery> {
        self.transition(actor, delivery_id, DeliveryAction::MarkDelivered)
            .await
    }

    pub async fn complete(&self, actor: &Actor, delivery_id: Uuid) -> AppResult<Delivery> {
        self.transition(actor, delivery_id, DeliveryAction::Complete)
            .await
    }

    /// Cancel with a mandatory reason. Whether the lot is released follows
    /// `ledger.release_lot_on_cancel`.
    pub async fn cancel(
        &self,
        actor: &Actor,
        delivery_id: Uuid,
        input: CancelDeliveryInput,
    ) -> AppResult<Delivery> {
        let action = DeliveryAction::Cancel {
            reason: input.reason.as_deref(),
        };
        self.transition(actor, delivery_id, action).await
    }

    async fn transition(
        &self,
        actor: &Actor,
        delivery_id: Uuid,
        action: DeliveryAction<'_>,
    ) -> AppResult<Delivery> {
        let delivery = self.authorize(actor, delivery_id, &action).await?;
        let next = self.check_transition(&delivery, action)?;

        let (cancellation_reason, release_lot) = match action {
            DeliveryAction::Cancel { reason } => (
                reason.map(|r| r.trim().to_string()),
                self.ledger.release_lot_on_cancel,
            ),
            _ => (None, false),
        };
        let transition = DeliveryTransition {
            from: delivery.status,
            to: next,
            cancellation_reason,
            release_lot,
            at: Utc::now(),
        };

        let updated = self
            .store
            .transition_delivery(delivery_id, &transition)
            .await?
            .ok_or_else(|| self.lost_race(delivery_id, &action))?;

        tracing::info!(
            delivery_id = %delivery_id,
            from = %transition.from,
            to = %transition.to,
            lot_released = release_lot,
            "Delivery status changed"
        );
        Ok(updated)
    }

    /// Load the delivery and check that `actor` may perform `action` on it.
    /// Deliveries the actor cannot see are reported as missing.
    async fn authorize(
        &self,
        actor: &Actor,
        delivery_id: Uuid,
        action: &DeliveryAction<'_>,
    ) -> AppResult<Delivery> {
        let delivery = self.get(actor, delivery_id).await?;
        if !may_perform(actor, &delivery, action) {
            return Err(forbidden(action));
        }
        Ok(delivery)
    }

    fn check_transition(
        &self,
        delivery: &Delivery,
        action: DeliveryAction<'_>,
    ) -> AppResult<DeliveryStatus> {
        advance_delivery(delivery.status, action).map_err(|e| {
            tracing::warn!(delivery_id = %delivery.id, "Delivery change refused: {}", e);
            AppError::from(e)
        })
    }

    fn lost_race(&self, delivery_id: Uuid, action: &DeliveryAction<'_>) -> AppError {
        tracing::warn!(delivery_id = %delivery_id, "Delivery changed concurrently");
        AppError::InvalidTransition(format!(
            "cannot {} delivery {}: it was changed concurrently",
            action.name(),
            delivery_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use shared::{DeliveryMethod, PaymentMethod, PaymentStatus};

    fn delivery(producer_id: Uuid, buyer_id: Uuid) -> Delivery {
        let now = Utc::now();
        Delivery {
            id: Uuid::new_v4(),
            producer_id,
            buyer_id,
            lot_id: Uuid::new_v4(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            variety: "Tangongon".to_string(),
            grade: "S2".to_string(),
            quantity_kg: Decimal::from(100),
            unit_price: Decimal::from(50),
            total_amount: Decimal::from(5000),
            pickup_location: "Farm".to_string(),
            dropoff_location: "Warehouse".to_string(),
            producer_contact: "09171234567".to_string(),
            buyer_contact: "09181234567".to_string(),
            delivery_method: DeliveryMethod::Pickup,
            status: DeliveryStatus::InTransit,
            payment_status: PaymentStatus::Unpaid,
            payment_method: PaymentMethod::Cash,
            notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_permission_matrix() {
        let producer = Actor::farmer(Uuid::new_v4());
        let buyer = Actor::buyer(Uuid::new_v4());
        let reviewer = Actor::reviewer(Uuid::new_v4());
        let stranger = Actor::farmer(Uuid::new_v4());
        let d = delivery(producer.id, buyer.id);
        let cancel = DeliveryAction::Cancel { reason: Some("x") };

        assert!(may_perform(&producer, &d, &DeliveryAction::Edit));
        assert!(!may_perform(&buyer, &d, &DeliveryAction::Edit));
        assert!(!may_perform(&buyer, &d, &DeliveryAction::Delete));

        assert!(may_perform(&producer, &d, &DeliveryAction::MarkDelivered));
        assert!(may_perform(&buyer, &d, &DeliveryAction::MarkDelivered));
        assert!(!may_perform(&reviewer, &d, &DeliveryAction::MarkDelivered));

        assert!(!may_perform(&producer, &d, &DeliveryAction::Complete));
        assert!(may_perform(&buyer, &d, &DeliveryAction::Complete));
        assert!(may_perform(&reviewer, &d, &DeliveryAction::Complete));

        assert!(may_perform(&producer, &d, &cancel));
        assert!(may_perform(&buyer, &d, &cancel));
        assert!(!may_perform(&stranger, &d, &cancel));
    }

    #[test]
    fn test_visibility() {
        let producer = Actor::farmer(Uuid::new_v4());
        let buyer = Actor::buyer(Uuid::new_v4());
        let d = delivery(producer.id, buyer.id);

        assert!(can_view(&producer, &d));
        assert!(can_view(&buyer, &d));
        assert!(can_view(&Actor::reviewer(Uuid::new_v4()), &d));
        assert!(!can_view(&Actor::buyer(Uuid::new_v4()), &d));
        // a farmer id that happens to equal the buyer id is still not the buyer
        assert!(!can_view(&Actor::farmer(buyer.id), &d));
    }
}

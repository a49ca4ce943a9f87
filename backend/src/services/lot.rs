//! Inventory lot intake and lookup

use std::sync::Arc;

use chrono::Utc;
use shared::{Actor, InventoryLot, RegisterLotInput};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LotFilter};

/// Service for inventory lots
#[derive(Clone)]
pub struct LotService {
    store: Arc<dyn LedgerStore>,
}

impl LotService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record a farmer's harvested lot as available stock
    pub async fn register(&self, actor: &Actor, input: RegisterLotInput) -> AppResult<InventoryLot> {
        if !actor.is_farmer() {
            return Err(AppError::InsufficientPermissions(
                "only farmers can register lots".to_string(),
            ));
        }
        input.validate()?;

        let lot = InventoryLot::from_intake(actor.id, input, Utc::now());
        self.store.insert_lot(&lot).await?;

        tracing::info!(
            lot_id = %lot.id,
            producer_id = %lot.producer_id,
            quantity_kg = %lot.quantity_kg,
            "Lot registered"
        );
        Ok(lot)
    }

    /// Farmers see their own lots; reviewers and buyers see every lot
    pub async fn list(&self, actor: &Actor, available_only: bool) -> AppResult<Vec<InventoryLot>> {
        let filter = LotFilter {
            producer_id: actor.is_farmer().then_some(actor.id),
            available_only,
        };
        self.store.list_lots(&filter).await
    }

    pub async fn get(&self, actor: &Actor, lot_id: Uuid) -> AppResult<InventoryLot> {
        self.store
            .get_lot(lot_id)
            .await?
            .filter(|lot| !actor.is_farmer() || lot.producer_id == actor.id)
            .ok_or(AppError::LotNotFound(lot_id))
    }
}

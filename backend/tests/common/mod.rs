//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use ftl_backend::config::LedgerConfig;
use ftl_backend::services::{DeliveryService, LotService, ReportService};
use ftl_backend::store::{LedgerStore, MemoryLedgerStore};
use rust_decimal::Decimal;
use shared::{
    Actor, CreateDeliveryInput, DeliveryMethod, InventoryLot, PaymentMethod, RegisterLotInput,
    ReportPeriod, SubmitReportInput, TransactionEntry,
};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn march() -> ReportPeriod {
    ReportPeriod::new(2024, 3).unwrap()
}

pub fn memory_store() -> Arc<dyn LedgerStore> {
    Arc::new(MemoryLedgerStore::new())
}

/// Services over one store
pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub reports: ReportService,
    pub lots: LotService,
    pub deliveries: DeliveryService,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(ledger: LedgerConfig) -> Self {
        let store = memory_store();
        Self {
            reports: ReportService::new(store.clone(), ledger),
            lots: LotService::new(store.clone()),
            deliveries: DeliveryService::new(store.clone(), ledger),
            store,
        }
    }

    pub async fn lot(&self, farmer: &Actor, quantity_kg: &str) -> InventoryLot {
        self.lots
            .register(farmer, lot_input(quantity_kg))
            .await
            .unwrap()
    }
}

pub fn entry(counterparty: &str, quantity: &str, unit_price: &str, total: &str) -> TransactionEntry {
    TransactionEntry {
        counterparty: counterparty.to_string(),
        grade: "JK".to_string(),
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        total_amount: dec(total),
        sale_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        payment_method: PaymentMethod::Cash,
    }
}

pub fn report_input(transactions: Vec<TransactionEntry>) -> SubmitReportInput {
    SubmitReportInput {
        period: march(),
        transactions,
        notes: None,
        idempotency_key: None,
    }
}

pub fn lot_input(quantity_kg: &str) -> RegisterLotInput {
    RegisterLotInput {
        variety: "Tangongon".to_string(),
        grade: "S2".to_string(),
        quantity_kg: dec(quantity_kg),
        harvest_date: NaiveDate::from_ymd_opt(2024, 2, 20).unwrap(),
        location: "Barangay Mabini".to_string(),
    }
}

pub fn delivery_input(lot_id: Uuid, buyer_id: Uuid, quantity_kg: &str, unit_price: &str) -> CreateDeliveryInput {
    CreateDeliveryInput {
        lot_id,
        buyer_id,
        quantity_kg: dec(quantity_kg),
        unit_price: dec(unit_price),
        scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        scheduled_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        pickup_location: "Barangay Mabini warehouse".to_string(),
        dropoff_location: "Davao baling station".to_string(),
        producer_contact: "0917 123 4567".to_string(),
        buyer_contact: "+63 82 234 5678".to_string(),
        delivery_method: DeliveryMethod::FarmerDelivery,
        payment_method: PaymentMethod::BankTransfer,
        notes: None,
    }
}

//! Orders and gateway payments reconciled by transaction code

use super::text_enum;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum OrderKind {
        Appointment => "appointment",
        Treatment => "treatment",
    }
}

text_enum! {
    pub enum OrderStatus {
        Pending => "pending",
        Paid => "paid",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kind: OrderKind,
    /// Appointment or treatment this order pays for.
    pub reference_id: Uuid,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transaction_code: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub amount_received: Option<Decimal>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub patient_id: Uuid,
    pub kind: OrderKind,
    pub reference_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Gateway data recorded on a payment when a notification is processed.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub gateway_transaction_id: String,
    pub amount_received: Decimal,
    pub received_at: DateTime<Utc>,
}

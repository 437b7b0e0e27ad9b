//! Orders, payments and the bank-transfer webhook
//!
//! Every order gets a pending payment with a transaction code the payer puts in
//! the transfer note. The gateway notifies us of incoming transfers; the code is
//! recovered from the notification and the payment settled when the amount
//! matches.

use crate::{
    config::PaymentConfig,
    db::{PaymentRepository, Repositories},
    models::{
        payment::{GatewayReceipt, NewOrder},
        Order, OrderKind, Payment, PaymentStatus,
    },
    Error, Result,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use rand::{distributions::Uniform, Rng};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const CODE_LENGTH: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_ATTEMPTS: usize = 5;
pub const AMOUNT_MISMATCH: &str = "amount_mismatch";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub patient_id: Uuid,
    pub kind: OrderKind,
    pub reference_id: Uuid,
    pub amount: Decimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithPayments {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<Payment>,
}

/// Gateway ids arrive as numbers from some banks and strings from others.
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferNotification {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub gateway: Option<String>,
    /// Bank-local timestamp, `YYYY-MM-DD HH:MM:SS`.
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    /// Payment code when the gateway recognised one.
    #[serde(default)]
    pub code: Option<String>,
    /// Free-text transfer note.
    #[serde(default)]
    pub content: Option<String>,
    /// `in` for incoming money, `out` for outgoing.
    pub transfer_type: String,
    pub transfer_amount: Decimal,
    #[serde(default)]
    pub reference_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransferNotification {
    fn received_at(&self) -> DateTime<Utc> {
        self.transaction_date
            .as_deref()
            .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S").ok())
            .map(|naive| naive.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Outgoing transfer; nothing to reconcile.
    Ignored,
    Unmatched,
    AlreadyPaid,
    Paid,
    AmountMismatch,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub success: bool,
    pub status: WebhookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
}

impl WebhookOutcome {
    fn bare(status: WebhookStatus, transaction_code: Option<String>) -> Self {
        Self {
            success: true,
            status,
            transaction_code,
            payment_id: None,
            order_id: None,
        }
    }

    fn for_payment(status: WebhookStatus, payment: &Payment) -> Self {
        Self {
            success: true,
            status,
            transaction_code: Some(payment.transaction_code.clone()),
            payment_id: Some(payment.id),
            order_id: Some(payment.order_id),
        }
    }
}

pub fn generate_code<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let index = Uniform::from(0..CODE_ALPHABET.len());
    let suffix: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.sample(index)] as char)
        .collect();
    format!("{}{suffix}", prefix.to_ascii_uppercase())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

/// Recovers transaction codes from gateway fields.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    pattern: Regex,
}

impl CodeExtractor {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"(?i)(?:^|[^A-Za-z0-9])({}[A-Za-z0-9]{{{CODE_LENGTH}}})(?:$|[^A-Za-z0-9])",
            regex::escape(prefix.trim())
        ))
        .map_err(|e| Error::Internal(format!("Invalid payment code pattern: {e}")))?;
        Ok(Self { pattern })
    }

    fn find(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
    }

    /// The dedicated code field wins over the free-text note.
    pub fn extract(&self, notification: &TransferNotification) -> Option<String> {
        [
            notification.code.as_deref(),
            notification.content.as_deref(),
            notification.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find_map(|text| self.find(text))
    }
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    extractor: CodeExtractor,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(repos: &Repositories, config: PaymentConfig) -> Result<Self> {
        Ok(Self {
            payments: repos.payments.clone(),
            extractor: CodeExtractor::new(&config.code_prefix)?,
            config,
        })
    }

    /// Checks `Authorization: Apikey <key>` when a webhook key is configured.
    pub fn verify_api_key(&self, authorization: Option<&str>) -> Result<()> {
        let Some(expected) = self.config.webhook_api_key.as_deref() else {
            return Ok(());
        };
        let provided = authorization
            .and_then(|value| value.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("apikey"))
            .map(|(_, key)| key.trim());
        match provided {
            Some(key) if constant_time_eq(expected.as_bytes(), key.as_bytes()) => Ok(()),
            _ => Err(Error::Unauthorized("Invalid webhook API key".to_string())),
        }
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<(Order, Payment)> {
        request.validate()?;
        if request.amount <= Decimal::ZERO {
            return Err(Error::Validation("amount must be greater than zero".to_string()));
        }

        let new = NewOrder {
            patient_id: request.patient_id,
            kind: request.kind,
            reference_id: request.reference_id,
            amount: request.amount.round_dp(2),
            description: request.description,
        };

        // Codes are random; retry the rare collision with a fresh one.
        let mut last_conflict = None;
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&self.config.code_prefix, &mut rand::thread_rng());
            match self.payments.create_order(new.clone(), &code).await {
                Ok((order, payment)) => {
                    tracing::info!(
                        order_id = %order.id,
                        transaction_code = %payment.transaction_code,
                        amount = %order.amount,
                        "Order created"
                    );
                    return Ok((order, payment));
                }
                Err(Error::Conflict(message)) => last_conflict = Some(message),
                Err(other) => return Err(other),
            }
        }
        Err(Error::Internal(format!(
            "Could not allocate a unique transaction code: {}",
            last_conflict.unwrap_or_default()
        )))
    }

    pub async fn get_order(&self, id: Uuid) -> Result<OrderWithPayments> {
        let order = self
            .payments
            .find_order(id)
            .await?
            .ok_or_else(|| Error::not_found("Order", id))?;
        let payments = self.payments.payments_for_order(id).await?;
        Ok(OrderWithPayments { order, payments })
    }

    pub async fn get_payment_by_code(&self, code: &str) -> Result<Payment> {
        self.payments
            .find_payment_by_code(code.trim())
            .await?
            .ok_or_else(|| Error::NotFound(format!("Payment with code {code} not found")))
    }

    pub async fn handle_webhook(&self, notification: TransferNotification) -> Result<WebhookOutcome> {
        if !notification.transfer_type.eq_ignore_ascii_case("in") {
            tracing::debug!(gateway_id = %notification.id, "Ignoring outgoing transfer");
            return Ok(WebhookOutcome::bare(WebhookStatus::Ignored, None));
        }

        let Some(code) = self.extractor.extract(&notification) else {
            tracing::warn!(gateway_id = %notification.id, "Transfer without a transaction code");
            return Ok(WebhookOutcome::bare(WebhookStatus::Unmatched, None));
        };

        let Some(payment) = self.payments.find_payment_by_code(&code).await? else {
            tracing::warn!(transaction_code = %code, "Transfer for an unknown transaction code");
            return Ok(WebhookOutcome::bare(WebhookStatus::Unmatched, Some(code)));
        };

        if payment.status == PaymentStatus::Paid {
            tracing::info!(payment_id = %payment.id, "Duplicate notification for a paid payment");
            return Ok(WebhookOutcome::for_payment(WebhookStatus::AlreadyPaid, &payment));
        }

        let receipt = GatewayReceipt {
            gateway_transaction_id: notification.id.clone(),
            amount_received: notification.transfer_amount,
            received_at: notification.received_at(),
        };

        if notification.transfer_amount != payment.amount {
            let Some(failed) = self
                .payments
                .mark_failed(payment.id, receipt, AMOUNT_MISMATCH)
                .await?
            else {
                return self.settled_meanwhile(&code).await;
            };
            tracing::warn!(
                payment_id = %failed.id,
                expected = %payment.amount,
                received = %notification.transfer_amount,
                "Payment amount mismatch"
            );
            return Ok(WebhookOutcome::for_payment(WebhookStatus::AmountMismatch, &failed));
        }

        let Some((paid, order)) = self.payments.settle(payment.id, receipt).await? else {
            return self.settled_meanwhile(&code).await;
        };
        tracing::info!(
            payment_id = %paid.id,
            order_id = %order.id,
            amount = %paid.amount,
            "Payment settled"
        );
        Ok(WebhookOutcome::for_payment(WebhookStatus::Paid, &paid))
    }

    /// Another notification settled the payment between our read and write.
    async fn settled_meanwhile(&self, code: &str) -> Result<WebhookOutcome> {
        let payment = self
            .payments
            .find_payment_by_code(code)
            .await?
            .ok_or_else(|| Error::not_found("Payment", code))?;
        tracing::info!(payment_id = %payment.id, "Payment settled by a concurrent notification");
        Ok(WebhookOutcome::for_payment(WebhookStatus::AlreadyPaid, &payment))
    }
}

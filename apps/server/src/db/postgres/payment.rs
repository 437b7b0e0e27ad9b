use super::{map_unique_violation, text_column, PostgresStore};
use crate::{
    db::traits::PaymentRepository,
    models::{
        payment::{GatewayReceipt, NewOrder},
        Order, Payment,
    },
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

const ORDER_COLUMNS: &str =
    "id, patient_id, kind, reference_id, amount, status, description, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_code, amount, status, \
     gateway_transaction_id, amount_received, failure_reason, paid_at, created_at, updated_at";

fn map_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        kind: text_column(row, "kind")?,
        reference_id: row.try_get("reference_id")?,
        amount: row.try_get("amount")?,
        status: text_column(row, "status")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_payment(row: &PgRow) -> Result<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        transaction_code: row.try_get("transaction_code")?,
        amount: row.try_get("amount")?,
        status: text_column(row, "status")?,
        gateway_transaction_id: row.try_get("gateway_transaction_id")?,
        amount_received: row.try_get("amount_received")?,
        failure_reason: row.try_get("failure_reason")?,
        paid_at: row.try_get("paid_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn create_order(&self, new: NewOrder, transaction_code: &str) -> Result<(Order, Payment)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO orders (id, patient_id, kind, reference_id, amount, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ORDER_COLUMNS}"
        );
        let order_row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.patient_id)
            .bind(new.kind.as_str())
            .bind(new.reference_id)
            .bind(new.amount)
            .bind(&new.description)
            .fetch_one(&mut *tx)
            .await?;
        let order = map_order(&order_row)?;

        let sql = format!(
            "INSERT INTO payments (id, order_id, transaction_code, amount)
             VALUES ($1, $2, $3, $4)
             RETURNING {PAYMENT_COLUMNS}"
        );
        let payment_row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(transaction_code)
            .bind(new.amount)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                map_unique_violation(e, format!("Transaction code '{transaction_code}' in use"))
            })?;
        let payment = map_payment(&payment_row)?;

        tx.commit().await?;
        Ok((order, payment))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_order).transpose()
    }

    async fn find_payment_by_code(&self, transaction_code: &str) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE UPPER(transaction_code) = UPPER($1)"
        );
        let row = sqlx::query(&sql)
            .bind(transaction_code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_payment).collect()
    }

    async fn settle(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
    ) -> Result<Option<(Payment, Order)>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE payments
             SET status = 'paid', gateway_transaction_id = $2, amount_received = $3,
                 paid_at = $4, failure_reason = NULL, updated_at = NOW()
             WHERE id = $1 AND status <> 'paid'
             RETURNING {PAYMENT_COLUMNS}"
        );
        let payment_row = sqlx::query(&sql)
            .bind(payment_id)
            .bind(&receipt.gateway_transaction_id)
            .bind(receipt.amount_received)
            .bind(receipt.received_at)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(payment_row) = payment_row else {
            return unpaid_guard_missed(&mut tx, payment_id).await;
        };
        let payment = map_payment(&payment_row)?;

        let sql = format!(
            "UPDATE orders SET status = 'paid', updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        );
        let order_row = sqlx::query(&sql)
            .bind(payment.order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found("Order", payment.order_id))?;
        let order = map_order(&order_row)?;

        tx.commit().await?;
        Ok(Some((payment, order)))
    }

    async fn mark_failed(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
        reason: &str,
    ) -> Result<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "UPDATE payments
             SET status = 'failed', gateway_transaction_id = $2, amount_received = $3,
                 failure_reason = $4, updated_at = NOW()
             WHERE id = $1 AND status <> 'paid'
             RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(payment_id)
            .bind(&receipt.gateway_transaction_id)
            .bind(receipt.amount_received)
            .bind(reason)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => map_payment(&row).map(Some),
            None => unpaid_guard_missed(&mut conn, payment_id).await,
        }
    }
}

/// An update guarded by `status <> 'paid'` touched nothing: the payment is
/// either already paid (`None`) or missing.
async fn unpaid_guard_missed<T>(conn: &mut sqlx::PgConnection, payment_id: Uuid) -> Result<Option<T>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE id = $1)")
        .bind(payment_id)
        .fetch_one(conn)
        .await?;
    if exists {
        Ok(None)
    } else {
        Err(Error::not_found("Payment", payment_id))
    }
}

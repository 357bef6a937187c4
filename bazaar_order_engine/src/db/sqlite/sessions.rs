use log::trace;
use sqlx::SqliteConnection;

use super::on_unique_violation;
use crate::{
    db_types::{NewPaymentSession, PaymentSession, PaymentTarget},
    traits::OrderFlowError,
};

/// Inserts a new live session without a payment page. The partial unique index on live sessions turns a second live session for the same
/// target into [`OrderFlowError::SessionAlreadyLive`].
pub async fn insert_session(
    session: &NewPaymentSession,
    conn: &mut SqliteConnection,
) -> Result<PaymentSession, OrderFlowError> {
    let target = session.target;
    let record = sqlx::query_as(
        r#"
            INSERT INTO payment_sessions (reference, target_kind, target_id, amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&session.reference)
    .bind(target.kind())
    .bind(target.id())
    .bind(session.amount)
    .bind(&session.currency)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        on_unique_violation(e, |msg| {
            if msg.contains("payment_sessions.reference") {
                OrderFlowError::DatabaseError(format!("Payment reference {} has already been issued", session.reference))
            } else {
                OrderFlowError::SessionAlreadyLive(target)
            }
        })
    })?;
    Ok(record)
}

/// Sets the payment page of a live session that does not have one yet.
pub async fn activate_session(
    reference: &str,
    authorization_url: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSession>, OrderFlowError> {
    let session = sqlx::query_as(
        r#"
            UPDATE payment_sessions SET authorization_url = $1, updated_at = CURRENT_TIMESTAMP
            WHERE reference = $2 AND status = 'live' AND authorization_url IS NULL
            RETURNING *;
        "#,
    )
    .bind(authorization_url)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

/// Deletes a live session that never got a payment page.
pub async fn release_session(reference: &str, conn: &mut SqliteConnection) -> Result<bool, OrderFlowError> {
    let result = sqlx::query(
        "DELETE FROM payment_sessions WHERE reference = $1 AND status = 'live' AND authorization_url IS NULL",
    )
    .bind(reference)
    .execute(conn)
    .await?;
    trace!("🗃️ Releasing session {reference} affected {} rows", result.rows_affected());
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_session_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSession>, OrderFlowError> {
    let session = sqlx::query_as("SELECT * FROM payment_sessions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(session)
}

pub async fn fetch_sessions_for_target(
    target: PaymentTarget,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSession>, OrderFlowError> {
    let sessions =
        sqlx::query_as("SELECT * FROM payment_sessions WHERE target_kind = $1 AND target_id = $2 ORDER BY id ASC")
            .bind(target.kind())
            .bind(target.id())
            .fetch_all(conn)
            .await?;
    Ok(sessions)
}

pub async fn fetch_live_session(
    target: PaymentTarget,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSession>, OrderFlowError> {
    let session = sqlx::query_as(
        "SELECT * FROM payment_sessions WHERE target_kind = $1 AND target_id = $2 AND status = 'live'",
    )
    .bind(target.kind())
    .bind(target.id())
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

pub async fn mark_failed(reference: &str, conn: &mut SqliteConnection) -> Result<bool, OrderFlowError> {
    let result = sqlx::query(
        r#"
            UPDATE payment_sessions SET status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status = 'live';
        "#,
    )
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_succeeded(reference: &str, conn: &mut SqliteConnection) -> Result<bool, OrderFlowError> {
    let result = sqlx::query(
        r#"
            UPDATE payment_sessions SET status = 'succeeded', updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status != 'succeeded';
        "#,
    )
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Marks the session for `reference` as succeeded and retires every other live session of the same target.
pub async fn close_sessions_for_settlement(
    target: PaymentTarget,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, OrderFlowError> {
    let result = sqlx::query(
        r#"
            UPDATE payment_sessions SET
                status = CASE WHEN reference = $1 THEN 'succeeded' ELSE 'abandoned' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE target_kind = $2 AND target_id = $3 AND (reference = $1 OR status = 'live');
        "#,
    )
    .bind(reference)
    .bind(target.kind())
    .bind(target.id())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

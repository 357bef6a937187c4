//! Settlement queries shared by every [`Settleable`] aggregate. The table is chosen from [`Settleable::KIND`].
use sqlx::{sqlite::SqliteRow, FromRow, SqliteConnection};

use super::on_unique_violation;
use crate::{
    db_types::PaymentTarget,
    traits::{OrderFlowError, Settleable},
};

/// Raised by the triggers that guard the payment reference columns.
const IMMUTABLE_REFERENCE: &str = "payment reference is immutable";

/// Compare-and-set from `pending` to `paid`, recording `reference` as the payment that settled the aggregate.
/// Returns the updated row, or `None` if the aggregate was not pending.
///
/// The reference column is single-assignment. An attempt to replace a different reference is
/// [`OrderFlowError::ReferenceImmutable`].
pub async fn mark_paid<T>(
    id: i64,
    reference: &str,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<T>, OrderFlowError>
where
    T: Settleable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!(
        r#"
            UPDATE {} SET
                status = 'paid',
                payment_reference = $1,
                payment_metadata = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'pending'
            RETURNING *;
        "#,
        T::KIND.table()
    );
    let record = sqlx::query_as::<_, T>(&sql)
        .bind(reference)
        .bind(payload)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(de) if de.message().contains(IMMUTABLE_REFERENCE) => {
                OrderFlowError::ReferenceImmutable(PaymentTarget::new(T::KIND, id))
            },
            _ => on_unique_violation(e, |_| OrderFlowError::ReferenceImmutable(PaymentTarget::new(T::KIND, id))),
        })?;
    Ok(record)
}

pub async fn fetch_target<T>(id: i64, conn: &mut SqliteConnection) -> Result<Option<T>, OrderFlowError>
where T: Settleable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    let sql = format!("SELECT * FROM {} WHERE id = $1", T::KIND.table());
    let record = sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(record)
}

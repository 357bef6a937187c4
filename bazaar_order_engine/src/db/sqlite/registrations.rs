use sqlx::SqliteConnection;

use crate::{
    db_types::{NewRegistration, Registration},
    traits::OrderFlowError,
};

pub async fn insert_registration(
    registration: &NewRegistration,
    conn: &mut SqliteConnection,
) -> Result<Registration, OrderFlowError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO registrations (applicant_id, programme, fee, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(registration.applicant_id)
    .bind(&registration.programme)
    .bind(registration.fee)
    .bind(&registration.currency)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_registration(id: i64, conn: &mut SqliteConnection) -> Result<Option<Registration>, OrderFlowError> {
    let record = sqlx::query_as("SELECT * FROM registrations WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(record)
}

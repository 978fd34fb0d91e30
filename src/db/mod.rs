// src/db/mod.rs

use sqlx::{Pool, Postgres, Transaction};
use std::env;

pub mod filter;

pub async fn connect() -> anyhow::Result<Pool<Postgres>> {
    let database_url = env::var("DATABASE_URL")
        .expect("❌ DATABASE_URL must be set in your .env file");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    println!("✅ Connected to PostgreSQL, migrations applied");
    Ok(pool)
}

fn next_number_sql(counter: &str, table: &str, column: &str) -> String {
    format!(
        "UPDATE counters \
            SET value = GREATEST(value, COALESCE((SELECT MAX({column}) FROM {table}), 1000)) + 1 \
          WHERE name = '{counter}' \
        RETURNING value"
    )
}

/// Atomic next-number assignment for record sequences (eoiNo, bookingNo).
/// The row lock taken by the UPDATE serializes concurrent assigners and
/// GREATEST(max) absorbs explicitly supplied numbers, so the sequence is
/// always max(existing)+1 and starts at 1001 from the seeded 1000. Runs on
/// the caller's transaction: a failed insert rolls the number back instead
/// of burning it.
pub async fn next_number(
    tx: &mut Transaction<'_, Postgres>,
    counter: &str,
    table: &str,
    column: &str,
) -> Result<i64, sqlx::Error> {
    let sql = next_number_sql(counter, table, column);
    sqlx::query_scalar(&sql).fetch_one(&mut **tx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_statement_locks_counter_and_absorbs_manual_numbers() {
        let sql = next_number_sql("eoi_no", "eois", "eoi_no");
        assert!(sql.contains(
            "GREATEST(value, COALESCE((SELECT MAX(eoi_no) FROM eois), 1000)) + 1"
        ));
        assert!(sql.contains("WHERE name = 'eoi_no'"));
        assert!(sql.ends_with("RETURNING value"));

        let sql = next_number_sql("booking_no", "bookings", "booking_no");
        assert!(sql.contains("(SELECT MAX(booking_no) FROM bookings), 1000"));
        assert!(sql.contains("WHERE name = 'booking_no'"));
    }
}

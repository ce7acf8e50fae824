use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use liwa_models::{Booking, BookingStatus};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

const BOOKING_COLUMNS: &str = "booking_id, created_at, name, phone, tickets, ticket_price, \
    total_amount, status, payment_intent_id, payment_status, redirect_url, notes";

/// SQLite-backed store keyed by `booking_id`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Row shape as stored; money and status are kept as TEXT.
#[derive(Debug, FromRow)]
struct BookingRow {
    booking_id: String,
    created_at: NaiveDateTime,
    name: String,
    phone: String,
    tickets: i64,
    ticket_price: String,
    total_amount: String,
    status: String,
    payment_intent_id: Option<String>,
    payment_status: Option<String>,
    redirect_url: Option<String>,
    notes: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(r: BookingRow) -> Result<Self> {
        Ok(Booking {
            tickets: u32::try_from(r.tickets)
                .with_context(|| format!("booking {} has invalid tickets", r.booking_id))?,
            ticket_price: Decimal::from_str(&r.ticket_price)?,
            total_amount: Decimal::from_str(&r.total_amount)?,
            status: BookingStatus::from_str(&r.status).map_err(|e| anyhow!(e))?,
            booking_id: r.booking_id,
            created_at: r.created_at,
            name: r.name,
            phone: r.phone,
            payment_intent_id: r.payment_intent_id,
            payment_status: r.payment_status,
            redirect_url: r.redirect_url,
            notes: r.notes,
        })
    }
}

impl SqliteStore {
    /// Connect and apply migrations, creating the database file and its
    /// directory if needed. In-memory databases get a single connection so
    /// every query sees the same data.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        info!("Connected to database: {database_url}");
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations applied");
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY seq");
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    /// Replace every row inside one transaction; `seq` keeps the caller's order.
    pub async fn save_all(&self, bookings: &[Booking]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM bookings").execute(&mut *tx).await?;
        for (seq, b) in bookings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO bookings (seq, booking_id, created_at, name, phone, tickets, \
                    ticket_price, total_amount, status, payment_intent_id, payment_status, \
                    redirect_url, notes) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(seq as i64)
            .bind(&b.booking_id)
            .bind(b.created_at)
            .bind(&b.name)
            .bind(&b.phone)
            .bind(i64::from(b.tickets))
            .bind(b.ticket_price.to_string())
            .bind(b.total_amount.to_string())
            .bind(b.status.as_str())
            .bind(&b.payment_intent_id)
            .bind(&b.payment_status)
            .bind(&b.redirect_url)
            .bind(&b.notes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::booking;

    #[tokio::test]
    async fn save_all_replaces_and_preserves_order() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

        store
            .save_all(&[booking("SL-20261019-002", 1), booking("SL-20261019-001", 1)])
            .await
            .unwrap();

        let mut paid = booking("SL-20261019-001", 3);
        paid.status = BookingStatus::Paid;
        paid.payment_intent_id = Some("pi_1".to_string());
        paid.payment_status = Some("completed".to_string());
        let next = booking("SL-20261019-003", 1);
        store.save_all(&[paid.clone(), next.clone()]).await.unwrap();

        assert_eq!(store.load_all().await.unwrap(), vec![paid, next]);
    }

    #[tokio::test]
    async fn file_database_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("nested").join("bookings.db");
        let url = format!("sqlite:{}", db_path.display());

        let store = SqliteStore::connect(&url).await.unwrap();
        store.save_all(&[booking("SL-20261019-001", 1)]).await.unwrap();

        assert!(db_path.exists());
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_booking_ids_are_rejected() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let b = booking("SL-20261019-001", 1);
        assert!(store.save_all(&[b.clone(), b]).await.is_err());
        assert!(store.load_all().await.unwrap().is_empty());
    }
}

use std::path::PathBuf;

use anyhow::Result;
use liwa_models::Booking;
use tracing::info;

mod csv_file;
mod sqlite;

pub use csv_file::CsvStore;
pub use sqlite::SqliteStore;

/// Persisted schema version. Bump together with `COLUMNS` and teach the
/// loaders how to migrate the previous layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Column order of the persisted booking table.
pub const COLUMNS: [&str; 12] = [
    "booking_id",
    "created_at",
    "name",
    "phone",
    "tickets",
    "ticket_price",
    "total_amount",
    "status",
    "payment_intent_id",
    "payment_status",
    "redirect_url",
    "notes",
];

/// Whole-set booking persistence: every read loads all rows, every write
/// replaces all rows.
#[derive(Debug, Clone)]
pub enum Store {
    Csv(CsvStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Open a store from a URL: `sqlite:<path>`, `csv:<path>` or a bare path
    /// (treated as CSV).
    pub async fn open(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            let store = SqliteStore::connect(url).await?;
            return Ok(Store::Sqlite(store));
        }
        let store = CsvStore::new(PathBuf::from(url.strip_prefix("csv:").unwrap_or(url)));
        info!("Using booking file: {}", store.path().display());
        Ok(Store::Csv(store))
    }

    pub async fn load_all(&self) -> Result<Vec<Booking>> {
        match self {
            Store::Csv(s) => s.load_all().await,
            Store::Sqlite(s) => s.load_all().await,
        }
    }

    pub async fn save_all(&self, bookings: &[Booking]) -> Result<()> {
        match self {
            Store::Csv(s) => s.save_all(bookings).await,
            Store::Sqlite(s) => s.save_all(bookings).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use liwa_models::{Booking, BookingStatus};
    use rust_decimal::Decimal;

    pub fn booking(id: &str, tickets: u32) -> Booking {
        let price = Decimal::from(175);
        Booking {
            booking_id: id.to_string(),
            created_at: NaiveDate::from_ymd_opt(2026, 10, 19)
                .unwrap()
                .and_hms_opt(18, 30, 0)
                .unwrap(),
            name: "Hamdan".to_string(),
            phone: "+971500000000".to_string(),
            tickets,
            ticket_price: price,
            total_amount: price * Decimal::from(tickets),
            status: BookingStatus::Pending,
            payment_intent_id: None,
            payment_status: None,
            redirect_url: None,
            notes: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bare_path_opens_csv_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.csv");
        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        assert!(matches!(store, Store::Csv(_)));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_url_opens_sqlite_store() {
        let store = Store::open("sqlite::memory:").await.unwrap();
        assert!(matches!(store, Store::Sqlite(_)));
        let b = test_support::booking("SL-20261019-001", 2);
        store.save_all(std::slice::from_ref(&b)).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![b]);
    }
}

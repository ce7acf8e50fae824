use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use liwa_models::Booking;
use tracing::{debug, info};

use crate::COLUMNS;

/// Columns a file must carry to be readable at all. Everything else is
/// nullable and filled in by the load-time migration.
const REQUIRED_COLUMNS: [&str; 8] = [
    "booking_id",
    "created_at",
    "name",
    "phone",
    "tickets",
    "ticket_price",
    "total_amount",
    "status",
];

/// Flat CSV file holding the full booking set.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every booking, creating a header-only file if none exists.
    pub async fn load_all(&self) -> Result<Vec<Booking>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_file(&path)).await?
    }

    /// Replace the file contents with `bookings`.
    pub async fn save_all(&self, bookings: &[Booking]) -> Result<()> {
        let path = self.path.clone();
        let bookings = bookings.to_vec();
        tokio::task::spawn_blocking(move || write_file(&path, &bookings)).await?
    }
}

fn read_file(path: &Path) -> Result<Vec<Booking>> {
    if !path.exists() {
        info!("Creating booking file {}", path.display());
        write_file(path, &[])?;
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening booking file {}", path.display()))?;
    let headers = reader.headers()?.clone();

    if headers.is_empty() {
        write_file(path, &[])?;
        return Ok(Vec::new());
    }

    let current = headers.iter().eq(COLUMNS.iter().copied());
    if !current {
        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|col| !headers.iter().any(|h| h == **col))
        {
            bail!("booking file {} is missing required column `{missing}`", path.display());
        }
    }

    let bookings = reader
        .deserialize()
        .collect::<Result<Vec<Booking>, _>>()
        .with_context(|| format!("parsing booking file {}", path.display()))?;

    if !current {
        info!(
            "Migrating booking file {} to schema v{} ({} rows)",
            path.display(),
            crate::SCHEMA_VERSION,
            bookings.len()
        );
        write_file(path, &bookings)?;
    }

    debug!("Loaded {} bookings from {}", bookings.len(), path.display());
    Ok(bookings)
}

fn write_file(path: &Path, bookings: &[Booking]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Write beside the target and rename so readers never see a half file.
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        writer.write_record(COLUMNS)?;
        for booking in bookings {
            writer.serialize(booking)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("replacing booking file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::booking;
    use liwa_models::BookingStatus;

    #[tokio::test]
    async fn missing_file_is_created_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("bookings.csv");
        let store = CsvStore::new(&path);

        assert!(store.load_all().await.unwrap().is_empty());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim_end(), COLUMNS.join(","));
    }

    #[tokio::test]
    async fn save_then_load_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("bookings.csv"));

        let mut paid = booking("SL-20261019-001", 2);
        paid.status = BookingStatus::Paid;
        paid.payment_intent_id = Some("pi_123".to_string());
        paid.payment_status = Some("completed".to_string());
        paid.redirect_url = Some("https://pay.ziina.com/pi_123".to_string());
        paid.notes = "near the dunes, please".to_string();
        let pending = booking("SL-20261019-002", 1);

        store.save_all(&[paid.clone(), pending.clone()]).await.unwrap();
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![paid, pending]);
    }

    #[tokio::test]
    async fn save_all_overwrites_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("bookings.csv"));

        store
            .save_all(&[booking("SL-20261019-001", 1), booking("SL-20261019-002", 1)])
            .await
            .unwrap();
        store.save_all(&[booking("SL-20261019-003", 4)]).await.unwrap();

        let ids: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.booking_id)
            .collect();
        assert_eq!(ids, vec!["SL-20261019-003"]);
    }

    #[tokio::test]
    async fn older_layout_is_migrated_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.csv");
        std::fs::write(
            &path,
            "booking_id,created_at,name,phone,tickets,ticket_price,total_amount,status,payment_intent_id\n\
             SL-20261018-001,2026-10-18T10:00:00,Sara,0501112222,3,175,525,pending,pi_9\n",
        )
        .unwrap();

        let store = CsvStore::new(&path);
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].total_amount, rust_decimal::Decimal::from(525));
        assert_eq!(loaded[0].payment_intent_id.as_deref(), Some("pi_9"));
        assert_eq!(loaded[0].redirect_url, None);
        assert_eq!(loaded[0].notes, "");

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(&COLUMNS.join(",")));
    }

    #[tokio::test]
    async fn missing_required_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.csv");
        std::fs::write(&path, "booking_id,name\nSL-20261018-001,Sara\n").unwrap();

        let err = CsvStore::new(&path).load_all().await.unwrap_err();
        assert!(err.to_string().contains("created_at"), "{err}");
    }
}

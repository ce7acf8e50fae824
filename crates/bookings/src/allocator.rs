use chrono::{NaiveDate, NaiveDateTime, Timelike};
use liwa_models::{Booking, BookingForm, BookingStatus};
use rust_decimal::Decimal;

use crate::error::{BookingError, Result};

pub const ID_PREFIX: &str = "SL";

/// Next human-readable id for `today`: `SL-YYYYMMDD-NNN`.
///
/// The sequence continues from the highest numeric suffix already issued
/// today, regardless of the order `existing_ids` arrive in. Ids from other
/// days and ids with a non-numeric suffix are ignored. Fails once the day's
/// sequence reaches `u32::MAX`.
pub fn allocate_booking_id<S: AsRef<str>>(existing_ids: &[S], today: NaiveDate) -> Result<String> {
    let prefix = format!("{ID_PREFIX}-{}-", today.format("%Y%m%d"));
    let last = existing_ids
        .iter()
        .filter_map(|id| id.as_ref().trim().strip_prefix(prefix.as_str()))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let next = last.checked_add(1).ok_or_else(|| {
        BookingError::Validation(format!("booking id sequence for {today} is exhausted"))
    })?;
    Ok(format!("{prefix}{next:03}"))
}

/// Validate `form` and build a pending booking priced at `ticket_price`.
pub fn new_booking(
    form: &BookingForm,
    ticket_price: Decimal,
    existing: &[Booking],
    now: NaiveDateTime,
) -> Result<Booking> {
    let name = form.name.trim();
    let phone = form.phone.trim();
    if name.is_empty() {
        return Err(BookingError::Validation("name is required".to_string()));
    }
    if phone.is_empty() {
        return Err(BookingError::Validation("phone is required".to_string()));
    }
    let tickets = form.tickets.unwrap_or(1);
    if tickets == 0 {
        return Err(BookingError::Validation("tickets must be at least 1".to_string()));
    }

    let ids: Vec<&str> = existing.iter().map(|b| b.booking_id.as_str()).collect();
    Ok(Booking {
        booking_id: allocate_booking_id(&ids, now.date())?,
        created_at: now.with_nanosecond(0).unwrap_or(now),
        name: name.to_string(),
        phone: phone.to_string(),
        tickets,
        ticket_price,
        total_amount: ticket_price * Decimal::from(tickets),
        status: BookingStatus::Pending,
        payment_intent_id: None,
        payment_status: None,
        redirect_url: None,
        notes: form.notes.trim().to_string(),
    })
}

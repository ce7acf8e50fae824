use liwa_models::{Booking, BookingStatus};
use percent_encoding::percent_decode_str;

/// Characters the provider has been seen to wrap intent ids in.
const WRAPPING_CHARS: &[char] = &['{', '}', '"', '\''];

/// Turn a raw `pi_id` query value into a bare intent id.
///
/// The value may still be percent-encoded (`%7Bpi_1%7D`) and wrapped in
/// braces or quotes.
pub fn normalize_intent_token(raw: &str) -> String {
    let decoded = percent_decode_str(raw.trim()).decode_utf8_lossy();
    decoded
        .trim()
        .trim_matches(WRAPPING_CHARS)
        .trim()
        .to_string()
}

/// Booking status implied by a provider status, if any.
pub fn map_provider_status(provider_status: &str) -> Option<BookingStatus> {
    match provider_status.trim().to_ascii_lowercase().as_str() {
        "completed" => Some(BookingStatus::Paid),
        "failed" | "canceled" => Some(BookingStatus::Cancelled),
        _ => None,
    }
}

/// Record `provider_status` on `booking` and move it out of `Pending` when
/// the status is final. Terminal bookings keep their status.
///
/// Returns true when anything changed, so applying the same status twice
/// reports a change at most once.
pub fn apply_provider_status(booking: &mut Booking, provider_status: &str) -> bool {
    let provider_status = provider_status.trim();
    if provider_status.is_empty() {
        return false;
    }

    let mut changed = false;
    if booking.payment_status.as_deref() != Some(provider_status) {
        booking.payment_status = Some(provider_status.to_string());
        changed = true;
    }
    if let Some(next) = map_provider_status(provider_status) {
        if !booking.status.is_terminal() {
            booking.status = next;
            changed = true;
        }
    }
    changed
}

/// Index of the booking holding `intent_id`: exact match first, then the
/// first stored id containing it.
pub fn find_by_intent(bookings: &[Booking], intent_id: &str) -> Option<usize> {
    if intent_id.is_empty() {
        return None;
    }
    bookings
        .iter()
        .position(|b| b.intent_id() == Some(intent_id))
        .or_else(|| {
            bookings
                .iter()
                .position(|b| b.intent_id().is_some_and(|id| id.contains(intent_id)))
        })
}

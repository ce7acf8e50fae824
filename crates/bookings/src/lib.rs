//! Booking allocation and payment reconciliation.
//!
//! [`allocator`] and [`reconcile`] are pure functions over booking records;
//! [`BookingService`] wires them to a [`liwa_db::Store`] and a
//! [`liwa_payments::ZiinaClient`].

pub mod allocator;
mod error;
pub mod reconcile;
mod service;

pub use allocator::{allocate_booking_id, new_booking};
pub use error::{BookingError, Result};
pub use reconcile::{apply_provider_status, find_by_intent, map_provider_status, normalize_intent_token};
pub use service::{BookingService, CallbackOutcome, PaymentOutcome, PaymentStart, SyncReport};

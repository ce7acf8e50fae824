use std::cmp::Reverse;

use chrono::{Local, NaiveDateTime};
use liwa_db::Store;
use liwa_models::{Booking, BookingForm, BookingStatus, BookingSummary};
use liwa_payments::ZiinaClient;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::allocator::new_booking;
use crate::error::{BookingError, Result};
use crate::reconcile::{apply_provider_status, find_by_intent, normalize_intent_token};

/// What happened when a payment was requested for a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Send the visitor to the hosted payment page.
    Redirect(String),
    /// The intent was created but no payment page URL could be found.
    MissingRedirect,
    /// No usable access token; the booking stays pending.
    NotConfigured,
    /// The provider could not be reached or refused the request.
    GatewayFailed,
}

#[derive(Debug, Clone)]
pub struct PaymentStart {
    pub booking: Booking,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub booking: Option<Booking>,
    /// Canonical intent id when the provider returned one, otherwise the
    /// normalized id from the callback.
    pub intent_id: String,
    /// Provider status if it could be fetched, otherwise the `result` query value.
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Bookings that carry an intent id.
    pub checked: usize,
    /// Bookings for which the provider returned a status.
    pub refreshed: usize,
    /// Bookings whose stored state changed.
    pub updated: usize,
}

/// Booking operations over one store and one gateway.
///
/// Every load-modify-save cycle runs under `write_lock`, so allocation and
/// reconciliation never interleave inside a process. Provider calls are made
/// before the lock is taken.
pub struct BookingService {
    store: Store,
    gateway: ZiinaClient,
    ticket_price: Decimal,
    write_lock: Mutex<()>,
}

impl BookingService {
    pub fn new(store: Store, gateway: ZiinaClient, ticket_price: Decimal) -> Self {
        Self {
            store,
            gateway,
            ticket_price,
            write_lock: Mutex::new(()),
        }
    }

    pub fn ticket_price(&self) -> Decimal {
        self.ticket_price
    }

    pub fn gateway(&self) -> &ZiinaClient {
        &self.gateway
    }

    pub async fn create_booking(&self, form: &BookingForm) -> Result<Booking> {
        self.create_booking_at(form, Local::now().naive_local()).await
    }

    /// Allocate, append and persist a new pending booking stamped `now`.
    pub async fn create_booking_at(&self, form: &BookingForm, now: NaiveDateTime) -> Result<Booking> {
        let _guard = self.write_lock.lock().await;
        let mut bookings = self.store.load_all().await?;
        let booking = new_booking(form, self.ticket_price, &bookings, now)?;
        bookings.push(booking.clone());
        self.store.save_all(&bookings).await?;
        info!(
            "Booking {} created: {} ticket(s), total {}",
            booking.booking_id, booking.tickets, booking.total_amount
        );
        Ok(booking)
    }

    /// Request a hosted payment page for `booking` and record the intent.
    ///
    /// When the provider is unavailable nothing is written and the booking
    /// is returned as it was.
    pub async fn start_payment(&self, booking: Booking) -> Result<PaymentStart> {
        if !self.gateway.is_configured() {
            warn!("Ziina not configured; booking {} saved as pending", booking.booking_id);
            return Ok(PaymentStart { booking, outcome: PaymentOutcome::NotConfigured });
        }

        let Some(intent) = self
            .gateway
            .create_intent(booking.total_amount, &booking.booking_id, &booking.name)
            .await
        else {
            return Ok(PaymentStart { booking, outcome: PaymentOutcome::GatewayFailed });
        };

        let _guard = self.write_lock.lock().await;
        let mut bookings = self.store.load_all().await?;
        let stored = bookings
            .iter_mut()
            .find(|b| b.booking_id == booking.booking_id)
            .ok_or_else(|| BookingError::NotFound(booking.booking_id.clone()))?;

        stored.payment_intent_id = intent.id.clone();
        stored.redirect_url = intent.redirect_url.clone();
        if let Some(status) = intent.status.as_deref() {
            apply_provider_status(stored, status);
        }
        let updated = stored.clone();
        self.store.save_all(&bookings).await?;
        info!(
            "Booking {} linked to payment intent {}",
            updated.booking_id,
            updated.payment_intent_id.as_deref().unwrap_or("<none>")
        );

        let outcome = match intent.redirect_url {
            Some(url) => PaymentOutcome::Redirect(url),
            None => PaymentOutcome::MissingRedirect,
        };
        Ok(PaymentStart { booking: updated, outcome })
    }

    /// Create a booking and immediately request payment for it.
    pub async fn book(&self, form: &BookingForm) -> Result<PaymentStart> {
        let booking = self.create_booking(form).await?;
        self.start_payment(booking).await
    }

    /// Reconcile the booking named by a provider redirect.
    pub async fn handle_callback(&self, result: &str, raw_intent_id: &str) -> Result<CallbackOutcome> {
        let supplied = normalize_intent_token(raw_intent_id);
        let mut intent_id = supplied.clone();
        let mut provider_status = None;

        if !supplied.is_empty() {
            if let Some(intent) = self.gateway.get_intent(&supplied).await {
                provider_status = intent.status;
                if let Some(canonical) = intent.id {
                    intent_id = canonical;
                }
            }
        }

        let booking = if supplied.is_empty() {
            None
        } else {
            let _guard = self.write_lock.lock().await;
            let mut bookings = self.store.load_all().await?;
            let index = find_by_intent(&bookings, &supplied)
                .or_else(|| find_by_intent(&bookings, &intent_id));
            match index {
                Some(i) => {
                    if let Some(status) = provider_status.as_deref() {
                        if apply_provider_status(&mut bookings[i], status) {
                            self.store.save_all(&bookings).await?;
                            info!(
                                "Booking {} reconciled from callback: {} ({})",
                                bookings[i].booking_id, bookings[i].status, status
                            );
                        }
                    }
                    Some(bookings[i].clone())
                }
                None => {
                    warn!("Payment callback for unknown intent {supplied}");
                    None
                }
            }
        };

        Ok(CallbackOutcome {
            booking,
            intent_id,
            status: provider_status.unwrap_or_else(|| result.trim().to_string()),
        })
    }

    /// Refresh every booking that has a payment intent and persist once.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        if !self.gateway.is_configured() {
            warn!("Ziina not configured; skipping payment sync");
            return Ok(SyncReport::default());
        }

        let snapshot = self.store.load_all().await?;
        let mut report = SyncReport::default();
        let mut observed = Vec::new();
        for booking in &snapshot {
            let Some(intent_id) = booking.intent_id() else {
                continue;
            };
            report.checked += 1;
            if let Some(status) = self.gateway.get_status(intent_id).await {
                observed.push((booking.booking_id.clone(), status));
            }
        }
        report.refreshed = observed.len();

        let _guard = self.write_lock.lock().await;
        let mut bookings = self.store.load_all().await?;
        for (booking_id, status) in &observed {
            if let Some(b) = bookings.iter_mut().find(|b| &b.booking_id == booking_id) {
                if apply_provider_status(b, status) {
                    report.updated += 1;
                }
            }
        }
        if report.updated > 0 {
            self.store.save_all(&bookings).await?;
        }
        info!(
            "Payment sync: {} checked, {} refreshed, {} updated",
            report.checked, report.refreshed, report.updated
        );
        Ok(report)
    }

    pub async fn get(&self, booking_id: &str) -> Result<Booking> {
        self.store
            .load_all()
            .await?
            .into_iter()
            .find(|b| b.booking_id == booking_id)
            .ok_or_else(|| BookingError::NotFound(booking_id.to_string()))
    }

    /// All bookings, newest first.
    pub async fn list(&self) -> Result<Vec<Booking>> {
        let mut bookings = self.store.load_all().await?;
        bookings.sort_by_key(|b| Reverse((b.created_at, b.booking_id.clone())));
        Ok(bookings)
    }

    pub async fn summary(&self) -> Result<BookingSummary> {
        let bookings = self.store.load_all().await?;
        Ok(BookingSummary::from_bookings(&bookings))
    }

    /// The booking behind a ticket; only paid bookings have one.
    pub async fn ticket(&self, booking_id: &str) -> Result<Booking> {
        let booking = self.get(booking_id).await?;
        if booking.status != BookingStatus::Paid {
            return Err(BookingError::NotPaid(booking.booking_id));
        }
        Ok(booking)
    }
}

//! Booking persistence behind an async trait. The shipped backend keeps
//! reconciled bookings in process memory; the provider session metadata
//! remains the durable copy.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::ServiceError;
use crate::models::Booking;

/// Whether an upsert stored a new record or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn created(self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }
}

/// Storage for reconciled bookings, keyed by booking reference
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts or replaces the record stored under its booking reference.
    /// Replaying the same payment event lands on the same key, so repeated
    /// deliveries keep exactly one record.
    async fn upsert(&self, booking: Booking) -> Result<UpsertOutcome, ServiceError>;

    async fn get(&self, booking_reference: &str) -> Result<Option<Booking>, ServiceError>;

    /// Number of bookings currently stored
    async fn count(&self) -> Result<usize, ServiceError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<DashMap<String, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn upsert(&self, booking: Booking) -> Result<UpsertOutcome, ServiceError> {
        let previous = self
            .bookings
            .insert(booking.booking_reference.clone(), booking);
        Ok(if previous.is_none() {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn get(&self, booking_reference: &str) -> Result<Option<Booking>, ServiceError> {
        Ok(self
            .bookings
            .get(booking_reference)
            .map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.bookings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, DateRange, PaymentStatus};
    use crate::pricing::BagQuantities;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn booking(reference: &str, total: rust_decimal::Decimal) -> Booking {
        Booking {
            booking_reference: reference.to_string(),
            customer: Customer {
                name: "Ada Rossi".to_string(),
                email: Some("ada@example.com".to_string()),
                phone: None,
            },
            schedule: DateRange {
                drop_off_date: "2024-03-10".to_string(),
                drop_off_time: None,
                pick_up_date: "2024-03-12".to_string(),
                pick_up_time: None,
            },
            quantities: BagQuantities::new(1, 0, 0),
            billable_days: 3,
            per_day_subtotal: dec!(5),
            total_price: total,
            payment_status: PaymentStatus::Paid,
            provider_session_id: "cs_test_1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn replayed_upsert_keeps_one_record() {
        let store = InMemoryBookingStore::new();

        let first = store.upsert(booking("LDR-AAAA2222", dec!(15))).await.unwrap();
        let second = store.upsert(booking("LDR-AAAA2222", dec!(15))).await.unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_the_stored_record() {
        let store = InMemoryBookingStore::new();

        store.upsert(booking("LDR-BBBB3333", dec!(15))).await.unwrap();
        store.upsert(booking("LDR-BBBB3333", dec!(30))).await.unwrap();

        let stored = store.get("LDR-BBBB3333").await.unwrap().unwrap();
        assert_eq!(stored.total_price, dec!(30));
    }

    #[tokio::test]
    async fn missing_reference_reads_none() {
        let store = InMemoryBookingStore::new();
        assert!(store.get("LDR-MISSING2").await.unwrap().is_none());
    }
}

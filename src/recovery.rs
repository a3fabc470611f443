//! Post-redirect recovery for the booking client.
//!
//! After checkout the provider sends the browser back with a session token in
//! the URL. Depending on how the site is hosted the token lands either in the
//! ordinary query string or behind the fragment router's own `?`, so the
//! extraction here checks both shapes. The state machine resolves what a
//! freshly loaded page should show: verify a token exactly once, cache the
//! confirmed booking, and answer reloads from the cache without touching the
//! network again.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;
use crate::models::Booking;
use crate::services::verification::VerifiedSession;

/// Key under which the last confirmed booking is cached client-side
pub const CACHED_BOOKING_KEY: &str = "ldr_latest_booking";

const SESSION_PARAM: &str = "session_id";

/// Pulls the session token out of a location, checking the plain query
/// string first and then a query embedded in the fragment
/// (`/#/success?session_id=...`).
pub fn extract_session_token(location: &str) -> Option<String> {
    let (base, fragment) = match location.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (location, None),
    };

    if let Some((_, query)) = base.split_once('?') {
        if let Some(token) = token_from_query(query) {
            return Some(token);
        }
    }

    fragment
        .and_then(|fragment| fragment.split_once('?'))
        .and_then(|(_, query)| token_from_query(query))
}

/// The same location with the session token removed from whichever part
/// carried it, so a reload does not re-trigger verification.
pub fn cleaned_location(location: &str) -> String {
    match location.split_once('#') {
        Some((base, fragment)) => format!(
            "{}#{}",
            without_session_param(base),
            without_session_param(fragment)
        ),
        None => without_session_param(location),
    }
}

fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SESSION_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn without_session_param(part: &str) -> String {
    let Some((path, query)) = part.split_once('?') else {
        return part.to_string();
    };
    let mut remaining = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key != SESSION_PARAM {
            remaining.append_pair(&key, &value);
        }
    }
    let remaining = remaining.finish();
    if remaining.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, remaining)
    }
}

/// What the page should render after recovery resolves
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryState {
    CollectingInput,
    AwaitingVerification,
    Confirmed(Booking),
    Failed(RecoveryFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryFailure {
    /// The session exists but the payment never completed
    PaymentNotCompleted,
    /// The verifier call itself failed
    VerificationFailed(String),
}

/// Network side of recovery, implemented over the session verifier
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, session_id: &str) -> Result<VerifiedSession, ServiceError>;
}

/// Local cache holding the last confirmed booking across reloads
pub trait BookingCache: Send + Sync {
    fn load(&self) -> Option<Booking>;
    fn store(&self, booking: &Booking);
    fn clear(&self);
}

pub struct RecoveryMachine {
    verifier: Arc<dyn SessionVerifier>,
    cache: Arc<dyn BookingCache>,
    state: RecoveryState,
}

impl RecoveryMachine {
    pub fn new(verifier: Arc<dyn SessionVerifier>, cache: Arc<dyn BookingCache>) -> Self {
        Self {
            verifier,
            cache,
            state: RecoveryState::CollectingInput,
        }
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Resolves the state for a page load at `location`.
    ///
    /// A token in the URL is verified over the network exactly once and the
    /// confirmed booking cached. Without a token the cache alone decides, so
    /// reloading a cleaned URL never re-contacts the provider.
    #[instrument(skip(self))]
    pub async fn on_load(&mut self, location: &str) -> &RecoveryState {
        let Some(token) = extract_session_token(location) else {
            self.state = match self.cache.load() {
                Some(booking) => {
                    debug!(
                        booking_reference = %booking.booking_reference,
                        "Restored confirmed booking from cache"
                    );
                    RecoveryState::Confirmed(booking)
                }
                None => RecoveryState::CollectingInput,
            };
            return &self.state;
        };

        self.state = RecoveryState::AwaitingVerification;
        self.state = match self.verifier.verify(&token).await {
            Ok(VerifiedSession::Paid(booking)) => {
                self.cache.store(&booking);
                RecoveryState::Confirmed(booking)
            }
            Ok(VerifiedSession::Unpaid) => {
                warn!("Returned session is not paid");
                RecoveryState::Failed(RecoveryFailure::PaymentNotCompleted)
            }
            Err(e) => {
                warn!("Session verification failed: {}", e);
                RecoveryState::Failed(RecoveryFailure::VerificationFailed(e.to_string()))
            }
        };
        &self.state
    }

    /// Clears the cache and returns to input collection from any state.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.state = RecoveryState::CollectingInput;
    }
}

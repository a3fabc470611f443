// Thin Stripe Checkout client: create and retrieve sessions over the REST
// API. One client per process, injected where needed.

pub mod webhook;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::errors::ServiceError;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// One hosted-checkout line item, already priced in minor units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// Everything needed to open a hosted checkout session
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub line_items: Vec<LineItem>,
    pub metadata: HashMap<String, String>,
}

/// The subset of Stripe's Checkout Session object this service reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[redacted]")
            .finish()
    }
}

impl StripeClient {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// Creates one checkout session. Never retried: a duplicate call opens a
    /// duplicate session, and the caller owns that decision.
    #[instrument(skip(self, params), fields(line_items = params.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<CheckoutSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let form = form_pairs(params);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!("checkout session create failed: {}", e);
                ServiceError::ExternalServiceError(format!("session create: {}", e))
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("session create body: {}", e))
        })?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                ServiceError::SerializationError(format!("checkout session payload: {}", e))
            });
        }

        // A create call has no resource to be missing; keep the failure in
        // the upstream bucket whatever Stripe answered.
        Err(match classify_error(status, &body) {
            ServiceError::NotFound(message) => ServiceError::ExternalServiceError(message),
            other => other,
        })
    }

    /// Fetches a session by id. Read-only, so a transient failure gets one
    /// retry before giving up.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, ServiceError> {
        match self.try_retrieve(session_id).await {
            Err(err) if is_transient(&err) => {
                warn!(session_id, error = %err, "session retrieve failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.try_retrieve(session_id).await
            }
            other => other,
        }
    }

    async fn try_retrieve(&self, session_id: &str) -> Result<CheckoutSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, session_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("session retrieve: {}", e)))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("session retrieve body: {}", e))
        })?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                ServiceError::SerializationError(format!("checkout session payload: {}", e))
            });
        }
        Err(classify_error(status, &body))
    }
}

fn is_transient(err: &ServiceError) -> bool {
    matches!(err, ServiceError::ExternalServiceError(_))
}

/// Stripe's bracket-style form encoding for the session create call
fn form_pairs(params: &CreateSessionParams) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        ("customer_email".to_string(), params.customer_email.clone()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
    ];
    for (i, item) in params.line_items.iter().enumerate() {
        pairs.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        pairs.push((
            format!("line_items[{}][price_data][currency]", i),
            "eur".to_string(),
        ));
        pairs.push((
            format!("line_items[{}][price_data][unit_amount]", i),
            item.unit_amount_minor.to_string(),
        ));
        pairs.push((
            format!("line_items[{}][price_data][product_data][name]", i),
            item.name.clone(),
        ));
        if let Some(description) = &item.description {
            pairs.push((
                format!("line_items[{}][price_data][product_data][description]", i),
                description.clone(),
            ));
        }
    }
    // Sorted for a stable wire shape
    let metadata: BTreeMap<_, _> = params.metadata.iter().collect();
    for (key, value) in metadata {
        pairs.push((format!("metadata[{}]", key), value.clone()));
    }
    pairs
}

fn classify_error(status: StatusCode, body: &[u8]) -> ServiceError {
    let parsed: Option<StripeErrorEnvelope> = serde_json::from_slice(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|e| e.error.code.as_deref())
        .unwrap_or("");
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("status {}", status));

    if status == StatusCode::NOT_FOUND || code == "resource_missing" {
        ServiceError::NotFound(format!("checkout session: {}", message))
    } else {
        ServiceError::ExternalServiceError(format!("stripe {}: {}", status, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CreateSessionParams {
        CreateSessionParams {
            success_url: "https://shop.example/#/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.example/#/".to_string(),
            customer_email: "ada@example.com".to_string(),
            line_items: vec![
                LineItem {
                    name: "Small Luggage Storage (3 days)".to_string(),
                    description: Some("Booking LDR-7XKQ2MNP (3 days)".to_string()),
                    unit_amount_minor: 1500,
                    quantity: 2,
                },
                LineItem {
                    name: "Medium Luggage Storage (3 days)".to_string(),
                    description: None,
                    unit_amount_minor: 1800,
                    quantity: 1,
                },
            ],
            metadata: HashMap::from([
                ("bookingReference".to_string(), "LDR-7XKQ2MNP".to_string()),
                ("customerName".to_string(), "Ada".to_string()),
            ]),
        }
    }

    #[test]
    fn form_encoding_uses_stripe_bracket_syntax() {
        let pairs = form_pairs(&sample_params());
        let find = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(find("mode"), Some("payment"));
        assert_eq!(find("payment_method_types[0]"), Some("card"));
        assert_eq!(find("line_items[0][quantity]"), Some("2"));
        assert_eq!(find("line_items[0][price_data][unit_amount]"), Some("1500"));
        assert_eq!(
            find("line_items[1][price_data][product_data][name]"),
            Some("Medium Luggage Storage (3 days)")
        );
        assert_eq!(
            find("line_items[0][price_data][product_data][description]"),
            Some("Booking LDR-7XKQ2MNP (3 days)")
        );
        assert_eq!(
            find("line_items[1][price_data][product_data][description]"),
            None
        );
        assert_eq!(find("metadata[bookingReference]"), Some("LDR-7XKQ2MNP"));
        assert_eq!(
            find("success_url"),
            Some("https://shop.example/#/success?session_id={CHECKOUT_SESSION_ID}")
        );
    }

    #[test]
    fn metadata_pairs_are_sorted() {
        let pairs = form_pairs(&sample_params());
        let metadata_keys: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k.starts_with("metadata["))
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(
            metadata_keys,
            vec!["metadata[bookingReference]", "metadata[customerName]"]
        );
    }

    #[test]
    fn unknown_session_classifies_as_not_found() {
        let body = br#"{"error":{"code":"resource_missing","message":"No such checkout.session: 'cs_x'"}}"#;
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, body),
            ServiceError::NotFound(_)
        ));
        // Some deployments answer 400 with the same code
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn server_errors_classify_as_external() {
        assert!(matches!(
            classify_error(StatusCode::INTERNAL_SERVER_ERROR, b"oops"),
            ServiceError::ExternalServiceError(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, b"{}"),
            ServiceError::ExternalServiceError(_)
        ));
    }

    #[test]
    fn session_payload_deserializes() {
        let body = r#"{
            "id": "cs_test_123",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123",
            "payment_status": "unpaid",
            "amount_total": 4800,
            "currency": "eur",
            "created": 1710000000,
            "metadata": {"bookingReference": "LDR-7XKQ2MNP"},
            "customer_details": null
        }"#;
        let session: CheckoutSession = serde_json::from_str(body).unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert!(!session.is_paid());
        assert_eq!(session.amount_total, Some(4800));
        assert_eq!(
            session.metadata.get("bookingReference").map(String::as_str),
            Some("LDR-7XKQ2MNP")
        );
    }

    #[test]
    fn debug_output_redacts_the_secret_key() {
        let client = StripeClient::new(
            reqwest::Client::new(),
            "https://api.stripe.com",
            "sk_test_secret",
        );
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk_test_secret"));
        assert!(rendered.contains("[redacted]"));
    }
}

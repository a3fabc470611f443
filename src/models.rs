// Core records and the metadata contract that stands in for a database.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::pricing::BagQuantities;

/// Contact details collected with the booking form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phone: Option<String>,
}

/// Storage period; the times are display-only and never affect billing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub drop_off_date: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub drop_off_time: Option<String>,
    pub pick_up_date: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pick_up_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// The reconciled booking record, rebuilt from provider session data by the
/// verifier and the webhook processor. `payment_status` never moves backward
/// from `Paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_reference: String,
    pub customer: Customer,
    #[serde(flatten)]
    pub schedule: DateRange,
    pub quantities: BagQuantities,
    pub billable_days: i64,
    pub per_day_subtotal: Decimal,
    pub total_price: Decimal,
    pub payment_status: PaymentStatus,
    pub provider_session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Booking form submission
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub bag_quantities: BagQuantities,
    #[validate(length(min = 1, message = "dropOffDate is required"))]
    pub drop_off_date: String,
    #[serde(default)]
    pub drop_off_time: Option<String>,
    #[validate(length(min = 1, message = "pickUpDate is required"))]
    pub pick_up_date: String,
    #[serde(default)]
    pub pick_up_time: Option<String>,
    #[validate(length(min = 1, message = "customerName is required"))]
    pub customer_name: String,
    #[validate(email(message = "customerEmail must be a valid email address"))]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

/// Successful checkout-session creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    /// Hosted payment page the browser should navigate to
    pub redirect_url: String,
    pub session_id: String,
}

/// Verification outcome as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    /// "paid" or "unpaid"
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub booking: Option<Booking>,
}

/// Webhook acknowledgement body
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("missing metadata field: {0}")]
    MissingField(&'static str),
    #[error("invalid metadata field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
    #[error("unsupported metadata schema version: {0}")]
    UnsupportedVersion(String),
}

/// The booking intent carried on the provider session as flat string
/// key/value pairs. This payload is the only channel between checkout-session
/// creation and everything downstream; there is no database both sides could
/// rely on. Versioned via the `schemaVersion` key.
///
/// The priced copies (`billable_days`, `per_day_subtotal`, `total_price`) are
/// cross-check values: readers recompute from the dates and quantities and
/// warn on disagreement instead of trusting them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetadata {
    pub booking_reference: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub schedule: DateRange,
    pub quantities: BagQuantities,
    pub billable_days: Option<i64>,
    pub per_day_subtotal: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub site_url: Option<String>,
}

impl SessionMetadata {
    pub const SCHEMA_VERSION: &'static str = "1";

    /// Flat string map for the provider's metadata field
    pub fn to_map(&self) -> Result<HashMap<String, String>, MetadataError> {
        let quantities_json =
            serde_json::to_string(&self.quantities).map_err(|e| MetadataError::InvalidField {
                field: "quantities",
                reason: e.to_string(),
            })?;

        let mut map = HashMap::new();
        map.insert("schemaVersion".to_string(), Self::SCHEMA_VERSION.to_string());
        if let Some(reference) = &self.booking_reference {
            map.insert("bookingReference".to_string(), reference.clone());
        }
        map.insert("customerName".to_string(), self.customer_name.clone());
        if let Some(email) = &self.customer_email {
            map.insert("customerEmail".to_string(), email.clone());
        }
        if let Some(phone) = &self.customer_phone {
            map.insert("customerPhone".to_string(), phone.clone());
        }
        map.insert("dropOffDate".to_string(), self.schedule.drop_off_date.clone());
        if let Some(time) = &self.schedule.drop_off_time {
            map.insert("dropOffTime".to_string(), time.clone());
        }
        map.insert("pickUpDate".to_string(), self.schedule.pick_up_date.clone());
        if let Some(time) = &self.schedule.pick_up_time {
            map.insert("pickUpTime".to_string(), time.clone());
        }
        map.insert("quantities".to_string(), quantities_json);
        if let Some(days) = self.billable_days {
            map.insert("billableDays".to_string(), days.to_string());
        }
        if let Some(per_day) = self.per_day_subtotal {
            map.insert("perDaySubtotal".to_string(), per_day.to_string());
        }
        if let Some(total) = self.total_price {
            map.insert("totalPrice".to_string(), total.to_string());
        }
        if let Some(site) = &self.site_url {
            map.insert("siteUrl".to_string(), site.clone());
        }
        Ok(map)
    }

    /// Strict decode of a provider metadata map. The required keys are the
    /// ones a booking cannot be rebuilt without; the priced copies parse
    /// leniently since they are only used for cross-checking.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, MetadataError> {
        match map.get("schemaVersion").map(String::as_str) {
            // Absent means a session created before the contract was versioned
            None | Some(Self::SCHEMA_VERSION) => {}
            Some(other) => return Err(MetadataError::UnsupportedVersion(other.to_string())),
        }

        let required = |field: &'static str| -> Result<String, MetadataError> {
            map.get(field)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or(MetadataError::MissingField(field))
        };
        let optional =
            |field: &str| -> Option<String> { map.get(field).filter(|v| !v.is_empty()).cloned() };

        let quantities_raw = required("quantities")?;
        let quantities: BagQuantities = serde_json::from_str(&quantities_raw).map_err(|e| {
            MetadataError::InvalidField {
                field: "quantities",
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            booking_reference: optional("bookingReference"),
            customer_name: required("customerName")?,
            customer_email: optional("customerEmail"),
            customer_phone: optional("customerPhone"),
            schedule: DateRange {
                drop_off_date: required("dropOffDate")?,
                drop_off_time: optional("dropOffTime"),
                pick_up_date: required("pickUpDate")?,
                pick_up_time: optional("pickUpTime"),
            },
            quantities,
            billable_days: optional("billableDays").and_then(|v| v.parse().ok()),
            per_day_subtotal: optional("perDaySubtotal").and_then(|v| v.parse().ok()),
            total_price: optional("totalPrice").and_then(|v| v.parse().ok()),
            site_url: optional("siteUrl"),
        })
    }
}

//! Google Wallet pass issuance: a generic pass object carrying the booking
//! reference, storage dates and a QR code that points back at the verifier.
//! Credentials are optional; without them the endpoint answers 503 naming
//! the missing settings instead of failing mid-call.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::WalletConfig;
use crate::errors::ServiceError;

const WALLET_SCOPE: &str = "https://www.googleapis.com/auth/wallet_object.issuer";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SAVE_URL_BASE: &str = "https://pay.google.com/gp/v/save";
const CLASS_SUFFIX: &str = "luggage_deposit_rome_booking";
const LOGO_URI: &str = "https://cdn.shopify.com/s/files/1/0753/8144/0861/files/cropped-Untitled-design-2025-09-11T094640.576_1.png?v=1765462614";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletPassRequest {
    #[validate(length(min = 1, message = "bookingReference is required"))]
    pub booking_reference: String,
    #[serde(default)]
    pub small: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub large: u32,
    #[serde(default)]
    pub drop_off_date: Option<String>,
    #[serde(default)]
    pub pick_up_date: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Encoded into the pass QR code so staff can scan straight into the
    /// session verifier
    #[serde(default)]
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletPassResponse {
    pub save_url: String,
    pub object_id: String,
}

#[derive(Serialize)]
struct AccessTokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct SaveToWalletClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    typ: &'a str,
    iat: i64,
    payload: Value,
}

#[derive(Clone)]
pub struct WalletService {
    client: reqwest::Client,
    config: Option<WalletConfig>,
    missing_settings: Vec<&'static str>,
}

impl WalletService {
    pub fn new(
        client: reqwest::Client,
        config: Option<WalletConfig>,
        missing_settings: Vec<&'static str>,
    ) -> Self {
        Self {
            client,
            config,
            missing_settings,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Upserts the pass object with Google and returns the save link
    #[instrument(skip(self, request), fields(booking_reference = %request.booking_reference))]
    pub async fn issue_pass(
        &self,
        request: WalletPassRequest,
    ) -> Result<WalletPassResponse, ServiceError> {
        let config = self.config.as_ref().ok_or_else(|| {
            ServiceError::NotConfigured(format!(
                "Google Wallet configuration missing: {}",
                self.missing_settings.join(", ")
            ))
        })?;

        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(config.private_key_pem.as_bytes())
            .map_err(|e| {
                ServiceError::NotConfigured(format!("Wallet private key unusable: {}", e))
            })?;

        let access_token = self.access_token(config, &encoding_key).await?;

        let object_id = format!(
            "{}.{}",
            config.issuer_id,
            sanitize_reference(&request.booking_reference)
        );
        let class_id = format!("{}.{}", config.issuer_id, CLASS_SUFFIX);
        let object = generic_object(&request, &object_id, &class_id);

        self.upsert_object(config, &access_token, &object_id, &object)
            .await?;

        let claims = SaveToWalletClaims {
            iss: &config.service_account_email,
            aud: "google",
            typ: "savetowallet",
            iat: chrono::Utc::now().timestamp(),
            payload: json!({"genericObjects": [{"id": object_id}]}),
        };
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("savetowallet token: {}", e)))?;

        Ok(WalletPassResponse {
            save_url: format!("{}/{}", SAVE_URL_BASE, token),
            object_id,
        })
    }

    async fn access_token(
        &self,
        config: &WalletConfig,
        key: &EncodingKey,
    ) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessTokenClaims {
            iss: &config.service_account_email,
            scope: WALLET_SCOPE,
            aud: &config.token_url,
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(|e| ServiceError::InternalError(format!("wallet auth token: {}", e)))?;

        let response = self
            .client
            .post(&config.token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google auth: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google auth body: {}", e)))?;

        if !status.is_success() {
            let detail = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ServiceError::ExternalServiceError(format!(
                "Google auth: {}",
                detail
            )));
        }

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(
                    "Google auth response missing access_token".to_string(),
                )
            })
    }

    /// PATCH when the object already exists, POST on 404
    async fn upsert_object(
        &self,
        config: &WalletConfig,
        access_token: &str,
        object_id: &str,
        object: &Value,
    ) -> Result<(), ServiceError> {
        let object_url = format!(
            "{}/genericObject/{}",
            config.objects_base.trim_end_matches('/'),
            object_id
        );

        let existing = self
            .client
            .get(&object_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("wallet object get: {}", e)))?;

        let status = existing.status();
        if status.is_success() {
            let response = self
                .client
                .patch(&object_url)
                .bearer_auth(access_token)
                .json(object)
                .send()
                .await
                .map_err(|e| {
                    ServiceError::ExternalServiceError(format!("wallet object patch: {}", e))
                })?;
            return error_for_status(response, "update wallet object").await;
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            let create_url = format!(
                "{}/genericObject",
                config.objects_base.trim_end_matches('/')
            );
            let response = self
                .client
                .post(&create_url)
                .bearer_auth(access_token)
                .json(object)
                .send()
                .await
                .map_err(|e| {
                    ServiceError::ExternalServiceError(format!("wallet object post: {}", e))
                })?;
            return error_for_status(response, "create wallet object").await;
        }

        let body = existing.text().await.unwrap_or_default();
        Err(ServiceError::ExternalServiceError(format!(
            "wallet object lookup {}: {}",
            status, body
        )))
    }
}

async fn error_for_status(response: reqwest::Response, action: &str) -> Result<(), ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::ExternalServiceError(format!(
        "{} {}: {}",
        action, status, body
    )))
}

/// Wallet object ids only allow `[A-Za-z0-9._-]`; anything else becomes `_`
fn sanitize_reference(reference: &str) -> String {
    reference
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn bags_summary(request: &WalletPassRequest) -> String {
    let mut parts = Vec::new();
    if request.small > 0 {
        parts.push(format!("S:{}", request.small));
    }
    if request.medium > 0 {
        parts.push(format!("M:{}", request.medium));
    }
    if request.large > 0 {
        parts.push(format!("L:{}", request.large));
    }
    if parts.is_empty() {
        "No bags selected".to_string()
    } else {
        parts.join(" ")
    }
}

fn generic_object(request: &WalletPassRequest, object_id: &str, class_id: &str) -> Value {
    let reference = &request.booking_reference;
    let short_reference: String = reference.chars().take(16).collect();

    json!({
        "id": object_id,
        "classId": class_id,
        "genericType": "GENERIC_TYPE_UNSPECIFIED",
        "state": "ACTIVE",
        "cardTitle": {"defaultValue": {"language": "en", "value": "LUGGAGE DEPOSIT ROME"}},
        "header": {"defaultValue": {"language": "en", "value": "Luggage Storage"}},
        "subheader": {"defaultValue": {"language": "en", "value": request.customer_email.as_deref().unwrap_or("Guest")}},
        "logo": {"sourceUri": {"uri": LOGO_URI}},
        "hexBackgroundColor": "#064e3b",
        "barcode": {
            "type": "QR_CODE",
            "value": request.verify_url.as_deref().unwrap_or(reference),
            "alternateText": reference,
        },
        "textModulesData": [
            {"header": "Booking Ref", "body": short_reference, "id": "booking_id"},
            {"header": "Drop-off", "body": request.drop_off_date.as_deref().unwrap_or("—"), "id": "drop_off"},
            {"header": "Pick-up", "body": request.pick_up_date.as_deref().unwrap_or("—"), "id": "pick_up"},
            {"header": "Luggage", "body": bags_summary(request), "id": "bags"},
        ],
        "linksModuleData": {"uris": [
            {"uri": "https://maps.app.goo.gl/HxdE3NVp8KmcVcjt8", "description": "V. Gioberti, 42, Rome"},
            {"uri": "tel:+39064467843", "description": "Call Support"},
        ]},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WalletPassRequest {
        WalletPassRequest {
            booking_reference: "LDR-7XKQ2MNP".to_string(),
            small: 2,
            medium: 1,
            large: 0,
            drop_off_date: Some("2024-03-10".to_string()),
            pick_up_date: Some("2024-03-12".to_string()),
            customer_email: Some("ada@example.com".to_string()),
            verify_url: Some(
                "https://luggagedepositrome.com/#/success?session_id=cs_test_1".to_string(),
            ),
        }
    }

    #[test]
    fn reference_sanitizing_replaces_unsafe_characters() {
        assert_eq!(sanitize_reference("LDR-7XKQ2MNP"), "LDR-7XKQ2MNP");
        assert_eq!(sanitize_reference("ref with spaces!"), "ref_with_spaces_");
        assert_eq!(sanitize_reference("a.b/c"), "a_b_c");
    }

    #[test]
    fn bag_summary_skips_zero_sizes() {
        assert_eq!(bags_summary(&request()), "S:2 M:1");

        let empty = WalletPassRequest {
            small: 0,
            medium: 0,
            large: 0,
            ..request()
        };
        assert_eq!(bags_summary(&empty), "No bags selected");
    }

    #[test]
    fn object_carries_reference_dates_and_qr_target() {
        let req = request();
        let object = generic_object(&req, "3388.LDR-7XKQ2MNP", "3388.luggage_deposit_rome_booking");

        assert_eq!(object["id"], "3388.LDR-7XKQ2MNP");
        assert_eq!(object["classId"], "3388.luggage_deposit_rome_booking");
        assert_eq!(
            object["barcode"]["value"],
            "https://luggagedepositrome.com/#/success?session_id=cs_test_1"
        );
        assert_eq!(object["barcode"]["alternateText"], "LDR-7XKQ2MNP");
        assert_eq!(object["textModulesData"][1]["body"], "2024-03-10");
        assert_eq!(object["textModulesData"][3]["body"], "S:2 M:1");
    }

    #[test]
    fn qr_falls_back_to_the_reference() {
        let req = WalletPassRequest {
            verify_url: None,
            ..request()
        };
        let object = generic_object(&req, "3388.LDR-7XKQ2MNP", "3388.c");
        assert_eq!(object["barcode"]["value"], "LDR-7XKQ2MNP");
    }

    #[tokio::test]
    async fn unconfigured_service_names_missing_settings() {
        let service = WalletService::new(
            reqwest::Client::new(),
            None,
            vec!["APP__WALLET_ISSUER_ID", "APP__WALLET_PRIVATE_KEY_PEM"],
        );

        let err = service.issue_pass(request()).await.unwrap_err();
        match err {
            ServiceError::NotConfigured(message) => {
                assert!(message.contains("APP__WALLET_ISSUER_ID"));
                assert!(message.contains("APP__WALLET_PRIVATE_KEY_PEM"));
            }
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unusable_private_key_is_a_configuration_error() {
        let config = WalletConfig {
            issuer_id: "3388000000012345678".to_string(),
            service_account_email: "wallet@project.iam.gserviceaccount.com".to_string(),
            private_key_pem: "not a pem".to_string(),
            token_url: "http://127.0.0.1:1/token".to_string(),
            objects_base: "http://127.0.0.1:1/walletobjects/v1".to_string(),
        };
        let service = WalletService::new(reqwest::Client::new(), Some(config), Vec::new());

        let err = service.issue_pass(request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}

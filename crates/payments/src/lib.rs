use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

mod intent;

pub use intent::{PaymentIntent, find_first_url};

pub const DEFAULT_API_BASE: &str = "https://api-v2.ziina.com/api";
pub const DEFAULT_CURRENCY: &str = "AED";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Substituted by Ziina with the real intent id when it redirects back.
pub const INTENT_ID_PLACEHOLDER: &str = "{PAYMENT_INTENT_ID}";

/// Token values that were copied from a template and never filled in.
const PLACEHOLDER_PREFIXES: [&str; 3] = ["PUT_", "REPLACE_", "YOUR_"];

/// True when `token` is non-empty and not an unfilled template value.
pub fn token_is_usable(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && !PLACEHOLDER_PREFIXES.iter().any(|p| token.starts_with(p))
}

/// Convert a major-unit amount (AED) to minor units (fils).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_base: String,
    pub access_token: Option<String>,
    /// Public base URL of this app; the provider redirects back here.
    pub return_base_url: String,
    pub test_mode: bool,
    pub currency: String,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: None,
            return_base_url: "http://localhost:8000".to_string(),
            test_mode: false,
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Where the provider sends the visitor after each outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub success: String,
    pub cancel: String,
    pub failure: String,
}

impl CallbackUrls {
    pub fn new(return_base_url: &str) -> Self {
        let base = return_base_url.trim_end_matches('/');
        let url = |result: &str| {
            format!("{base}/payment_result?result={result}&pi_id={INTENT_ID_PLACEHOLDER}")
        };
        Self {
            success: url("success"),
            cancel: url("cancel"),
            failure: url("failure"),
        }
    }
}

// --- Ziina API request types ---

#[derive(Serialize)]
struct CreateIntentRequest<'a> {
    amount: i64,
    currency_code: &'a str,
    message: String,
    success_url: String,
    cancel_url: String,
    failure_url: String,
    test: bool,
}

// --- Public API ---

/// Thin client over the Ziina payment-intent API.
///
/// Failures never surface as errors: network problems, timeouts, non-success
/// statuses and unparseable bodies are logged and reported as `None`.
#[derive(Debug, Clone)]
pub struct ZiinaClient {
    http: reqwest::Client,
    options: ClientOptions,
}

impl ZiinaClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;
        Ok(Self { http, options })
    }

    pub fn is_configured(&self) -> bool {
        self.token().is_some()
    }

    pub fn test_mode(&self) -> bool {
        self.options.test_mode
    }

    pub fn callback_urls(&self) -> CallbackUrls {
        CallbackUrls::new(&self.options.return_base_url)
    }

    fn token(&self) -> Option<&str> {
        self.options
            .access_token
            .as_deref()
            .filter(|t| token_is_usable(t))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.options.api_base.trim_end_matches('/'))
    }

    /// Create a payment intent for `amount` (major units).
    pub async fn create_intent(
        &self,
        amount: Decimal,
        booking_id: &str,
        customer_name: &str,
    ) -> Option<PaymentIntent> {
        let Some(token) = self.token() else {
            warn!("Ziina access token missing; not creating payment intent for {booking_id}");
            return None;
        };
        let Some(minor) = to_minor_units(amount) else {
            error!("Amount {amount} for {booking_id} does not fit in minor units");
            return None;
        };

        let urls = self.callback_urls();
        let body = CreateIntentRequest {
            amount: minor,
            currency_code: &self.options.currency,
            message: format!("Snow Liwa booking {booking_id} - {customer_name}"),
            success_url: urls.success,
            cancel_url: urls.cancel,
            failure_url: urls.failure,
            test: self.options.test_mode,
        };

        let url = self.endpoint("payment_intent");
        info!("Ziina POST {url} (booking {booking_id}, {minor} minor units)");
        let request = self.http.post(&url).bearer_auth(token).json(&body);
        self.send(request, &[200, 201]).await
    }

    pub async fn get_intent(&self, id: &str) -> Option<PaymentIntent> {
        let token = self.token()?;
        let url = self.endpoint(&format!("payment_intent/{id}"));
        info!("Ziina GET {url}");
        let request = self.http.get(&url).bearer_auth(token);
        self.send(request, &[200]).await
    }

    pub async fn get_status(&self, id: &str) -> Option<String> {
        self.get_intent(id).await?.status
    }

    async fn send(&self, request: reqwest::RequestBuilder, accepted: &[u16]) -> Option<PaymentIntent> {
        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Ziina request error: {e}");
                return None;
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                error!("Ziina response read error: {e}");
                return None;
            }
        };
        if !accepted.contains(&status.as_u16()) {
            error!("Ziina error status={} body={text}", status.as_u16());
            return None;
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(PaymentIntent::from_value(value)),
            Err(e) => {
                error!("Ziina returned unparseable body: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ZiinaClient {
        ZiinaClient::new(ClientOptions {
            api_base: base_url.to_string(),
            access_token: Some("tok_live_abc".to_string()),
            return_base_url: "https://liwa.example/".to_string(),
            test_mode: true,
            timeout: Duration::from_millis(500),
            ..ClientOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn placeholder_tokens_are_not_usable() {
        for token in ["", "   ", "YOUR_TOKEN", "PUT_TOKEN_HERE", "REPLACE_ME"] {
            assert!(!token_is_usable(token), "{token:?}");
        }
        for token in ["tok_123", "live_abc", "x"] {
            assert!(token_is_usable(token), "{token:?}");
        }
    }

    #[test]
    fn unconfigured_client_reports_false() {
        let client = ZiinaClient::new(ClientOptions::default()).unwrap();
        assert!(!client.is_configured());
        let client = ZiinaClient::new(ClientOptions {
            access_token: Some("REPLACE_ME".to_string()),
            ..ClientOptions::default()
        })
        .unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn minor_units_round_to_nearest_fils() {
        assert_eq!(to_minor_units(Decimal::from(350)), Some(35000));
        assert_eq!(to_minor_units(Decimal::from_str("12.344").unwrap()), Some(1234));
        assert_eq!(to_minor_units(Decimal::from_str("12.346").unwrap()), Some(1235));
    }

    #[test]
    fn callback_urls_embed_placeholder() {
        let urls = CallbackUrls::new("https://liwa.example/");
        assert_eq!(
            urls.success,
            "https://liwa.example/payment_result?result=success&pi_id={PAYMENT_INTENT_ID}"
        );
        assert!(urls.cancel.contains("result=cancel"));
        assert!(urls.failure.contains("result=failure"));
    }

    #[tokio::test]
    async fn create_intent_sends_expected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment_intent"))
            .and(header("authorization", "Bearer tok_live_abc"))
            .and(body_partial_json(json!({
                "amount": 35000,
                "currency_code": "AED",
                "message": "Snow Liwa booking SL-20261019-001 - Mariam",
                "success_url": "https://liwa.example/payment_result?result=success&pi_id={PAYMENT_INTENT_ID}",
                "test": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pi_abc",
                "status": "requires_payment_instrument",
                "redirect_url": "https://pay.ziina.com/payment_intent/pi_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let pi = client
            .create_intent(Decimal::from(350), "SL-20261019-001", "Mariam")
            .await
            .unwrap();
        assert_eq!(pi.id.as_deref(), Some("pi_abc"));
        assert_eq!(
            pi.redirect_url.as_deref(),
            Some("https://pay.ziina.com/payment_intent/pi_abc")
        );
    }

    #[tokio::test]
    async fn create_intent_returns_none_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment_intent"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "bad amount"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.create_intent(Decimal::ONE, "SL-1", "A").await.is_none());
    }

    #[tokio::test]
    async fn create_intent_returns_none_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "pi_slow"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.create_intent(Decimal::ONE, "SL-1", "A").await.is_none());
    }

    #[tokio::test]
    async fn unconfigured_client_never_calls_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "pi_x"})))
            .expect(0)
            .mount(&server)
            .await;

        let client = ZiinaClient::new(ClientOptions {
            api_base: server.uri(),
            access_token: Some("YOUR_TOKEN".to_string()),
            ..ClientOptions::default()
        })
        .unwrap();
        assert!(client.create_intent(Decimal::ONE, "SL-1", "A").await.is_none());
        assert!(client.get_intent("pi_x").await.is_none());
    }

    #[tokio::test]
    async fn get_status_reads_nested_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payment_intent/pi_abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"id": "pi_abc", "status": "completed"}})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(client.get_status("pi_abc").await.as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn get_intent_rejects_created_status_and_garbage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payment_intent/pi_201"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "pi_201"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/payment_intent/pi_html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.get_intent("pi_201").await.is_none());
        assert!(client.get_intent("pi_html").await.is_none());
    }
}

use crate::domain::ports::CheckoutGateway;
use crate::domain::session::{
    CheckoutRequest, CheckoutSession, CreatedSession, SessionPaymentStatus,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Checkout gateway backed by Stripe's hosted Checkout Sessions API.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    sessions_url: Url,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    payment_status: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<StripeSession> for CheckoutSession {
    fn from(session: StripeSession) -> Self {
        let customer_email = session
            .customer_email
            .or_else(|| session.customer_details.and_then(|details| details.email));
        CheckoutSession {
            session_id: session.id,
            payment_status: SessionPaymentStatus::from_provider(&session.payment_status),
            payment_intent_id: session.payment_intent,
            amount_total: session.amount_total.unwrap_or_default(),
            currency: session.currency.unwrap_or_default(),
            customer_email,
            metadata: session.metadata,
        }
    }
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let base = api_base.trim_end_matches('/');
        let sessions_url = Url::parse(&format!("{base}/v1/checkout/sessions")).map_err(|e| {
            GatewayError::Unavailable(format!("invalid checkout api base {base:?}: {e}"))
        })?;
        if sessions_url.cannot_be_a_base() {
            return Err(GatewayError::Unavailable(format!(
                "invalid checkout api base {base:?}"
            )));
        }
        Ok(Self {
            client,
            sessions_url,
            secret_key: secret_key.to_string(),
        })
    }

    /// The session resource URL, with the id percent-encoded as one path segment.
    fn session_url(&self, session_id: &str) -> Result<Url, GatewayError> {
        let mut url = self.sessions_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Unavailable("checkout api base cannot carry a path".into()))?
            .push(session_id);
        Ok(url)
    }

    /// Flattens a request into Stripe's bracketed form encoding.
    fn form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let item = &request.line_item;
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                item.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                item.unit_amount_minor_units.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                item.product_name.clone(),
            ),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];
        form.extend(
            request
                .metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
        );
        form
    }
}

/// Provider session ids are opaque tokens of ASCII letters, digits and underscores.
fn is_session_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Statuses that mean the provider could not serve us, as opposed to rejecting the call.
fn is_outage(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        )
}

fn transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Unavailable("request to checkout provider timed out".to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

async fn provider_error(response: reqwest::Response) -> StripeErrorDetail {
    match response.json::<StripeErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => StripeErrorDetail {
            code: None,
            message: None,
        },
    }
}

#[async_trait]
impl CheckoutGateway for StripeGateway {
    async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CreatedSession, GatewayError> {
        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(&self.secret_key)
            .form(&Self::form(request))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if is_outage(status) {
            return Err(GatewayError::Unavailable(format!(
                "checkout provider returned {status}"
            )));
        }
        if !status.is_success() {
            let detail = provider_error(response).await;
            return Err(GatewayError::Rejected(
                detail.message.unwrap_or_else(|| status.to_string()),
            ));
        }

        let session: StripeSession = response.json().await.map_err(transport)?;
        let url = session.url.ok_or_else(|| {
            GatewayError::Unavailable(format!("session {} has no checkout url", session.id))
        })?;
        debug!(session_id = %session.id, "checkout session created");
        Ok(CreatedSession {
            session_id: session.id,
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        if !is_session_id(session_id) {
            return Err(GatewayError::SessionNotFound(session_id.to_string()));
        }
        let response = self
            .client
            .get(self.session_url(session_id)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::SessionNotFound(session_id.to_string()));
        }
        if is_outage(status) {
            return Err(GatewayError::Unavailable(format!(
                "checkout provider returned {status}"
            )));
        }
        if !status.is_success() {
            let detail = provider_error(response).await;
            return match detail.code.as_deref() {
                Some("resource_missing") | None => {
                    Err(GatewayError::SessionNotFound(session_id.to_string()))
                }
                Some(_) => Err(GatewayError::Rejected(
                    detail.message.unwrap_or_else(|| status.to_string()),
                )),
            };
        }

        let session: StripeSession = response.json().await.map_err(transport)?;
        Ok(session.into())
    }
}

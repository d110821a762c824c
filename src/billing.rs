//! Billing provider abstraction and the Paddle transactions client.
//!
//! A checkout session is created by posting a one-item transaction for the
//! configured price. Paddle answers with a hosted checkout URL which the
//! subscribe page opens in its overlay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::BillingConfig;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("billing is not configured: {0} missing")]
    NotConfigured(&'static str),
    #[error("billing request failed: {0}")]
    Transport(String),
    #[error("billing provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("billing provider did not return a checkout URL")]
    MissingCheckoutUrl,
}

/// Who the checkout is for. Absent for the anonymous fixed-price flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub transaction_id: Option<String>,
    pub checkout_url: String,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;
}

// ============ Paddle ============

#[derive(Serialize)]
struct TransactionItem<'a> {
    price_id: &'a str,
    quantity: u32,
}

#[derive(Serialize)]
struct CustomData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateTransaction<'a> {
    items: Vec<TransactionItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_data: Option<CustomData<'a>>,
}

#[derive(Deserialize)]
struct TransactionEnvelope {
    data: Transaction,
}

#[derive(Deserialize)]
struct Transaction {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    checkout: Option<TransactionCheckout>,
}

#[derive(Deserialize)]
struct TransactionCheckout {
    #[serde(default)]
    url: Option<String>,
}

/// Creates transactions through `POST {api_base}/transactions`.
pub struct PaddleBilling {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    price_id: Option<String>,
}

impl PaddleBilling {
    pub fn new(config: &BillingConfig, timeout: Duration) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BillingError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            price_id: config.price_id.clone().filter(|p| !p.trim().is_empty()),
        })
    }

    fn request_body<'a>(price_id: &'a str, request: &'a CheckoutRequest) -> CreateTransaction<'a> {
        let custom_data = if request.user_id.is_some() || request.user_email.is_some() {
            Some(CustomData {
                user_id: request.user_id.as_deref(),
                user_email: request.user_email.as_deref(),
            })
        } else {
            None
        };
        CreateTransaction {
            items: vec![TransactionItem {
                price_id,
                quantity: 1,
            }],
            custom_data,
        }
    }
}

#[async_trait]
impl BillingProvider for PaddleBilling {
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(BillingError::NotConfigured("PADDLE_API_KEY"))?;
        let price_id = self
            .price_id
            .as_deref()
            .ok_or(BillingError::NotConfigured("PADDLE_PRICE_ID"))?;

        let resp = self
            .client
            .post(format!("{}/transactions", self.api_base))
            .bearer_auth(api_key)
            .json(&Self::request_body(price_id, &request))
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BillingError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TransactionEnvelope = resp
            .json()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        parse_session(envelope.data)
    }
}

fn parse_session(tx: Transaction) -> Result<CheckoutSession, BillingError> {
    let checkout_url = tx
        .checkout
        .and_then(|c| c.url)
        .filter(|u| !u.is_empty())
        .ok_or(BillingError::MissingCheckoutUrl)?;
    Ok(CheckoutSession {
        transaction_id: tx.id,
        checkout_url,
    })
}

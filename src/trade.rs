use crate::{
    config::Config, error::RunError, models::RunRequest, models::RunResponse,
    network::NetworkIdentity, session::SessionStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tracing::info;

/// The remote trade-execution collaborator. One call per run, no automatic
/// retry; that policy belongs to the orchestrator.
#[async_trait]
pub trait TradeService: Send + Sync {
    async fn run_bot(
        &self,
        network: NetworkIdentity,
        request: &RunRequest,
    ) -> Result<RunResponse, RunError>;
}

pub struct HttpTradeService {
    config: Config,
    http_client: Client,
    session: Arc<SessionStore>,
}

impl HttpTradeService {
    pub fn new(config: Config, session: Arc<SessionStore>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.rpc.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            session,
        })
    }
}

#[async_trait]
impl TradeService for HttpTradeService {
    async fn run_bot(
        &self,
        network: NetworkIdentity,
        request: &RunRequest,
    ) -> Result<RunResponse, RunError> {
        let token = self.session.auth_token().ok_or(RunError::Unauthorized)?;
        let api_url = network.trade_api_url(&self.config)?.to_string();

        info!("Running bot API call on {}", network);

        let body = json!({
            "amount": self.config.run.amount,
            "privatekey": request.private_key,
        });

        let response = self
            .http_client
            .post(&api_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RunError::TradeService {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            // Surface the remote error body's message when it has one.
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|b| b.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| format!("trade service returned {}", status));
            return Err(RunError::TradeService { message });
        }

        response
            .json::<RunResponse>()
            .await
            .map_err(|e| RunError::TradeService {
                message: e.to_string(),
            })
    }
}

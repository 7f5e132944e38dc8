//! HTTP client for the downstream payment processors.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{HealthCacheConfig, ProcessorConfig};
use crate::health::HealthProbe;
use crate::payments::PaymentRequest;
use crate::processor::pool::HttpPool;
use crate::processor::types::{ProcessorError, ProcessorPayment, ServiceHealth};
use crate::resilience::call_with_timeout;

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    call_timeout: Duration,
}

/// Submits payments and probes health through pooled clients.
#[derive(Debug)]
pub struct ProcessorClient {
    pool: Arc<HttpPool>,
    endpoints: HashMap<String, Endpoint>,
    health_path: String,
    probe_timeout: Duration,
}

impl ProcessorClient {
    pub fn new(pool: Arc<HttpPool>, processors: &[ProcessorConfig], health: &HealthCacheConfig) -> Self {
        let endpoints = processors
            .iter()
            .map(|p| {
                let endpoint = Endpoint {
                    base_url: p.base_url.trim_end_matches('/').to_string(),
                    call_timeout: p.call_timeout(),
                };
                (p.name.clone(), endpoint)
            })
            .collect();

        Self {
            pool,
            endpoints,
            health_path: health.path.clone(),
            probe_timeout: health.probe_timeout(),
        }
    }

    fn endpoint(&self, target: &str) -> Result<&Endpoint, ProcessorError> {
        self.endpoints
            .get(target)
            .ok_or_else(|| ProcessorError::UnknownTarget(target.to_string()))
    }

    /// `POST {base_url}/payments` under the target's hard call timeout.
    /// Any 2xx counts as success.
    pub async fn submit(&self, target: &str, payment: &PaymentRequest) -> Result<(), ProcessorError> {
        let endpoint = self.endpoint(target)?;
        let client = self.pool.get_connection(target)?;
        let url = format!("{}/payments", endpoint.base_url);
        let body = ProcessorPayment::new(payment, Utc::now());

        let deadline = endpoint.call_timeout;
        call_with_timeout(deadline, post_payment(client, url, body, deadline))
            .await
            .map_err(ProcessorError::from)
    }

    /// `GET {base_url}{health_path}` under the probe timeout.
    pub async fn service_health(&self, target: &str) -> Result<ServiceHealth, ProcessorError> {
        let endpoint = self.endpoint(target)?;
        let client = self.pool.get_connection(target)?;
        let url = format!("{}{}", endpoint.base_url, self.health_path);

        call_with_timeout(self.probe_timeout, fetch_health(client, url, self.probe_timeout))
            .await
            .map_err(ProcessorError::from)
    }
}

async fn post_payment(
    client: reqwest::Client,
    url: String,
    body: ProcessorPayment,
    deadline: Duration,
) -> Result<(), ProcessorError> {
    let response = client.post(url).json(&body).timeout(deadline).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProcessorError::Status(status.as_u16()));
    }
    Ok(())
}

async fn fetch_health(
    client: reqwest::Client,
    url: String,
    deadline: Duration,
) -> Result<ServiceHealth, ProcessorError> {
    let response = client.get(url).timeout(deadline).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProcessorError::Status(status.as_u16()));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProcessorError::Decode(e.to_string()))
}

#[async_trait]
impl HealthProbe for ProcessorClient {
    async fn probe(&self, target: &str) -> bool {
        match self.service_health(target).await {
            Ok(health) => {
                tracing::debug!(
                    target_name = %target,
                    failing = health.failing,
                    min_response_time = ?health.min_response_time,
                    "Health probe answered"
                );
                !health.failing
            }
            Err(e) => {
                tracing::warn!(target_name = %target, error = %e, "Health probe failed");
                false
            }
        }
    }
}

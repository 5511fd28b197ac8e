use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::delivery::DeliveryStatus;
use crate::observability::metrics::Metrics;
use crate::upstream::{
    AssignCourierBody, DeliveryBackend, Endpoint, UpdateStatusBody, UpstreamError, search_term,
};

/// [`DeliveryBackend`] over the real REST API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    metrics: Metrics,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            metrics,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<Response, UpstreamError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let start = Instant::now();
        let result = request.send().await;
        self.metrics
            .upstream_latency_seconds
            .with_label_values(&[endpoint.label()])
            .observe(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(status_error(endpoint, response).await),
            Err(err) => Err(UpstreamError::Transport {
                endpoint,
                message: err.to_string(),
            }),
        };

        let label = if outcome.is_ok() { "success" } else { "error" };
        self.metrics
            .upstream_requests_total
            .with_label_values(&[endpoint.label(), label])
            .inc();

        if let Err(err) = &outcome {
            warn!(endpoint = endpoint.label(), error = %err, "delivery api request failed");
        } else {
            debug!(endpoint = endpoint.label(), "delivery api request succeeded");
        }

        outcome
    }

    async fn get_json(
        &self,
        endpoint: Endpoint,
        path: &str,
        search: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let mut request = self.client.get(self.url(path));
        if let Some(term) = search_term(search) {
            request = request.query(&[("search", term)]);
        }

        let response = self.send(endpoint, request).await?;
        response
            .json::<Value>()
            .await
            .map_err(|err| UpstreamError::Decode {
                endpoint,
                message: err.to_string(),
            })
    }
}

async fn status_error(endpoint: Endpoint, response: Response) -> UpstreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    UpstreamError::Status {
        endpoint,
        status: status.as_u16(),
        message: extract_message(&body),
    }
}

/// Pulls `message` (or `error`) out of an error body.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl DeliveryBackend for HttpBackend {
    async fn personnel(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
        self.get_json(Endpoint::Personnel, "delivery/personnel", search)
            .await
    }

    async fn active_deliveries(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
        self.get_json(Endpoint::ActiveDeliveries, "delivery/active", search)
            .await
    }

    async fn assign_courier(
        &self,
        delivery_id: u64,
        courier_id: Option<u64>,
    ) -> Result<(), UpstreamError> {
        let request = self
            .client
            .post(self.url(&format!("delivery/assign/{delivery_id}")))
            .json(&AssignCourierBody {
                delivery_person_id: courier_id,
            });

        self.send(Endpoint::AssignCourier, request).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        delivery_id: u64,
        status: &DeliveryStatus,
    ) -> Result<(), UpstreamError> {
        let request = self
            .client
            .patch(self.url(&format!("delivery/status/{delivery_id}")))
            .json(&UpdateStatusBody {
                status: status.as_str().to_string(),
            });

        self.send(Endpoint::UpdateStatus, request).await?;
        Ok(())
    }

    async fn order(&self, order_id: u64) -> Result<Value, UpstreamError> {
        self.get_json(Endpoint::Order, &format!("orders/{order_id}"), None)
            .await
    }
}

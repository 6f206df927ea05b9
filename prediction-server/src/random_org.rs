use std::time::Duration;

use async_trait::async_trait;
use prediction_core::{PredictionError, RandomSource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// random.org JSON-RPC client drawing integers without replacement.
pub struct RandomOrgClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: GenerateIntegersParams<'a>,
    id: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIntegersParams<'a> {
    api_key: &'a str,
    n: usize,
    min: i32,
    max: i32,
    replacement: bool,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<RpcResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcResult {
    random: RandomData,
    requests_left: Option<i64>,
}

#[derive(Deserialize)]
struct RandomData {
    data: Vec<i32>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RandomOrgClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RandomSource for RandomOrgClient {
    async fn fetch_random_numbers(
        &self,
        count: usize,
        min: i32,
        max: i32,
    ) -> Result<Vec<i32>, PredictionError> {
        if self.api_key.is_empty() {
            return Err(PredictionError::ExternalService(
                "RANDOM_API_KEY is not configured".to_string(),
            ));
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "generateIntegers",
            params: GenerateIntegersParams {
                api_key: &self.api_key,
                n: count,
                min,
                max,
                replacement: false,
            },
            id: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("random.org request failed: {:?}", e);
                PredictionError::ExternalService(format!("Network error: {e}"))
            })?;

        if !response.status().is_success() {
            warn!("random.org returned status: {}", response.status());
            return Err(PredictionError::ExternalService(format!(
                "random.org returned {}",
                response.status()
            )));
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse random.org response: {:?}", e);
            PredictionError::ExternalService(format!("Malformed response: {e}"))
        })?;

        match (body.result, body.error) {
            (Some(result), _) => {
                if let Some(left) = result.requests_left {
                    debug!("random.org draw complete, {} requests left today", left);
                }
                Ok(result.random.data)
            }
            (None, Some(error)) => Err(PredictionError::ExternalService(format!(
                "API error {}: {}",
                error.code, error.message
            ))),
            (None, None) => Err(PredictionError::ExternalService(
                "Response had neither result nor error".to_string(),
            )),
        }
    }
}

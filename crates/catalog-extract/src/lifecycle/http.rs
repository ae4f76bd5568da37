//! HTTP client for the ETL control service.

use super::{LifecycleAck, LifecycleClient, ResultCode, RowCounts};
use crate::config::ControlApiConfig;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Body of `POST {base_url}/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub step_name: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST {base_url}/end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndRequest {
    pub step_name: String,
    pub result_code: ResultCode,
    pub counts: RowCounts,
}

/// Lifecycle client posting JSON events to the control service.
#[derive(Debug, Clone)]
pub struct HttpLifecycleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpLifecycleClient {
    pub fn new(config: &ControlApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ExtractError::Config(format!("control_api client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(&self, step_name: &str, path: &str, body: &T) -> Result<LifecycleAck> {
        let url = self.endpoint(path);
        debug!("POST {} for {}", url, step_name);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::lifecycle(step_name, format!("{} request failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            error!(status = %status, body = %body, "lifecycle {} request failed", path);
            return Err(ExtractError::lifecycle(
                step_name,
                format!("API returned status {}: {}", status, body),
            ));
        }

        response
            .json::<LifecycleAck>()
            .await
            .map_err(|e| ExtractError::lifecycle(step_name, format!("invalid {} response: {}", path, e)))
    }
}

#[async_trait]
impl LifecycleClient for HttpLifecycleClient {
    async fn start(&self, step_name: &str) -> Result<LifecycleAck> {
        let body = StartRequest {
            step_name: step_name.to_string(),
            parameters: serde_json::Map::new(),
        };
        self.post(step_name, "start", &body).await
    }

    async fn end(&self, step_name: &str, code: ResultCode, counts: RowCounts) -> Result<LifecycleAck> {
        let body = EndRequest {
            step_name: step_name.to_string(),
            result_code: code,
            counts,
        };
        self.post(step_name, "end", &body).await
    }
}

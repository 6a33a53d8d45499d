//! HTTP transport: `PUT {url}/{destination}/state` with a plain-text body

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::Publisher;
use crate::config::RestConfig;
use crate::error::PublishError;

pub struct RestPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl RestPublisher {
    pub fn new(config: &RestConfig) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn state_url(&self, destination: &str) -> String {
        format!("{}/{}/state", self.base_url, destination)
    }
}

#[async_trait]
impl Publisher for RestPublisher {
    async fn publish(&self, value: &str, destination: &str) -> Result<(), PublishError> {
        let url = self.state_url(destination);
        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(value.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status {
                url,
                status: status.as_u16(),
            });
        }
        debug!("PUT {} -> {} ({})", value, url, status);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

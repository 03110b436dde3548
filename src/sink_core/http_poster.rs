//! HTTP POST sink - one request per closed window

use super::writer_backend::{BatchSink, SinkError};
use crate::aggregator_core::Batch;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

pub struct HttpPoster {
    client: reqwest::Client,
    url: String,
}

impl HttpPoster {
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BatchSink for HttpPoster {
    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        let body = batch.to_json()?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Http(format!(
                "POST to {} returned {}",
                self.url,
                response.status()
            )));
        }

        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "HTTP"
    }
}

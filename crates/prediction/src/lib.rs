//! Remote prediction provider: the flow's only network surface.
//!
//! All three calls are asynchronous and carry no retry or queueing logic;
//! the single-outstanding-call discipline lives in the flow controller.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use shared::{
    domain::AgeRange,
    protocol::{FeedbackRecord, PredictResponse, Prediction},
};
use tracing::info;

/// Image bytes plus the metadata the multipart upload carries.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait PredictionProvider: Send + Sync {
    /// Submit an image, optionally with a narrowed range hint, for an age
    /// estimate.
    async fn predict(
        &self,
        image: &ImageUpload,
        range_hint: Option<AgeRange>,
    ) -> Result<Prediction>;

    /// Best-effort feedback record; callers log failures and move on.
    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<()>;

    /// Best-effort notice that the user discarded the selected image.
    async fn notify_image_removed(&self) -> Result<()>;
}

pub struct HttpPredictionClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPredictionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PredictionProvider for HttpPredictionClient {
    async fn predict(
        &self,
        image: &ImageUpload,
        range_hint: Option<AgeRange>,
    ) -> Result<Prediction> {
        let part = Part::bytes(image.bytes.clone()).file_name(image.filename.clone());
        let part = match &image.mime_type {
            Some(mime) => part.mime_str(mime)?,
            None => part,
        };
        let form = Form::new().part("image", part);

        let mut request = self
            .http
            .post(format!("{}/predict", self.base_url))
            .multipart(form);
        if let Some(range) = range_hint {
            request = request.query(&[("range_hint", range.to_string())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("prediction request failed ({status}): {body}"));
        }

        let raw: PredictResponse = response.json().await?;
        if let Some(detail) = raw.detail {
            return Err(anyhow!("prediction rejected by server: {detail}"));
        }

        let prediction = Prediction::from_wire(&raw);
        info!(
            predicted_age = prediction.predicted_age,
            confidence = prediction.confidence,
            hinted = range_hint.is_some(),
            "prediction received"
        );
        Ok(prediction)
    }

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.http
            .post(format!("{}/feedback", self.base_url))
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn notify_image_removed(&self) -> Result<()> {
        self.http
            .post(format!("{}/remove-image", self.base_url))
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

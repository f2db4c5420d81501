//! Opaque resource endpoints: quiz, file upload, payment.
//!
//! The session layer does not interpret these payloads; they are fetched
//! through the authorized guard and handed to the caller as raw JSON.

use serde_json::Value;

use crate::authorized::AuthorizedClient;
use crate::decode_json;
use crate::error::ApiError;

pub struct Resources<'a> {
    client: &'a AuthorizedClient,
}

impl<'a> Resources<'a> {
    pub fn new(client: &'a AuthorizedClient) -> Self {
        Self { client }
    }

    pub async fn quizzes(&self) -> Result<Value, ApiError> {
        let resp = self.client.get("/quiz").await?;
        decode_json(resp).await
    }

    pub async fn quiz(&self, id: &str) -> Result<Value, ApiError> {
        let resp = self.client.get(&format!("/quiz/{id}")).await?;
        decode_json(resp).await
    }

    pub async fn upload_quiz_file(&self, quiz_id: &str, payload: &Value) -> Result<Value, ApiError> {
        let resp = self
            .client
            .post(&format!("/quiz/{quiz_id}/upload"), payload)
            .await?;
        decode_json(resp).await
    }

    pub async fn quiz_report(&self, quiz_id: &str) -> Result<Value, ApiError> {
        let resp = self.client.get(&format!("/quiz/{quiz_id}/report")).await?;
        decode_json(resp).await
    }

    pub async fn payment_checkout(&self, payload: &Value) -> Result<Value, ApiError> {
        let resp = self.client.post("/payment/checkout", payload).await?;
        decode_json(resp).await
    }
}

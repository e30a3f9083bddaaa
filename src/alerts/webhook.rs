use std::time::Duration;

/// Posts alert messages to a chat webhook as `{"text": ...}` payloads.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, url }
    }

    pub async fn notify(&self, message: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

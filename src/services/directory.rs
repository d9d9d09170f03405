use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::TrainerCandidate;

/// Errors that can occur when talking to the external trainer directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Client for the external trainer directory
///
/// The directory aggregates publicly listed trainer profiles that have not
/// been claimed on the platform. Listings feed the combined matchmaker's
/// external pool; they never receive boosts and score through the strict
/// capped path.
pub struct DirectoryClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl DirectoryClient {
    /// Create a new directory client
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            client,
        }
    }

    /// Fetch external trainer listings, optionally narrowed by specialty
    pub async fn list_trainers(
        &self,
        specialty: Option<&str>,
    ) -> Result<Vec<TrainerCandidate>, DirectoryError> {
        let mut url = format!("{}/v1/listings", self.base_url.trim_end_matches('/'));
        if let Some(specialty) = specialty {
            url = format!("{}?specialty={}", url, urlencoding::encode(specialty));
        }

        tracing::debug!("Fetching external listings from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::ApiError(format!(
                "Failed to fetch listings: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let listings = json
            .get("listings")
            .and_then(|l| l.as_array())
            .ok_or_else(|| DirectoryError::InvalidResponse("Missing listings array".into()))?;

        let trainers: Vec<TrainerCandidate> = listings
            .iter()
            .filter_map(|doc| serde_json::from_value::<TrainerCandidate>(doc.clone()).ok())
            .map(|mut trainer| {
                // Directory listings are claimable by definition
                trainer.claim_available = true;
                trainer
            })
            .collect();

        tracing::debug!("Fetched {} external listings", trainers.len());

        Ok(trainers)
    }
}

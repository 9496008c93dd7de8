//! Bing Image Creator client
//!
//! One `generate` call is a full round trip: submit the prompt, poll the
//! async results page until it has content, scrape the image links and
//! download every image. The `_U` cookie of the leased credential is the
//! only authentication.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{COOKIE, LOCATION};
use reqwest::StatusCode;
use shared::{GeneratedImage, GenerationFailure};
use tokio::time::Instant;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::GenerationService;

pub const DEFAULT_BING_URL: &str = "https://www.bing.com";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36";

/// Placeholder images served instead of real results
const BAD_IMAGES: &[&str] = &[
    "https://r.bing.com/rp/in-2zU3AJUdkgFe7ZKv19yPBHVs.png",
    "https://r.bing.com/rp/TX9QuO3WzcCJz1uaaSwQAz39Kb0.jpg",
];

/// Submission lanes: boosted first, then the slow lane once boosts run out
const RESPONSE_TYPES: &[&str] = &["4", "3"];

#[derive(Debug, Clone)]
pub struct BingConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for BingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BING_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Pull the request id out of the submission redirect
pub fn request_id_from_location(location: &str) -> Option<&str> {
    let location = location.trim_end_matches("&nfy=1");
    let (_, tail) = location.rsplit_once("id=")?;
    let id = tail.split('&').next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

/// Map page text that signals a refusal to a failure
pub fn classify_page(body: &str) -> Result<(), GenerationFailure> {
    let text = body.to_lowercase();
    if text.contains("this prompt has been blocked") {
        return Err(GenerationFailure::Blocked("prompt blocked by content policy".to_string()));
    }
    if text.contains("we're working hard to offer image creator in more languages") {
        return Err(GenerationFailure::Blocked("unsupported language".to_string()));
    }
    if text.contains("you have exhausted") || text.contains("daily limit") || text.contains("reached your limit") {
        return Err(GenerationFailure::QuotaExceeded);
    }
    Ok(())
}

fn status_failure(status: StatusCode) -> Option<GenerationFailure> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(GenerationFailure::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Some(GenerationFailure::QuotaExceeded),
        _ => None,
    }
}

fn network(e: reqwest::Error) -> GenerationFailure {
    if e.is_timeout() {
        GenerationFailure::Timeout
    } else {
        GenerationFailure::Network(e.to_string())
    }
}

/// `GenerationService` backed by Bing Image Creator
pub struct BingImageClient {
    client: reqwest::Client,
    config: BingConfig,
    link_pattern: Regex,
}

impl BingImageClient {
    pub fn new(config: BingConfig) -> OrchestratorResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OrchestratorError::config(format!("http client: {e}")))?;
        let link_pattern =
            Regex::new(r#"src="([^"]+)""#).map_err(|e| OrchestratorError::config(format!("link pattern: {e}")))?;

        Ok(Self {
            client,
            config,
            link_pattern,
        })
    }

    /// Image links on a results page, query strings stripped, in page order
    pub fn extract_links(&self, body: &str) -> Result<Vec<String>, GenerationFailure> {
        let mut links: Vec<String> = Vec::new();
        for capture in self.link_pattern.captures_iter(body) {
            let link = capture[1].split("?w=").next().unwrap_or_default();
            if !link.is_empty() && !links.iter().any(|seen| seen == link) {
                links.push(link.to_string());
            }
        }

        if links.iter().any(|link| BAD_IMAGES.contains(&link.as_str())) {
            return Err(GenerationFailure::Server("placeholder images returned".to_string()));
        }
        if links.is_empty() {
            return Err(GenerationFailure::Server("no images on results page".to_string()));
        }
        Ok(links)
    }

    async fn submit(&self, cookie: &str, prompt: &str) -> Result<String, GenerationFailure> {
        let url = format!("{}/images/create", self.config.base_url);

        for rt in RESPONSE_TYPES {
            let response = self
                .client
                .post(&url)
                .query(&[("q", prompt), ("rt", rt), ("FORM", "GENCRE")])
                .header(COOKIE, cookie)
                .form(&[("q", prompt), ("qs", "ds")])
                .send()
                .await
                .map_err(network)?;

            let status = response.status();
            if let Some(failure) = status_failure(status) {
                return Err(failure);
            }

            if status.is_redirection() {
                let request_id = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(request_id_from_location)
                    .map(str::to_string);
                if let Some(request_id) = request_id {
                    return Ok(request_id);
                }
                continue;
            }

            let body = response.text().await.map_err(network)?;
            classify_page(&body)?;
            if !status.is_success() {
                return Err(GenerationFailure::Server(format!("submission returned HTTP {status}")));
            }
        }

        Err(GenerationFailure::Server("submission was not redirected to a request id".to_string()))
    }

    async fn poll_links(&self, cookie: &str, prompt: &str, request_id: &str) -> Result<Vec<String>, GenerationFailure> {
        let url = format!("{}/images/create/async/results/{}", self.config.base_url, request_id);
        let deadline = Instant::now() + self.config.timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(GenerationFailure::Timeout);
            }
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .client
                .get(&url)
                .query(&[("q", prompt)])
                .header(COOKIE, cookie)
                .send()
                .await
                .map_err(network)?;

            let status = response.status();
            if let Some(failure) = status_failure(status) {
                return Err(failure);
            }
            if !status.is_success() {
                return Err(GenerationFailure::Server(format!("results poll returned HTTP {status}")));
            }

            let body = response.text().await.map_err(network)?;
            if body.trim().is_empty() {
                continue;
            }
            classify_page(&body)?;
            return self.extract_links(&body);
        }
    }

    async fn download(&self, url: &str) -> Result<GeneratedImage, GenerationFailure> {
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationFailure::Server(format!("image download returned HTTP {status}")));
        }

        let bytes = response.bytes().await.map_err(network)?;
        Ok(GeneratedImage {
            url: url.to_string(),
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl GenerationService for BingImageClient {
    async fn generate(&self, secret: &str, prompt: &str) -> Result<Vec<GeneratedImage>, GenerationFailure> {
        let cookie = format!("_U={secret}");

        let request_id = self.submit(&cookie, prompt).await?;
        tracing::debug!(request_id, "Generation submitted");

        let links = self.poll_links(&cookie, prompt, &request_id).await?;

        let mut images = Vec::with_capacity(links.len());
        for link in &links {
            images.push(self.download(link).await?);
        }
        Ok(images)
    }
}

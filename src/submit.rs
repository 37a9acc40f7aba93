//! Outbound HTTP: answer submission and binary downloads.

use std::time::Duration;

use async_trait::async_trait;

use crate::{AnswerPayload, SubmitResponse};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
	#[error("request to {url} failed: {source}")]
	Transport {
		url: String,
		#[source]
		source: reqwest::Error,
	},
	#[error("{url} answered HTTP {status}")]
	Status { url: String, status: u16 },
	#[error("reply from {url} is not a JSON object: {source}")]
	Decode {
		url: String,
		#[source]
		source: reqwest::Error,
	},
}

#[async_trait]
pub trait Submitter: Send + Sync {
	/// POST `payload` as JSON and decode the JSON reply
	async fn submit(&self, url: &str, payload: &AnswerPayload, timeout: Duration) -> Result<SubmitResponse, SubmitError>;
	/// GET raw bytes (PDFs and the like)
	async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SubmitError>;
}

#[derive(Clone, Debug, Default)]
pub struct HttpSubmitter {
	client: reqwest::Client,
}

impl HttpSubmitter {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}

	async fn checked(url: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SubmitError> {
		let resp = request.send().await.map_err(|source| SubmitError::Transport { url: url.to_string(), source })?;
		let status = resp.status();
		if !status.is_success() {
			return Err(SubmitError::Status {
				url: url.to_string(),
				status: status.as_u16(),
			});
		}
		Ok(resp)
	}
}

#[async_trait]
impl Submitter for HttpSubmitter {
	async fn submit(&self, url: &str, payload: &AnswerPayload, timeout: Duration) -> Result<SubmitResponse, SubmitError> {
		let resp = Self::checked(url, self.client.post(url).json(payload).timeout(timeout)).await?;
		resp.json::<SubmitResponse>().await.map_err(|source| SubmitError::Decode { url: url.to_string(), source })
	}

	async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SubmitError> {
		let resp = Self::checked(url, self.client.get(url).timeout(timeout)).await?;
		let bytes = resp.bytes().await.map_err(|source| SubmitError::Transport { url: url.to_string(), source })?;
		Ok(bytes.to_vec())
	}
}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod browser;
pub mod budget;
pub mod config;
pub mod detect;
pub mod pdf;
pub mod server;
pub mod snapshot;
pub mod solver;
pub mod submit;
pub mod tasks;

/// One incoming request to solve a chain of quiz pages
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, derive_new::new)]
pub struct SolveRequest {
	/// Email identifying the solver to the quiz server
	pub email: String,
	/// Shared secret, echoed back in every submission
	pub secret: String,
	/// First quiz page to visit
	pub url: String,
}

/// Body POSTed to a quiz page's submission endpoint
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AnswerPayload {
	pub email: String,
	pub secret: String,
	/// URL of the page the answer belongs to
	pub url: String,
	/// Always serialized, `null` when nothing could be extracted
	pub answer: Value,
}

impl AnswerPayload {
	pub fn new(request: &SolveRequest, page_url: impl Into<String>, answer: impl Into<Value>) -> Self {
		Self {
			email: request.email.clone(),
			secret: request.secret.clone(),
			url: page_url.into(),
			answer: answer.into(),
		}
	}
}

/// Reply of a submission endpoint
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SubmitResponse {
	#[serde(default)]
	pub correct: Option<bool>,
	/// Next quiz page, if the server wants us to continue
	#[serde(default)]
	pub url: Option<String>,
	/// Anything else the server sent (reason, delay, ...)
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

impl SubmitResponse {
	/// Next URL to visit. Followed whenever present and non-empty, whatever `correct` says.
	pub fn next_url(&self) -> Option<&str> {
		self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
	}
}

impl fmt::Display for SubmitResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let correct = match self.correct {
			Some(true) => "correct",
			Some(false) => "incorrect",
			None => "unjudged",
		};
		write!(f, "{correct}")?;
		if let Some(next) = self.next_url() {
			write!(f, ", next: {next}")?;
		}
		if let Some(reason) = self.extra.get("reason").and_then(Value::as_str) {
			write!(f, ", reason: {reason}")?;
		}
		Ok(())
	}
}

//! Base64-encoded JSON hidden in the page's `<pre>` block.

use std::sync::OnceLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;
use serde_json::{Map, Value};

use super::TaskContext;
use crate::{AnswerPayload, browser::{RenderError, RenderedPage}};

/// Fields that may carry the answer, highest priority first
const ANSWER_FIELDS: [&str; 3] = ["answer", "ans", "answer_suggested"];

static CANDIDATE_RE: OnceLock<Regex> = OnceLock::new();

fn candidate_re() -> &'static Regex {
	CANDIDATE_RE.get_or_init(|| Regex::new(r"[A-Za-z0-9+/=\n]{40,}").expect("base64 candidate regex"))
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodedTextTask {
	pub submit_url: String,
	/// The decoded JSON object
	pub decoded: Map<String, Value>,
}

impl EncodedTextTask {
	pub async fn detect(page: &dyn RenderedPage, fallback_submit_url: &str) -> Result<Option<Self>, RenderError> {
		let Some(pre_text) = page.inner_text("pre").await? else {
			return Ok(None);
		};
		Ok(Self::from_text(&pre_text, fallback_submit_url))
	}

	/// First candidate that decodes to a JSON object wins; later ones are never tried
	pub fn from_text(text: &str, fallback_submit_url: &str) -> Option<Self> {
		let decoded = candidate_re().find_iter(text).find_map(|m| decode_candidate(m.as_str()))?;
		let submit_url = decoded
			.get("submit_url")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.unwrap_or(fallback_submit_url)
			.to_string();
		Some(Self { submit_url, decoded })
	}

	pub fn answer(&self) -> Value {
		ANSWER_FIELDS.iter().find_map(|field| self.decoded.get(*field)).cloned().unwrap_or(Value::Null)
	}

	pub fn compute(&self, ctx: &TaskContext<'_>) -> AnswerPayload {
		AnswerPayload::new(ctx.request, ctx.page_url, self.answer())
	}
}

fn decode_candidate(candidate: &str) -> Option<Map<String, Value>> {
	let compact: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
	let bytes = STANDARD.decode(compact).ok()?;
	let text = String::from_utf8_lossy(&bytes);
	let start = text.find('{')?;
	let end = text.rfind('}')?;
	if end < start {
		return None;
	}
	serde_json::from_str(&text[start..=end]).ok()
}

//! Task extractors: one per known page shape. Each knows how to compute an answer and where to send it.

use std::{fmt, time::Duration};

use crate::{
	AnswerPayload, SolveRequest,
	browser::{RenderError, RenderedPage},
	budget::TimeBudget,
	pdf::PdfError,
	submit::{SubmitError, Submitter},
};

pub mod encoded;
pub mod pdf_link;
pub mod table;

pub use encoded::EncodedTextTask;
pub use pdf_link::PdfLinkTask;
pub use table::TableTask;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
	#[error(transparent)]
	Page(#[from] RenderError),
	#[error("download failed: {0}")]
	Download(#[from] SubmitError),
	#[error(transparent)]
	Pdf(#[from] PdfError),
	#[error("PDF has no pages")]
	EmptyPdf,
}

/// What a task may use while computing its answer
#[derive(derive_new::new)]
pub struct TaskContext<'a> {
	pub request: &'a SolveRequest,
	/// URL the answer is reported for
	pub page_url: &'a str,
	pub fetcher: &'a dyn Submitter,
	pub budget: &'a TimeBudget,
	pub download_timeout: Duration,
}

/// A classified page, ready to produce its answer. Built by the detector, used once.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
	EncodedText(EncodedTextTask),
	Table(TableTask),
	PdfLink(PdfLinkTask),
}

impl Task {
	pub fn kind(&self) -> &'static str {
		match self {
			Task::EncodedText(_) => "encoded-text",
			Task::Table(_) => "table",
			Task::PdfLink(_) => "pdf-link",
		}
	}

	pub fn submit_url(&self) -> &str {
		match self {
			Task::EncodedText(t) => &t.submit_url,
			Task::Table(t) => &t.submit_url,
			Task::PdfLink(t) => &t.submit_url,
		}
	}

	pub async fn compute(&self, page: &dyn RenderedPage, ctx: &TaskContext<'_>) -> Result<AnswerPayload, TaskError> {
		match self {
			Task::EncodedText(t) => Ok(t.compute(ctx)),
			Task::Table(t) => t.compute(page, ctx).await,
			Task::PdfLink(t) => t.compute(ctx).await,
		}
	}
}

impl fmt::Display for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] submit to {}", self.kind(), self.submit_url())?;
		if let Task::PdfLink(t) = self {
			write!(f, " (pdf: {})", t.pdf_url)?;
		}
		Ok(())
	}
}

/// Resolve `href` against `base` the way a browser would; left as-is when either does not parse
pub(crate) fn resolve_url(base: &str, href: &str) -> String {
	reqwest::Url::parse(base).and_then(|b| b.join(href)).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string())
}

/// First non-blank attribute value among `(selector, attribute)` candidates, resolved against `page_url`
pub(crate) async fn first_endpoint(page: &dyn RenderedPage, page_url: &str, candidates: &[(&str, &str)]) -> Result<Option<String>, RenderError> {
	for (selector, attribute) in candidates {
		if let Some(raw) = page.attribute(selector, attribute).await? {
			let raw = raw.trim();
			if !raw.is_empty() {
				return Ok(Some(resolve_url(page_url, raw)));
			}
		}
	}
	Ok(None)
}

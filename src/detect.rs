//! Classifies a rendered page into one of the known task shapes.

use crate::{
	browser::{RenderError, RenderedPage},
	tasks::{EncodedTextTask, PdfLinkTask, Task, TableTask},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Heuristic {
	/// Base64 JSON inside `<pre>`
	EncodedText,
	/// Any `<table>`
	Table,
	/// An anchor to a `.pdf`
	PdfLink,
}

/// Evaluated in this order; the first match shadows the rest.
pub const HEURISTICS: [Heuristic; 3] = [Heuristic::EncodedText, Heuristic::Table, Heuristic::PdfLink];

impl Heuristic {
	pub async fn probe(self, page: &dyn RenderedPage, page_url: &str, fallback_submit_url: &str) -> Result<Option<Task>, RenderError> {
		Ok(match self {
			Heuristic::EncodedText => EncodedTextTask::detect(page, fallback_submit_url).await?.map(Task::EncodedText),
			Heuristic::Table => TableTask::detect(page, page_url, fallback_submit_url).await?.map(Task::Table),
			Heuristic::PdfLink => PdfLinkTask::detect(page, page_url, fallback_submit_url).await?.map(Task::PdfLink),
		})
	}
}

/// Run [HEURISTICS] against `page`. Only reads the page.
///
/// A heuristic whose page queries fail is treated as not matching.
pub async fn detect(page: &dyn RenderedPage, page_url: &str, fallback_submit_url: &str) -> Option<Task> {
	for heuristic in HEURISTICS {
		match heuristic.probe(page, page_url, fallback_submit_url).await {
			Ok(Some(task)) => {
				tracing::debug!(?heuristic, task = %task, "Task detected");
				return Some(task);
			}
			Ok(None) => {}
			Err(e) => tracing::warn!(?heuristic, error = %e, "Heuristic probe failed"),
		}
	}
	None
}

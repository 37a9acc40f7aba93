//! Linked PDF whose tables carry the numbers to sum.

use super::{TaskContext, TaskError, first_endpoint, resolve_url};
use crate::{
	AnswerPayload,
	browser::{RenderError, RenderedPage},
	pdf,
};

#[derive(Clone, Debug, PartialEq)]
pub struct PdfLinkTask {
	/// Absolute URL of the linked document, captured at detection
	pub pdf_url: String,
	pub submit_url: String,
}

impl PdfLinkTask {
	/// Matches the first anchor whose href ends in `.pdf`. Endpoint: `body[data-submit]`, then the fallback.
	pub async fn detect(page: &dyn RenderedPage, page_url: &str, fallback_submit_url: &str) -> Result<Option<Self>, RenderError> {
		let Some(href) = page.attribute("a[href$='.pdf']", "href").await? else {
			return Ok(None);
		};
		let submit_url = first_endpoint(page, page_url, &[("body", "data-submit")]).await?.unwrap_or_else(|| fallback_submit_url.to_string());
		Ok(Some(Self {
			pdf_url: resolve_url(page_url, href.trim()),
			submit_url,
		}))
	}

	pub async fn compute(&self, ctx: &TaskContext<'_>) -> Result<AnswerPayload, TaskError> {
		let timeout = ctx.budget.cap(ctx.download_timeout);
		let bytes = ctx.fetcher.download(&self.pdf_url, timeout).await?;
		tracing::debug!(url = %self.pdf_url, bytes = bytes.len(), "Downloaded PDF");

		let pages = pdf::page_texts(&bytes)?;
		let total = Self::total_for_pages(&pages)?;
		Ok(AnswerPayload::new(ctx.request, ctx.page_url, total))
	}

	/// Sum over the tables of the second page, or of the first when there is only one
	pub fn total_for_pages(pages: &[String]) -> Result<f64, TaskError> {
		let page = pages.get(1).or(pages.first()).ok_or(TaskError::EmptyPdf)?;
		Ok(pdf::sum_value_columns(&pdf::tables_in_text(page)))
	}
}

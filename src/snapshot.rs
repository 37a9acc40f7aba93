//! Static HTML standing in for a live page: replaying saved pages and offline inspection.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{RenderError, RenderedPage};

/// Immutable DOM snapshot of one page at one URL. Navigation is not possible.
#[derive(Clone, Debug, derive_new::new)]
pub struct HtmlSnapshot {
	url: String,
	html: String,
}

impl HtmlSnapshot {
	fn with_matches<T>(&self, selector: &str, f: impl FnOnce(&mut dyn Iterator<Item = ElementRef<'_>>) -> T) -> Result<T, RenderError> {
		let parsed = Selector::parse(selector).map_err(|e| RenderError::Query {
			query: selector.to_string(),
			reason: e.to_string(),
		})?;
		let document = Html::parse_document(&self.html);
		let mut matches = document.select(&parsed);
		Ok(f(&mut matches))
	}
}

fn text_of(el: ElementRef<'_>) -> String {
	el.text().collect::<String>()
}

#[async_trait]
impl RenderedPage for HtmlSnapshot {
	async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), RenderError> {
		if url == self.url {
			return Ok(());
		}
		Err(RenderError::Navigation {
			url: url.to_string(),
			reason: format!("snapshot is pinned to {}", self.url),
		})
	}

	async fn url(&self) -> Result<String, RenderError> {
		Ok(self.url.clone())
	}

	async fn html(&self) -> Result<String, RenderError> {
		Ok(self.html.clone())
	}

	async fn inner_text(&self, selector: &str) -> Result<Option<String>, RenderError> {
		self.with_matches(selector, |m| m.next().map(text_of))
	}

	async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, RenderError> {
		self.with_matches(selector, |m| m.map(|el| text_of(el).trim().to_string()).collect())
	}

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, RenderError> {
		self.with_matches(selector, |m| m.next().and_then(|el| el.value().attr(name)).map(|s| s.to_string()))
	}

	async fn table_rows(&self) -> Result<Vec<Vec<String>>, RenderError> {
		let cell = Selector::parse("td").map_err(|e| RenderError::Query {
			query: "td".to_string(),
			reason: e.to_string(),
		})?;
		self.with_matches("table tr", |rows| rows.map(|row| row.select(&cell).map(|td| text_of(td).trim().to_string()).collect()).collect())
	}

	async fn close(self: Box<Self>) {}
}

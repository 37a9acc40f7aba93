//! HTML table whose `value` column has to be summed.

use std::sync::OnceLock;

use regex::Regex;

use super::{TaskContext, TaskError, first_endpoint};
use crate::{
	AnswerPayload,
	browser::{RenderError, RenderedPage},
	pdf::parse_number,
};

static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();

fn numeric_re() -> &'static Regex {
	NUMERIC_RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("numeric cell regex"))
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableTask {
	pub submit_url: String,
}

impl TableTask {
	/// Matches any page with a `<table>`. Endpoint: form action, then `body[data-submit]`, then the fallback.
	pub async fn detect(page: &dyn RenderedPage, page_url: &str, fallback_submit_url: &str) -> Result<Option<Self>, RenderError> {
		if page.inner_text("table").await?.is_none() {
			return Ok(None);
		}
		let submit_url = first_endpoint(page, page_url, &[("form", "action"), ("body", "data-submit")])
			.await?
			.unwrap_or_else(|| fallback_submit_url.to_string());
		Ok(Some(Self { submit_url }))
	}

	pub async fn compute(&self, page: &dyn RenderedPage, ctx: &TaskContext<'_>) -> Result<AnswerPayload, TaskError> {
		let total = sum_table(page).await?;
		tracing::debug!(total, "Summed table");
		Ok(AnswerPayload::new(ctx.request, ctx.page_url, total))
	}
}

/// Sum of the `value` column, or of every numeric-looking data cell when no such column exists
pub async fn sum_table(page: &dyn RenderedPage) -> Result<f64, RenderError> {
	let mut headers = page.inner_texts("table th, table thead th").await?;
	if headers.is_empty() {
		// no header row: treat the first row as one
		headers = page.inner_texts("table tr:first-child td").await?;
	}

	let Some(idx) = value_column(&headers) else {
		return Ok(sum_numeric_cells(&page.table_rows().await?));
	};
	let cells = page.inner_texts(&format!("table tr td:nth-child({})", idx + 1)).await?;
	Ok(cells.iter().filter_map(|c| parse_number(c)).fold(0.0, |acc, n| acc + n))
}

pub fn value_column(headers: &[String]) -> Option<usize> {
	headers.iter().position(|h| h.trim().eq_ignore_ascii_case("value"))
}

/// Every cell of every row but the first that is a plain decimal once commas are stripped
pub fn sum_numeric_cells(rows: &[Vec<String>]) -> f64 {
	rows.iter()
		.skip(1)
		.flatten()
		.map(|cell| cell.replace(',', ""))
		.filter(|cell| numeric_re().is_match(cell))
		.filter_map(|cell| cell.parse::<f64>().ok())
		.fold(0.0, |acc, n| acc + n)
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::json;

	use super::*;
	use crate::{SolveRequest, budget::TimeBudget, snapshot::HtmlSnapshot, tasks::testing::CannedFetcher};

	const FALLBACK: &str = "https://fallback.example/submit";
	const URL: &str = "https://quiz.example/t/1";

	fn page(body: &str) -> HtmlSnapshot {
		HtmlSnapshot::new(URL.into(), format!("<html>{body}</html>"))
	}

	async fn compute(page: &HtmlSnapshot) -> AnswerPayload {
		let request = SolveRequest::new("me@x".into(), "s".into(), URL.into());
		let fetcher = CannedFetcher::default();
		let budget = TimeBudget::start(Duration::from_secs(60));
		let ctx = TaskContext::new(&request, URL, &fetcher, &budget, Duration::from_secs(1));
		let task = TableTask::detect(page, URL, FALLBACK).await.unwrap().unwrap();
		task.compute(page, &ctx).await.unwrap()
	}

	#[tokio::test]
	async fn sums_value_column_skipping_garbage() {
		let page = page(
			r#"<body><table>
				<thead><tr><th>id</th><th> VALUE </th><th>note</th></tr></thead>
				<tbody>
					<tr><td>1</td><td>1,250.5</td><td>7</td></tr>
					<tr><td>2</td><td>n/a</td><td>8</td></tr>
					<tr><td>3</td><td>-0.5</td><td>9</td></tr>
				</tbody>
			</table></body>"#,
		);
		let payload = compute(&page).await;
		assert_eq!(payload.answer, json!(1250.0));
		assert_eq!(payload.url, URL);
	}

	#[tokio::test]
	async fn same_page_same_sum() {
		let page = page("<body><table><tr><th>value</th></tr><tr><td>2.25</td></tr><tr><td>3</td></tr></table></body>");
		let first = compute(&page).await;
		let second = compute(&page).await;
		assert_eq!(first.answer, json!(5.25));
		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn header_only_table_sums_to_zero() {
		let page = page("<body><table><tr><th>value</th></tr></table></body>");
		assert_eq!(compute(&page).await.answer, json!(0.0));
	}

	#[tokio::test]
	async fn first_row_stands_in_for_missing_header() {
		let page = page("<body><table><tr><td>name</td><td>Value</td></tr><tr><td>a</td><td>4</td></tr><tr><td>b</td><td>6</td></tr></table></body>");
		assert_eq!(compute(&page).await.answer, json!(10.0));
	}

	#[tokio::test]
	async fn without_value_column_every_numeric_cell_counts() {
		let page = page(
			"<body><table><tr><th>id</th><th>amount</th></tr><tr><td>1</td><td>1,000</td></tr><tr><td>2</td><td>2.5e3</td></tr><tr><td>x</td><td>-4.5</td></tr></table></body>",
		);
		// header row has no td cells, so every data row is counted; 2.5e3 is not a plain decimal
		assert_eq!(compute(&page).await.answer, json!(1.0 + 1000.0 + 2.0 - 4.5));
	}

	#[tokio::test]
	async fn endpoint_resolution_order() {
		let with_form = page(r#"<body data-submit="/from-body"><form action="/from-form"></form><table><tr><td>1</td></tr></table></body>"#);
		let task = TableTask::detect(&with_form, URL, FALLBACK).await.unwrap().unwrap();
		assert_eq!(task.submit_url, "https://quiz.example/from-form");

		let body_only = page(r#"<body data-submit="https://s.example/answer"><table><tr><td>1</td></tr></table></body>"#);
		let task = TableTask::detect(&body_only, URL, FALLBACK).await.unwrap().unwrap();
		assert_eq!(task.submit_url, "https://s.example/answer");

		let neither = page("<body><form></form><table><tr><td>1</td></tr></table></body>");
		let task = TableTask::detect(&neither, URL, FALLBACK).await.unwrap().unwrap();
		assert_eq!(task.submit_url, FALLBACK);
	}

	#[tokio::test]
	async fn no_table_no_task() {
		assert!(TableTask::detect(&page("<body><p>1 2 3</p></body>"), URL, FALLBACK).await.unwrap().is_none());
	}
}

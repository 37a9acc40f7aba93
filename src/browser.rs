//! Page rendering: the capability the solver drives, and its chromiumoxide backend.

#[cfg(feature = "xdg")]
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
	Page,
	browser::{Browser, BrowserConfig},
};
use futures::StreamExt;
use tokio::{sync::Mutex, task::JoinHandle};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
	#[error("failed to launch browser: {0}")]
	Launch(String),
	#[error("navigation to {url} timed out after {}s", timeout.as_secs())]
	NavigationTimeout { url: String, timeout: Duration },
	#[error("navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },
	#[error("query `{query}` failed: {reason}")]
	Query { query: String, reason: String },
}

impl RenderError {
	fn query(query: impl Into<String>, reason: impl ToString) -> Self {
		Self::Query {
			query: query.into(),
			reason: reason.to_string(),
		}
	}
}

/// A live, queryable page. Owned by one solve loop for one iteration, then closed.
#[async_trait]
pub trait RenderedPage: Send + Sync {
	/// Load `url` and wait for the network to settle, bounded by `timeout`
	async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;
	/// Where the page currently is (after redirects)
	async fn url(&self) -> Result<String, RenderError>;
	/// Serialized DOM
	async fn html(&self) -> Result<String, RenderError>;
	/// Rendered text of the first element matching `selector`
	async fn inner_text(&self, selector: &str) -> Result<Option<String>, RenderError>;
	/// Trimmed rendered text of every element matching `selector`, in document order
	async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, RenderError>;
	/// Raw attribute of the first element matching `selector`
	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, RenderError>;
	/// Every `table tr` on the page, as the trimmed texts of its `td` cells
	async fn table_rows(&self) -> Result<Vec<Vec<String>>, RenderError>;
	async fn close(self: Box<Self>);
}

/// Produces pages. Started once per solve loop and stopped when it exits.
#[async_trait]
pub trait Renderer: Send + Sync {
	async fn start(&self) -> Result<(), RenderError>;
	async fn new_page(&self) -> Result<Box<dyn RenderedPage>, RenderError>;
	/// Idempotent; never fails
	async fn stop(&self);
}

struct LiveBrowser {
	browser: Browser,
	handler: JoinHandle<()>,
}

/// Headless Chromium, one instance per solve loop
pub struct ChromeRenderer {
	visible: bool,
	live: Mutex<Option<LiveBrowser>>,
}

impl ChromeRenderer {
	pub fn new(visible: bool) -> Self {
		Self { visible, live: Mutex::new(None) }
	}

	async fn launch(&self) -> Result<LiveBrowser, RenderError> {
		let builder = BrowserConfig::builder().no_sandbox();
		let builder = if self.visible { builder.with_head() } else { builder };
		let config = builder.build().map_err(RenderError::Launch)?;

		let (browser, mut handler) = Browser::launch(config).await.map_err(|e| RenderError::Launch(e.to_string()))?;

		// CDP messages only flow while the handler is polled
		let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

		Ok(LiveBrowser { browser, handler })
	}
}

#[async_trait]
impl Renderer for ChromeRenderer {
	async fn start(&self) -> Result<(), RenderError> {
		let mut live = self.live.lock().await;
		if live.is_none() {
			*live = Some(self.launch().await?);
			tracing::info!(visible = self.visible, "Browser started");
		}
		Ok(())
	}

	async fn new_page(&self) -> Result<Box<dyn RenderedPage>, RenderError> {
		let mut live = self.live.lock().await;
		if live.is_none() {
			*live = Some(self.launch().await?);
			tracing::info!(visible = self.visible, "Browser started lazily");
		}
		let Some(live) = live.as_ref() else {
			return Err(RenderError::Launch("browser vanished during start".to_string()));
		};
		let page = live.browser.new_page("about:blank").await.map_err(|e| RenderError::Launch(format!("failed to open tab: {e}")))?;
		Ok(Box::new(ChromePage { page }))
	}

	async fn stop(&self) {
		let mut live = self.live.lock().await;
		let Some(LiveBrowser { mut browser, handler }) = live.take() else {
			return;
		};
		if let Err(e) = browser.close().await {
			tracing::debug!(error = %e, "Browser close failed");
		}
		if let Err(e) = browser.wait().await {
			tracing::debug!(error = %e, "Waiting for browser exit failed");
		}
		handler.abort();
		tracing::info!("Browser stopped");
	}
}

struct ChromePage {
	page: Page,
}

impl ChromePage {
	/// Evaluate a script that returns a string (or null)
	async fn eval_string(&self, what: &str, script: String) -> Result<Option<String>, RenderError> {
		let result = self.page.evaluate(script).await.map_err(|e| RenderError::query(what, e))?;
		Ok(result.value().and_then(|v| v.as_str()).map(|s| s.to_string()))
	}

	/// Evaluate a script that returns `JSON.stringify(...)` and decode it
	async fn eval_json<T: serde::de::DeserializeOwned + Default>(&self, what: &str, script: String) -> Result<T, RenderError> {
		let Some(json_str) = self.eval_string(what, script).await? else {
			return Ok(T::default());
		};
		serde_json::from_str(&json_str).map_err(|e| RenderError::query(what, e))
	}
}

/// Quote `s` as a JS string literal
fn js_str(s: &str) -> String {
	serde_json::Value::from(s).to_string()
}

#[async_trait]
impl RenderedPage for ChromePage {
	async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
		let navigation = async {
			self.page.goto(url).await?;
			self.page.wait_for_navigation().await?;
			Ok::<_, chromiumoxide::error::CdpError>(())
		};
		match tokio::time::timeout(timeout, navigation).await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(e)) => Err(RenderError::Navigation {
				url: url.to_string(),
				reason: e.to_string(),
			}),
			Err(_) => Err(RenderError::NavigationTimeout { url: url.to_string(), timeout }),
		}
	}

	async fn url(&self) -> Result<String, RenderError> {
		let url = self.page.url().await.map_err(|e| RenderError::query("location", e))?;
		Ok(url.unwrap_or_default())
	}

	async fn html(&self) -> Result<String, RenderError> {
		self.page.content().await.map_err(|e| RenderError::query("document", e))
	}

	async fn inner_text(&self, selector: &str) -> Result<Option<String>, RenderError> {
		let script = format!(
			r#"
			(function() {{
				const el = document.querySelector({sel});
				return el ? el.innerText : null;
			}})()
			"#,
			sel = js_str(selector)
		);
		self.eval_string(selector, script).await
	}

	async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, RenderError> {
		let script = format!(
			r#"
			(function() {{
				const nodes = Array.from(document.querySelectorAll({sel}));
				return JSON.stringify(nodes.map(n => (n.innerText || '').trim()));
			}})()
			"#,
			sel = js_str(selector)
		);
		self.eval_json(selector, script).await
	}

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, RenderError> {
		let script = format!(
			r#"
			(function() {{
				const el = document.querySelector({sel});
				return el ? el.getAttribute({name}) : null;
			}})()
			"#,
			sel = js_str(selector),
			name = js_str(name)
		);
		self.eval_string(selector, script).await
	}

	async fn table_rows(&self) -> Result<Vec<Vec<String>>, RenderError> {
		let script = r#"
			(function() {
				const rows = Array.from(document.querySelectorAll('table tr'));
				return JSON.stringify(rows.map(r => Array.from(r.querySelectorAll('td')).map(td => (td.innerText || '').trim())));
			})()
		"#;
		self.eval_json("table tr", script.to_string()).await
	}

	async fn close(self: Box<Self>) {
		if let Err(e) = self.page.close().await {
			tracing::debug!(error = %e, "Page close failed");
		}
	}
}

/// Save the current page's HTML to disk for later replay with `inspect`
/// Uses the page URL as the filename label
#[cfg(feature = "xdg")]
pub async fn save_page_html(page: &dyn RenderedPage, session_id: &str) -> color_eyre::Result<PathBuf> {
	use color_eyre::eyre::eyre;
	use v_utils::{log, xdg_state_dir};

	let html_dir = xdg_state_dir!("persist_htmls").join(session_id);
	std::fs::create_dir_all(&html_dir).map_err(|e| eyre!("Failed to create HTML dir: {}", e))?;

	let url = page.url().await.unwrap_or_default();
	let html = page.html().await.map_err(|e| eyre!("Failed to get page HTML: {}", e))?;

	let filepath = html_dir.join(snapshot_filename(&url, chrono::Utc::now().timestamp()));
	std::fs::write(&filepath, html).map_err(|e| eyre!("Failed to write HTML file: {}", e))?;

	log!("Saved page HTML to: {}", filepath.display());
	Ok(filepath)
}

#[cfg(any(feature = "xdg", test))]
fn snapshot_filename(url: &str, timestamp: i64) -> String {
	let label = url.replace("https://", "").replace("http://", "");
	let safe_label: String = label.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
	format!("{timestamp}_{safe_label}.html")
}

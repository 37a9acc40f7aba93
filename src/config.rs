use std::{net::SocketAddr, time::Duration};

use clap::Args;

/// Process-wide settings. Every field can come from a flag or its env var; read once at startup.
#[derive(Args, Clone, Debug)]
pub struct AppConfig {
	/// Secret every incoming solve request must carry
	#[arg(long, env = "EXPECTED_SECRET", default_value = "", hide_env_values = true)]
	pub expected_secret: String,
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,
	#[arg(long, env = "PORT", default_value_t = 8000)]
	pub port: u16,
	/// tracing filter directive (`info`, `debug`, `quiz_headless=trace`, ...)
	#[arg(long, env = "LOG_LEVEL", default_value = "info")]
	pub log_level: String,
	/// Where answers go when the page names no endpoint
	#[arg(long, env = "FALLBACK_SUBMIT_URL", default_value = "https://example.com/submit")]
	pub fallback_submit_url: String,
	/// Total wall-clock budget for one solve request
	#[arg(long, env = "TIME_BUDGET_SECS", default_value_t = 170)]
	pub time_budget_secs: u64,
	/// No new page is started once the remaining budget drops to this
	#[arg(long, env = "BUDGET_MARGIN_SECS", default_value_t = 5)]
	pub budget_margin_secs: u64,
	#[arg(long, env = "NAVIGATION_TIMEOUT_SECS", default_value_t = 60)]
	pub navigation_timeout_secs: u64,
	#[arg(long, env = "SUBMIT_TIMEOUT_SECS", default_value_t = 30)]
	pub submit_timeout_secs: u64,
	#[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = 30)]
	pub download_timeout_secs: u64,
	/// Run with visible browser window (non-headless mode)
	#[arg(long, env = "BROWSER_VISIBLE", default_value_t = false)]
	pub visible: bool,
	/// Persist every rendered page's HTML under the XDG state dir
	#[arg(long, env = "SAVE_PAGES", default_value_t = false)]
	pub save_pages: bool,
}

impl AppConfig {
	pub fn bind_addr(&self) -> color_eyre::Result<SocketAddr> {
		let addr = format!("{}:{}", self.host, self.port);
		addr.parse().map_err(|e| color_eyre::eyre::eyre!("Invalid bind address {addr}: {e}"))
	}

	pub fn solve_settings(&self) -> SolveSettings {
		SolveSettings {
			fallback_submit_url: self.fallback_submit_url.clone(),
			time_budget: Duration::from_secs(self.time_budget_secs),
			budget_margin: Duration::from_secs(self.budget_margin_secs),
			navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
			submit_timeout: Duration::from_secs(self.submit_timeout_secs),
			download_timeout: Duration::from_secs(self.download_timeout_secs),
			save_pages: self.save_pages,
		}
	}
}

/// Knobs of a single solve loop
#[derive(Clone, Debug)]
pub struct SolveSettings {
	pub fallback_submit_url: String,
	pub time_budget: Duration,
	pub budget_margin: Duration,
	pub navigation_timeout: Duration,
	pub submit_timeout: Duration,
	pub download_timeout: Duration,
	pub save_pages: bool,
}

impl Default for SolveSettings {
	fn default() -> Self {
		Self {
			fallback_submit_url: "https://example.com/submit".to_string(),
			time_budget: Duration::from_secs(170),
			budget_margin: Duration::from_secs(5),
			navigation_timeout: Duration::from_secs(60),
			submit_timeout: Duration::from_secs(30),
			download_timeout: Duration::from_secs(30),
			save_pages: false,
		}
	}
}

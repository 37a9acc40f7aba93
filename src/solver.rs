//! The solve loop: render -> detect -> compute -> submit -> follow, under a time budget.

use std::{fmt, panic::AssertUnwindSafe};

use futures::FutureExt as _;
use v_utils::{elog, log};

use crate::{
	SolveRequest, SubmitResponse,
	browser::{RenderedPage, Renderer},
	budget::TimeBudget,
	config::SolveSettings,
	detect::detect,
	submit::Submitter,
	tasks::TaskContext,
};

/// Why a solve loop ended. None of these are reported to the HTTP caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StopReason {
	/// Server sent no further URL
	Finished,
	NoTaskDetected { url: String },
	ExtractionFailed { url: String, error: String },
	SubmissionFailed { url: String, error: String },
	/// Not enough budget left to start another page
	BudgetExhausted,
	BrowserUnavailable { error: String },
}

#[derive(Clone, Debug)]
pub struct SolveOutcome {
	/// Every URL a render was attempted for, in order
	pub pages_visited: Vec<String>,
	pub submissions: usize,
	pub last_response: Option<SubmitResponse>,
	pub stop: StopReason,
}

impl fmt::Display for SolveOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} page(s), {} submission(s), stopped: ", self.pages_visited.len(), self.submissions)?;
		match &self.stop {
			StopReason::Finished => write!(f, "finished"),
			StopReason::NoTaskDetected { url } => write!(f, "no task recognised on {url}"),
			StopReason::ExtractionFailed { url, error } => write!(f, "could not compute answer for {url}: {error}"),
			StopReason::SubmissionFailed { url, error } => write!(f, "submission for {url} failed: {error}"),
			StopReason::BudgetExhausted => write!(f, "time budget exhausted"),
			StopReason::BrowserUnavailable { error } => write!(f, "browser unavailable: {error}"),
		}
	}
}

enum Step {
	Follow(String),
	Stop(StopReason),
}

/// Solve the chain of quiz pages starting at `request.url`.
///
/// `renderer` is started here and stopped on every exit path, a panic inside the loop included (it is re-raised after cleanup).
/// Never fails otherwise: the way it ended is in [SolveOutcome::stop].
pub async fn solve(renderer: &dyn Renderer, submitter: &dyn Submitter, request: &SolveRequest, settings: &SolveSettings) -> SolveOutcome {
	let budget = TimeBudget::start(settings.time_budget);
	let mut outcome = SolveOutcome {
		pages_visited: Vec::new(),
		submissions: 0,
		last_response: None,
		stop: StopReason::Finished,
	};

	let stop = match renderer.start().await {
		Ok(()) => AssertUnwindSafe(run(renderer, submitter, request, settings, &budget, &mut outcome)).catch_unwind().await,
		Err(e) => {
			elog!("Could not start browser: {e}");
			Ok(StopReason::BrowserUnavailable { error: e.to_string() })
		}
	};
	renderer.stop().await;
	outcome.stop = match stop {
		Ok(stop) => stop,
		Err(panic) => {
			tracing::error!(email = %request.email, start = %request.url, "Solve loop panicked, browser stopped");
			std::panic::resume_unwind(panic);
		}
	};

	tracing::info!(email = %request.email, start = %request.url, elapsed_secs = budget.elapsed().as_secs_f64(), "Solve finished: {outcome}");
	outcome
}

async fn run(renderer: &dyn Renderer, submitter: &dyn Submitter, request: &SolveRequest, settings: &SolveSettings, budget: &TimeBudget, outcome: &mut SolveOutcome) -> StopReason {
	let session_id = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
	let mut url = request.url.clone();
	loop {
		if !budget.allows_another(settings.budget_margin) {
			tracing::info!(url = %url, remaining_secs = budget.remaining().as_secs_f64(), "Time budget exhausted, not starting another page");
			return StopReason::BudgetExhausted;
		}
		log!("Visiting {url} (remaining {:.1}s)", budget.remaining().as_secs_f64());

		let page = match renderer.new_page().await {
			Ok(page) => page,
			Err(e) => {
				elog!("Could not open a page: {e}");
				return StopReason::BrowserUnavailable { error: e.to_string() };
			}
		};
		outcome.pages_visited.push(url.clone());

		let step = AssertUnwindSafe(visit(&*page, &url, submitter, request, settings, budget, &session_id, outcome)).catch_unwind().await;
		page.close().await;

		match step {
			Ok(Step::Follow(next)) => url = next,
			Ok(Step::Stop(reason)) => return reason,
			Err(panic) => std::panic::resume_unwind(panic),
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn visit(
	page: &dyn RenderedPage,
	url: &str,
	submitter: &dyn Submitter,
	request: &SolveRequest,
	settings: &SolveSettings,
	budget: &TimeBudget,
	session_id: &str,
	outcome: &mut SolveOutcome,
) -> Step {
	// best effort: a half-loaded page may still be recognisable
	if let Err(e) = page.goto(url, settings.navigation_timeout).await {
		tracing::warn!(url, error = %e, "Page load failed, detecting on what rendered");
	}

	#[cfg(feature = "xdg")]
	if settings.save_pages {
		if let Err(e) = crate::browser::save_page_html(page, session_id).await {
			elog!("Failed to save page HTML: {e}");
		}
	}
	#[cfg(not(feature = "xdg"))]
	let _ = session_id;

	let page_url = current_url(page, url).await;
	let Some(task) = detect(page, &page_url, &settings.fallback_submit_url).await else {
		tracing::warn!(url, "No task detected");
		return Step::Stop(StopReason::NoTaskDetected { url: url.to_string() });
	};
	log!("Detected {task}");

	let ctx = TaskContext::new(request, &page_url, submitter, budget, settings.download_timeout);
	let payload = match task.compute(page, &ctx).await {
		Ok(payload) => payload,
		Err(e) => {
			tracing::error!(url, task = task.kind(), error = %e, "Error computing answer");
			return Step::Stop(StopReason::ExtractionFailed {
				url: url.to_string(),
				error: e.to_string(),
			});
		}
	};
	log!("Answer: {}", payload.answer);

	let response = match submitter.submit(task.submit_url(), &payload, settings.submit_timeout).await {
		Ok(response) => response,
		Err(e) => {
			tracing::error!(url, submit_url = task.submit_url(), error = %e, "Submit failed");
			return Step::Stop(StopReason::SubmissionFailed {
				url: url.to_string(),
				error: e.to_string(),
			});
		}
	};
	log!("Submit response: {response}");
	outcome.submissions += 1;

	let next = response.next_url().map(str::to_string);
	outcome.last_response = Some(response);
	match next {
		Some(next) => Step::Follow(next),
		None => Step::Stop(StopReason::Finished),
	}
}

/// Where the page actually is; the requested URL when the page cannot tell
async fn current_url(page: &dyn RenderedPage, requested: &str) -> String {
	match page.url().await {
		Ok(u) if !u.is_empty() && u != "about:blank" => u,
		_ => requested.to_string(),
	}
}

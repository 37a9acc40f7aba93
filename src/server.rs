//! HTTP front end: accepts solve requests, checks the secret, and starts a loop in the background.

use std::sync::Arc;

use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use color_eyre::{Result, eyre::eyre};
use serde_json::json;

use crate::{
	SolveRequest,
	browser::ChromeRenderer,
	config::{AppConfig, SolveSettings},
	solver::solve,
	submit::HttpSubmitter,
};

/// Starts a solve loop for an accepted request without waiting for it
pub trait SolveLauncher: Send + Sync {
	fn launch(&self, request: SolveRequest);
}

/// Each request gets its own browser; the HTTP client is shared
#[derive(Clone, Debug, derive_new::new)]
pub struct ChromeLauncher {
	submitter: HttpSubmitter,
	settings: SolveSettings,
	visible: bool,
}

impl SolveLauncher for ChromeLauncher {
	fn launch(&self, request: SolveRequest) {
		let submitter = self.submitter.clone();
		let settings = self.settings.clone();
		let visible = self.visible;
		tokio::spawn(async move {
			let renderer = ChromeRenderer::new(visible);
			let outcome = solve(&renderer, &submitter, &request, &settings).await;
			tracing::info!(email = %request.email, start = %request.url, stop = ?outcome.stop, "Background solve done");
		});
	}
}

#[derive(Clone)]
pub struct AppState {
	pub expected_secret: Arc<str>,
	pub launcher: Arc<dyn SolveLauncher>,
}

pub fn router(state: AppState) -> Router {
	Router::new().route("/", get(root)).route("/api/v1/quiz", post(start_quiz)).with_state(state)
}

async fn root() -> impl IntoResponse {
	Json(json!({"status": "ok", "service": "quiz-solver"}))
}

async fn start_quiz(State(state): State<AppState>, body: Result<Json<SolveRequest>, JsonRejection>) -> Response {
	let request = match body {
		Ok(Json(request)) => request,
		Err(rejection) => {
			tracing::debug!(error = %rejection, "Malformed solve request");
			return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": rejection.body_text()}))).into_response();
		}
	};

	if request.secret != *state.expected_secret {
		tracing::warn!(email = %request.email, "Rejected solve request: invalid secret");
		return (StatusCode::FORBIDDEN, Json(json!({"detail": "Invalid secret"}))).into_response();
	}

	tracing::info!(email = %request.email, url = %request.url, "Solve request accepted");
	let url = request.url.clone();
	state.launcher.launch(request);
	(StatusCode::OK, Json(json!({"status": "accepted", "url": url}))).into_response()
}

pub fn http_client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
		.build()
		.map_err(|e| eyre!("Failed to build HTTP client: {}", e))
}

pub async fn serve(config: &AppConfig) -> Result<()> {
	let addr = config.bind_addr()?;
	let launcher = ChromeLauncher::new(HttpSubmitter::new(http_client()?), config.solve_settings(), config.visible);
	let app = router(AppState {
		expected_secret: Arc::from(config.expected_secret.as_str()),
		launcher: Arc::new(launcher),
	});

	let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| eyre!("Failed to bind {addr}: {e}"))?;
	tracing::info!(%addr, "Quiz solver listening");
	axum::serve(listener, app).await.map_err(|e| eyre!("Server error: {e}"))?;
	Ok(())
}

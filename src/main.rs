use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use quiz_headless::{
	SolveRequest,
	browser::ChromeRenderer,
	budget::TimeBudget,
	config::AppConfig,
	detect::detect,
	server::{self, http_client},
	snapshot::HtmlSnapshot,
	solver::solve,
	submit::HttpSubmitter,
	tasks::TaskContext,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quiz_headless")]
#[command(about = "Solves chains of quiz pages in a headless browser", long_about = None)]
struct Cli {
	#[command(flatten)]
	config: AppConfig,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Serve the HTTP API (default)
	Serve,
	/// Solve one quiz chain in the foreground
	Solve {
		#[arg(short, long)]
		email: String,
		/// Defaults to the expected secret
		#[arg(short, long)]
		secret: Option<String>,
		/// Start URL
		#[arg(short, long)]
		url: String,
	},
	/// Detect the task on a saved page; nothing is submitted
	Inspect {
		/// HTML file, e.g. one persisted with --save-pages
		#[arg(short, long)]
		file: PathBuf,
		/// URL the page was served from (for resolving relative links)
		#[arg(short, long, default_value = "http://localhost/")]
		url: String,
		/// Also compute the answer payload (PDF tasks download over HTTP)
		#[arg(long)]
		compute: bool,
		#[arg(long, default_value = "")]
		email: String,
	},
}

fn init_tracing(level: &str) {
	let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	// .env must be in place before clap reads the environment
	let _ = dotenvy::dotenv();
	let cli = Cli::parse();
	init_tracing(&cli.config.log_level);

	match cli.command.unwrap_or(Command::Serve) {
		Command::Serve => server::serve(&cli.config).await,
		Command::Solve { email, secret, url } => {
			let secret = secret.unwrap_or_else(|| cli.config.expected_secret.clone());
			let request = SolveRequest::new(email, secret, url);
			let renderer = ChromeRenderer::new(cli.config.visible);
			let submitter = HttpSubmitter::new(http_client()?);

			let outcome = solve(&renderer, &submitter, &request, &cli.config.solve_settings()).await;
			println!("{outcome}");
			if let Some(response) = &outcome.last_response {
				println!("Last response: {}", serde_json::to_string_pretty(response)?);
			}
			Ok(())
		}
		Command::Inspect { file, url, compute, email } => inspect(&cli.config, file, url, compute, email).await,
	}
}

async fn inspect(config: &AppConfig, file: PathBuf, url: String, compute: bool, email: String) -> Result<()> {
	let html = std::fs::read_to_string(&file).map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
	let page = HtmlSnapshot::new(url.clone(), html);
	let settings = config.solve_settings();

	let Some(task) = detect(&page, &url, &settings.fallback_submit_url).await else {
		println!("No task detected in {}", file.display());
		return Ok(());
	};
	println!("{task}");

	if compute {
		let request = SolveRequest::new(email, config.expected_secret.clone(), url.clone());
		let submitter = HttpSubmitter::new(http_client()?);
		let budget = TimeBudget::start(settings.time_budget);
		let ctx = TaskContext::new(&request, &url, &submitter, &budget, settings.download_timeout);
		let payload = task.compute(&page, &ctx).await.map_err(|e| eyre!("Failed to compute answer: {}", e))?;
		println!("{}", serde_json::to_string_pretty(&payload)?);
	}
	Ok(())
}

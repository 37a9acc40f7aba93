#![allow(dead_code)]

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use async_trait::async_trait;
use quiz_headless::{
	AnswerPayload, SubmitResponse,
	browser::{RenderError, RenderedPage, Renderer},
	snapshot::HtmlSnapshot,
	submit::{SubmitError, Submitter},
};

#[derive(Default)]
struct SiteState {
	pages: HashMap<String, String>,
	visits: Mutex<Vec<String>>,
	starts: AtomicUsize,
	stops: AtomicUsize,
	opened: AtomicUsize,
	closed: AtomicUsize,
	refuse_start: AtomicBool,
}

/// In-memory website standing in for the browser
#[derive(Clone, Default)]
pub struct FakeSite {
	state: Arc<SiteState>,
}

impl FakeSite {
	pub fn new(pages: &[(&str, String)]) -> Self {
		let state = SiteState {
			pages: pages.iter().map(|(u, h)| (u.to_string(), h.clone())).collect(),
			..Default::default()
		};
		Self { state: Arc::new(state) }
	}

	pub fn refusing_to_start() -> Self {
		let site = Self::default();
		site.state.refuse_start.store(true, Ordering::SeqCst);
		site
	}

	pub fn visits(&self) -> Vec<String> {
		self.state.visits.lock().unwrap().clone()
	}

	pub fn starts(&self) -> usize {
		self.state.starts.load(Ordering::SeqCst)
	}

	pub fn stops(&self) -> usize {
		self.state.stops.load(Ordering::SeqCst)
	}

	/// Pages opened but never closed
	pub fn leaked_pages(&self) -> usize {
		self.state.opened.load(Ordering::SeqCst) - self.state.closed.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Renderer for FakeSite {
	async fn start(&self) -> Result<(), RenderError> {
		self.state.starts.fetch_add(1, Ordering::SeqCst);
		if self.state.refuse_start.load(Ordering::SeqCst) {
			return Err(RenderError::Launch("no chromium in this sandbox".into()));
		}
		Ok(())
	}

	async fn new_page(&self) -> Result<Box<dyn RenderedPage>, RenderError> {
		self.state.opened.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(FakePage {
			state: self.state.clone(),
			current: Mutex::new(blank()),
		}))
	}

	async fn stop(&self) {
		self.state.stops.fetch_add(1, Ordering::SeqCst);
	}
}

fn blank() -> HtmlSnapshot {
	HtmlSnapshot::new("about:blank".into(), "<html><body></body></html>".into())
}

struct FakePage {
	state: Arc<SiteState>,
	current: Mutex<HtmlSnapshot>,
}

impl FakePage {
	fn snapshot(&self) -> HtmlSnapshot {
		self.current.lock().unwrap().clone()
	}
}

#[async_trait]
impl RenderedPage for FakePage {
	async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), RenderError> {
		self.state.visits.lock().unwrap().push(url.to_string());
		match self.state.pages.get(url) {
			Some(html) => {
				*self.current.lock().unwrap() = HtmlSnapshot::new(url.to_string(), html.clone());
				Ok(())
			}
			None => Err(RenderError::NavigationTimeout {
				url: url.to_string(),
				timeout: Duration::from_secs(60),
			}),
		}
	}

	async fn url(&self) -> Result<String, RenderError> {
		self.snapshot().url().await
	}

	async fn html(&self) -> Result<String, RenderError> {
		self.snapshot().html().await
	}

	async fn inner_text(&self, selector: &str) -> Result<Option<String>, RenderError> {
		self.snapshot().inner_text(selector).await
	}

	async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, RenderError> {
		self.snapshot().inner_texts(selector).await
	}

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, RenderError> {
		self.snapshot().attribute(selector, name).await
	}

	async fn table_rows(&self) -> Result<Vec<Vec<String>>, RenderError> {
		self.snapshot().table_rows().await
	}

	async fn close(self: Box<Self>) {
		self.state.closed.fetch_add(1, Ordering::SeqCst);
	}
}

/// Answers submissions from a script and records what it was sent
#[derive(Default)]
pub struct ScriptedServer {
	replies: Mutex<VecDeque<SubmitResponse>>,
	downloads: HashMap<String, Vec<u8>>,
	pub submitted: Mutex<Vec<(String, AnswerPayload)>>,
}

impl ScriptedServer {
	pub fn new(replies: Vec<serde_json::Value>) -> Self {
		Self {
			replies: Mutex::new(replies.into_iter().map(|r| serde_json::from_value(r).unwrap()).collect()),
			..Default::default()
		}
	}

	pub fn with_download(mut self, url: &str, bytes: Vec<u8>) -> Self {
		self.downloads.insert(url.to_string(), bytes);
		self
	}

	pub fn submitted(&self) -> Vec<(String, AnswerPayload)> {
		self.submitted.lock().unwrap().clone()
	}
}

#[async_trait]
impl Submitter for ScriptedServer {
	async fn submit(&self, url: &str, payload: &AnswerPayload, _timeout: Duration) -> Result<SubmitResponse, SubmitError> {
		self.submitted.lock().unwrap().push((url.to_string(), payload.clone()));
		self.replies.lock().unwrap().pop_front().ok_or_else(|| SubmitError::Status { url: url.to_string(), status: 503 })
	}

	async fn download(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, SubmitError> {
		self.downloads.get(url).cloned().ok_or_else(|| SubmitError::Status { url: url.to_string(), status: 404 })
	}
}

/// A PDF with one text line per row, every row positioned on its own like table generators lay them out.
/// `font` is the dictionary behind `/F1`.
pub fn pdf_document(pages: &[&[&str]], font: lopdf::Dictionary) -> Vec<u8> {
	use lopdf::{
		Document, Object, Stream,
		content::{Content, Operation},
		dictionary,
	};

	let mut doc = Document::with_version("1.5");
	let pages_id = doc.new_object_id();
	let font_id = doc.add_object(font);
	let resources_id = doc.add_object(dictionary! { "Font" => dictionary! { "F1" => font_id } });

	let kids: Vec<Object> = pages
		.iter()
		.map(|rows| {
			let operations: Vec<Operation> = rows
				.iter()
				.enumerate()
				.flat_map(|(i, row)| {
					vec![
						Operation::new("BT", vec![]),
						Operation::new("Tf", vec!["F1".into(), 12.into()]),
						Operation::new("Td", vec![72.into(), (720 - 40 * i as i64).into()]),
						Operation::new("Tj", vec![Object::string_literal(*row)]),
						Operation::new("ET", vec![]),
					]
				})
				.collect();
			let content_id = doc.add_object(Stream::new(dictionary! {}, Content { operations }.encode().unwrap()));
			doc.add_object(dictionary! {
				"Type" => "Page",
				"Parent" => pages_id,
				"Contents" => content_id,
				"Resources" => resources_id,
				"MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
			})
			.into()
		})
		.collect();

	let count = kids.len() as i64;
	doc.objects.insert(
		pages_id,
		Object::Dictionary(dictionary! {
			"Type" => "Pages",
			"Kids" => kids,
			"Count" => count,
		}),
	);
	let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
	doc.trailer.set("Root", catalog_id);

	let mut bytes = Vec::new();
	doc.save_to(&mut bytes).unwrap();
	bytes
}

pub fn courier() -> lopdf::Dictionary {
	lopdf::dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Courier" }
}

/// Type0 font without descendant fonts; pdf-extract panics on it instead of erroring
pub fn broken_type0_font() -> lopdf::Dictionary {
	lopdf::dictionary! { "Type" => "Font", "Subtype" => "Type0", "BaseFont" => "Broken", "Encoding" => "Identity-H" }
}

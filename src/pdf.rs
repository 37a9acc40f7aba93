//! Thin helpers over `pdf-extract`: per-page text, and tables recovered from that text.

use std::panic::{AssertUnwindSafe, catch_unwind};

/// Rows of cells; the first row is the header
pub type Table = Vec<Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
	#[error("unreadable PDF: {0}")]
	Unreadable(#[from] pdf_extract::OutputError),
	/// pdf-extract panics on some malformed documents (broken font dictionaries, unknown cmaps)
	#[error("malformed PDF: {0}")]
	Malformed(String),
}

/// Plain text of every page, in page order
pub fn page_texts(bytes: &[u8]) -> Result<Vec<String>, PdfError> {
	match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes))) {
		Ok(pages) => Ok(pages?),
		Err(panic) => {
			let reason = panic
				.downcast_ref::<&str>()
				.map(|s| s.to_string())
				.or_else(|| panic.downcast_ref::<String>().cloned())
				.unwrap_or_else(|| "parser panicked".to_string());
			Err(PdfError::Malformed(reason))
		}
	}
}

/// Tables of every page, in page order
pub fn extract_tables(bytes: &[u8]) -> Result<Vec<Vec<Table>>, PdfError> {
	Ok(page_texts(bytes)?.iter().map(|text| tables_in_text(text)).collect())
}

/// Split a page's text into tables.
///
/// A table is a maximal run of lines that each have at least two cells. Blank lines are skipped, since
/// pdf-extract puts one between separately positioned rows; any other line with fewer cells ends the table.
/// Cells are separated by tabs or runs of 2+ spaces when a line has any, otherwise by single whitespace.
pub fn tables_in_text(text: &str) -> Vec<Table> {
	let mut tables = Vec::new();
	let mut current: Table = Vec::new();
	for line in text.lines().filter(|l| !l.trim().is_empty()) {
		let cells = split_cells(line);
		if cells.len() >= 2 {
			current.push(cells);
		} else if !current.is_empty() {
			tables.push(std::mem::take(&mut current));
		}
	}
	if !current.is_empty() {
		tables.push(current);
	}
	tables
}

fn split_cells(line: &str) -> Vec<String> {
	let line = line.trim();
	if !(line.contains('\t') || line.contains("  ")) {
		return line.split_whitespace().map(str::to_string).collect();
	}
	line.split('\t').flat_map(|part| part.split("  ")).map(str::trim).filter(|c| !c.is_empty()).map(str::to_string).collect()
}

/// Sum of the `value` column over every table whose header has one.
///
/// Header match is exact, case-insensitive, after trimming. Cells are comma-stripped before parsing;
/// cells that do not parse (or are missing) are skipped.
pub fn sum_value_columns(tables: &[Table]) -> f64 {
	tables
		.iter()
		.filter_map(|table| {
			let (header, rows) = table.split_first()?;
			let idx = header.iter().position(|h| h.trim().eq_ignore_ascii_case("value"))?;
			Some(rows.iter().filter_map(|row| row.get(idx)).filter_map(|cell| parse_number(cell)).fold(0.0, |acc, n| acc + n))
		})
		.fold(0.0, |acc, n| acc + n)
}

/// Thousands separators stripped, surrounding whitespace ignored
pub fn parse_number(cell: &str) -> Option<f64> {
	cell.replace(',', "").trim().parse::<f64>().ok()
}

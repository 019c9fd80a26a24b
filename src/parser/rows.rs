use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Selector};
use tracing::debug;

use super::sections::{cell_text, row_cells, section_table, table_rows};
use crate::model::{Record, SectionTag};

/// Rows with fewer cells than this are dropped.
pub const MIN_COLUMNS: usize = 5;
/// Column carrying group metadata in grouped sections.
pub const GROUP_METADATA_COLUMN: usize = 8;
/// Class on the identity cell's inner element marking the current version.
pub const CURRENT_MARKER: &str = "posledni";

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static DOCUMENT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/isir/doc/dokument\.pdf\?id=\d+").unwrap());
static INLINE_ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)dokument\w*\(\s*['"]?(\d+)['"]?\s*\)"#).unwrap());

/// Where attachment links resolve to.
#[derive(Debug, Clone)]
pub struct DocumentLinks {
    pub page: Url,
    pub document_base: String,
}

impl DocumentLinks {
    fn synthesize(&self, doc_id: &str) -> String {
        format!("{}{}", self.document_base, doc_id)
    }
}

/// Extract the records of one section container, oldest first.
///
/// The source lists newest first, so rows are read in order and then reversed.
/// `is_new` is left false here; the differencer fills it in.
pub fn extract_records(container: ElementRef<'_>, tag: SectionTag, links: &DocumentLinks) -> Vec<Record> {
    let Some(table) = section_table(container) else {
        debug!(section = %tag, "section has no table");
        return Vec::new();
    };

    let mut records: Vec<Record> = table_rows(table)
        .into_iter()
        .skip(1)
        .filter_map(|row| parse_row(&row_cells(row), tag, links))
        .collect();
    records.reverse();
    records
}

fn parse_row(cells: &[ElementRef<'_>], tag: SectionTag, links: &DocumentLinks) -> Option<Record> {
    if cells.len() < MIN_COLUMNS {
        debug!(section = %tag, columns = cells.len(), "dropping short row");
        return None;
    }

    // Spacer and subtotal rows span the full width with a blank identity cell.
    // An empty id would also poison the seen-set, so they go like short rows.
    let id = cell_text(cells[0]);
    if id.is_empty() {
        debug!(section = %tag, "dropping row without identity");
        return None;
    }

    let timestamp_text = format!("{} {}", cell_text(cells[1]), cell_text(cells[2]));
    let description = cell_text(cells[3]);
    let attachment_url = cells.iter().find_map(|cell| resolve_attachment(*cell, links));

    let group_metadata = if tag.is_grouped() {
        cells
            .get(GROUP_METADATA_COLUMN)
            .map(|cell| cell_text(*cell))
            .filter(|t| !is_placeholder(t))
    } else {
        None
    };

    Some(Record {
        id,
        timestamp_text,
        description,
        is_available: attachment_url.is_some(),
        attachment_url,
        is_muted: is_muted(cells[0]),
        is_new: false,
        group_metadata,
    })
}

/// A direct document link wins over an inline reference in the same cell.
fn resolve_attachment(cell: ElementRef<'_>, links: &DocumentLinks) -> Option<String> {
    direct_link(cell, links).or_else(|| inline_reference(cell, links))
}

fn direct_link(cell: ElementRef<'_>, links: &DocumentLinks) -> Option<String> {
    cell.select(&LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| links.page.join(href.trim()).ok())
        .map(String::from)
        .find(|url| DOCUMENT_LINK_RE.is_match(url))
}

fn inline_reference(cell: ElementRef<'_>, links: &DocumentLinks) -> Option<String> {
    // descendants() starts with the cell itself
    cell.descendants()
        .filter_map(ElementRef::wrap)
        .flat_map(|el| el.value().attrs().map(|(_, value)| value))
        .find_map(|value| INLINE_ACTION_RE.captures(value))
        .map(|caps| links.synthesize(&caps[1]))
}

/// Muted unless the identity cell's inner element carries the current marker.
/// No inner element at all gets the benefit of the doubt.
fn is_muted(id_cell: ElementRef<'_>) -> bool {
    match id_cell.children().find_map(ElementRef::wrap) {
        Some(inner) => !inner.value().classes().any(|c| c == CURRENT_MARKER),
        None => false,
    }
}

fn is_placeholder(text: &str) -> bool {
    matches!(text, "" | "-" | "–" | "—")
}

// ── Tests ──

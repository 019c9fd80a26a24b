use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::EngineError;
use crate::model::SectionTag;

const CONTAINER_ID_PREFIX: &str = "zalozka";

static CONTAINER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[id^="zalozka"]"#).unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

/// Locate the container element for every known section tag.
///
/// Containers whose suffix is not a known tag are ignored. A tag claimed by
/// more than one container is reported as failed for that tag only.
pub fn find_containers(doc: &Html) -> BTreeMap<SectionTag, Result<ElementRef<'_>, EngineError>> {
    let mut found: BTreeMap<SectionTag, Result<ElementRef<'_>, EngineError>> = BTreeMap::new();

    for el in doc.select(&CONTAINER_SEL) {
        let Some(suffix) = el
            .value()
            .id()
            .and_then(|id| id.strip_prefix(CONTAINER_ID_PREFIX))
        else {
            continue;
        };
        let Some(tag) = SectionTag::parse(suffix) else {
            debug!(container = suffix, "ignoring unknown section container");
            continue;
        };
        let entry = if found.contains_key(&tag) {
            Err(EngineError::extraction(format!(
                "section {} has more than one container",
                tag
            )))
        } else {
            Ok(el)
        };
        found.insert(tag, entry);
    }

    found
}

/// First table inside a container, if the section has any records at all.
pub fn section_table<'a>(container: ElementRef<'a>) -> Option<ElementRef<'a>> {
    container.select(&TABLE_SEL).next()
}

/// Rows that belong to `table` itself, looking through thead/tbody/tfoot but
/// never into nested tables.
pub fn table_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

/// Direct `td`/`th` children of a row.
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// Whitespace-normalized text content of an element.
pub fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──

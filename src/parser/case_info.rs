use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::sections::{cell_text, row_cells};
use crate::model::CaseInfo;

const TITLE_ROW_CLASS: &str = "nadpis";
const STATUS_LABEL: &str = "Stav řízení";
const CASE_NUMBER_LABEL: &str = "Spisová značka";

static BLOCK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[role="presentation"]"#).unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static EMPHASIS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());

pub fn extract(doc: &Html) -> CaseInfo {
    let Some(block) = doc.select(&BLOCK_SEL).next() else {
        return CaseInfo::default();
    };
    let rows: Vec<ElementRef<'_>> = block.select(&ROW_SEL).collect();

    let name = rows
        .iter()
        .find(|r| r.value().has_class(TITLE_ROW_CLASS, scraper::CaseSensitivity::AsciiCaseInsensitive))
        .and_then(|r| r.select(&HEADING_SEL).next())
        .map(cell_text)
        .filter(|t| !t.is_empty());

    let status = labelled_value(&rows, STATUS_LABEL)
        .map(cell_text)
        .filter(|t| !t.is_empty());

    let (case_number, authority) = labelled_value(&rows, CASE_NUMBER_LABEL)
        .map(split_case_number)
        .unwrap_or((None, None));

    CaseInfo {
        name,
        status,
        case_number,
        authority,
    }
}

/// Value cell of the first row whose label cell contains `label`.
fn labelled_value<'a>(rows: &[ElementRef<'a>], label: &str) -> Option<ElementRef<'a>> {
    rows.iter().find_map(|row| {
        let cells = row_cells(*row);
        match cells.as_slice() {
            [head, value, ..] if cell_text(*head).contains(label) => Some(*value),
            _ => None,
        }
    })
}

/// Case number is the first plain emphasized run; the authority is the
/// emphasized run nested inside a colored or styled element.
fn split_case_number(cell: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let mut case_number = None;
    let mut authority = None;

    for em in cell.select(&EMPHASIS_SEL) {
        let text = cell_text(em);
        if text.is_empty() {
            continue;
        }
        if is_styled_within(em, cell) {
            authority.get_or_insert(text);
        } else {
            case_number.get_or_insert(text);
        }
    }

    (case_number, authority)
}

fn is_styled_within(el: ElementRef<'_>, cell: ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|n| n.id() != cell.id())
        .filter_map(ElementRef::wrap)
        .any(|a| {
            let v = a.value();
            (v.name() == "font" && v.attr("color").is_some())
                || (v.name() == "span" && v.attr("style").is_some())
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_case_info() {
        let html = std::fs::read_to_string("tests/fixtures/case_detail.html").unwrap();
        let info = extract(&Html::parse_document(&html));
        assert_eq!(info.name.as_deref(), Some("Jan Novák"));
        assert_eq!(info.status.as_deref(), Some("KONKURS"));
        assert_eq!(info.case_number.as_deref(), Some("KSPH 38 INS 12345 / 2023"));
        assert_eq!(info.authority.as_deref(), Some("Krajský soud v Praze"));
    }

    #[test]
    fn missing_block_is_empty() {
        let info = extract(&Html::parse_document("<html><body><p>nic</p></body></html>"));
        assert!(info.is_empty());
    }

    #[test]
    fn fields_are_independent() {
        let html = r#"<table role="presentation">
            <tr><td>Stav řízení:</td><td>ODDLUŽENÍ</td></tr>
            <tr><td>Spisová značka:</td><td><font color="red"><b>Krajský soud v Brně</b></font></td></tr>
        </table>"#;
        let info = extract(&Html::parse_document(html));
        assert_eq!(info.name, None);
        assert_eq!(info.status.as_deref(), Some("ODDLUŽENÍ"));
        assert_eq!(info.case_number, None);
        assert_eq!(info.authority.as_deref(), Some("Krajský soud v Brně"));
    }

    #[test]
    fn plain_case_number_without_authority() {
        let html = r#"<table role="presentation">
            <tr><th>Spisová značka</th><td><strong>MSPH 60 INS 1 / 2024</strong></td></tr>
        </table>"#;
        let info = extract(&Html::parse_document(html));
        assert_eq!(info.case_number.as_deref(), Some("MSPH 60 INS 1 / 2024"));
        assert_eq!(info.authority, None);
    }
}

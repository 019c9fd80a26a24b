pub mod case_info;
pub mod grouping;
pub mod rows;
pub mod sections;

use std::collections::BTreeMap;

use scraper::Html;
use tracing::warn;

use crate::error::EngineError;
use crate::model::{CaseInfo, Section, SectionTag};
use rows::DocumentLinks;

/// Everything extracted from one document, before diffing.
#[derive(Debug)]
pub struct ParsedPage {
    pub sections: BTreeMap<SectionTag, Section>,
    pub section_errors: BTreeMap<SectionTag, String>,
    pub case_info: CaseInfo,
}

/// Document → per-section records → groups for C/P, plus case metadata.
///
/// Each section is extracted on its own: a failed section gets an empty slot
/// and an entry in `section_errors`, the others are unaffected.
pub fn parse_page(html: &str, links: &DocumentLinks) -> ParsedPage {
    let doc = Html::parse_document(html);
    let mut containers = sections::find_containers(&doc);

    let mut parsed = BTreeMap::new();
    let mut section_errors = BTreeMap::new();

    for tag in SectionTag::ALL {
        let section = match containers.remove(&tag) {
            None => Section::empty(tag),
            Some(Err(e)) => {
                warn!(section = %tag, error = %e, "section extraction failed");
                section_errors.insert(tag, e.to_string());
                Section::empty(tag)
            }
            Some(Ok(container)) => {
                let records = rows::extract_records(container, tag, links);
                if tag.is_grouped() {
                    Section::Grouped(grouping::group_records(records, tag))
                } else {
                    Section::Flat(records)
                }
            }
        };
        parsed.insert(tag, section);
    }

    ParsedPage {
        sections: parsed,
        section_errors,
        case_info: case_info::extract(&doc),
    }
}

pub fn links_for(page_url: &str, document_base: &str) -> Result<DocumentLinks, EngineError> {
    let page = reqwest::Url::parse(page_url).map_err(|e| EngineError::InvalidUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(DocumentLinks {
        page,
        document_base: document_base.to_string(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_DOCUMENT_BASE;

    const PAGE_URL: &str = "https://isir.justice.cz/isir/ueu/evidence_upadcu_detail.do?id=42";

    fn parse_fixture() -> ParsedPage {
        let html = std::fs::read_to_string("tests/fixtures/case_detail.html").unwrap();
        parse_page(&html, &links_for(PAGE_URL, DEFAULT_DOCUMENT_BASE).unwrap())
    }

    #[test]
    fn fixture_has_all_five_slots() {
        let page = parse_fixture();
        let tags: Vec<_> = page.sections.keys().copied().collect();
        assert_eq!(tags, SectionTag::ALL.to_vec());
        assert!(page.section_errors.is_empty());
    }

    #[test]
    fn fixture_section_a() {
        let page = parse_fixture();
        let Section::Flat(a) = &page.sections[&SectionTag::A] else {
            panic!("A must be flat");
        };
        let ids: Vec<_> = a.iter().map(|r| r.id.as_str()).collect();
        // short row A-0 dropped, order oldest first
        assert_eq!(ids, vec!["A-1", "A-2", "A-3"]);
        assert_eq!(a[0].timestamp_text, "05.01.2023 09:12");
        assert_eq!(
            a[0].attachment_url.as_deref(),
            Some("https://isir.justice.cz/isir/doc/dokument.PDF?id=1001")
        );
        assert_eq!(
            a[1].attachment_url.as_deref(),
            Some("https://isir.justice.cz/isir/doc/dokument.PDF?id=1002")
        );
        assert!(a[1].is_muted);
        assert!(!a[2].is_available);
    }

    #[test]
    fn fixture_section_b_empty_without_table() {
        let page = parse_fixture();
        assert_eq!(page.sections[&SectionTag::B], Section::Flat(vec![]));
    }

    #[test]
    fn fixture_section_c_groups() {
        let page = parse_fixture();
        let Section::Grouped(c) = &page.sections[&SectionTag::C] else {
            panic!("C must be grouped");
        };
        let keys: Vec<_> = c.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["C1", "C2", "C10"]);
        assert_eq!(c[0].metadata, "KSPH 38 ICM 100 / 2023");
        let c1: Vec<_> = c[0].members.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(c1, vec!["C1-1", "C1-2"]);
    }

    #[test]
    fn fixture_missing_d_and_p() {
        let page = parse_fixture();
        assert_eq!(page.sections[&SectionTag::D], Section::Flat(vec![]));
        assert_eq!(page.sections[&SectionTag::P], Section::Grouped(vec![]));
    }

    #[test]
    fn duplicate_container_isolated() {
        let html = r#"
            <div id="zalozkaA"><table><tr><th>h</th></tr>
              <tr><td>A-1</td><td>d</td><td>t</td><td>x</td><td></td></tr></table></div>
            <div id="zalozkaD"></div>
            <div id="zalozkaD"></div>"#;
        let page = parse_page(html, &links_for(PAGE_URL, DEFAULT_DOCUMENT_BASE).unwrap());
        assert!(page.section_errors.contains_key(&SectionTag::D));
        assert_eq!(page.sections[&SectionTag::D], Section::Flat(vec![]));
        assert_eq!(page.sections[&SectionTag::A].records().count(), 1);
    }

    #[test]
    fn bad_page_url_is_rejected() {
        let err = links_for("not a url", DEFAULT_DOCUMENT_BASE).unwrap_err();
        assert!(matches!(err, EngineError::InvalidUrl { .. }));
    }
}

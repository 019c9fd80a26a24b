use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The fixed set of document regions on a case page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionTag {
    A,
    B,
    C,
    D,
    P,
}

impl SectionTag {
    pub const ALL: [SectionTag; 5] = [
        SectionTag::A,
        SectionTag::B,
        SectionTag::C,
        SectionTag::D,
        SectionTag::P,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionTag::A => "A",
            SectionTag::B => "B",
            SectionTag::C => "C",
            SectionTag::D => "D",
            SectionTag::P => "P",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        SectionTag::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// C and P list records in hierarchical groups; the rest are flat.
    pub fn is_grouped(self) -> bool {
        matches!(self, SectionTag::C | SectionTag::P)
    }
}

impl fmt::Display for SectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub timestamp_text: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub is_available: bool,
    pub is_muted: bool,
    pub is_new: bool,
    pub group_metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: String,
    pub metadata: String,
    pub members: Vec<Record>,
}

/// A section's payload. The shape is fixed by the tag, not by the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section {
    Flat(Vec<Record>),
    Grouped(Vec<Group>),
}

impl Section {
    pub fn empty(tag: SectionTag) -> Self {
        if tag.is_grouped() {
            Section::Grouped(Vec::new())
        } else {
            Section::Flat(Vec::new())
        }
    }

    pub fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            Section::Flat(records) => Box::new(records.iter()),
            Section::Grouped(groups) => Box::new(groups.iter().flat_map(|g| g.members.iter())),
        }
    }

    pub fn records_mut(&mut self) -> Box<dyn Iterator<Item = &mut Record> + '_> {
        match self {
            Section::Flat(records) => Box::new(records.iter_mut()),
            Section::Grouped(groups) => {
                Box::new(groups.iter_mut().flat_map(|g| g.members.iter_mut()))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
}

impl CaseInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.case_number.is_none()
            && self.authority.is_none()
    }
}

/// Result of one successful pass over a source.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub url: String,
    pub checked_at: String,
    pub sections: BTreeMap<SectionTag, Section>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub section_errors: BTreeMap<SectionTag, String>,
    pub case_info: CaseInfo,
    /// True when the seen-set was empty before this pass, so the pass only
    /// recorded a baseline and could not flag anything.
    pub baseline: bool,
    pub new_count: usize,
    pub total_count: usize,
}

impl Report {
    /// New records in section order, tagged with their section.
    pub fn new_records(&self) -> impl Iterator<Item = (SectionTag, &Record)> {
        self.sections
            .iter()
            .flat_map(|(tag, section)| section.records().map(move |r| (*tag, r)))
            .filter(|(_, r)| r.is_new)
    }
}

/// Envelope handed back to whatever shell drives the engine.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckOutcome {
    Ok(Report),
    Error { message: String },
}

impl From<Result<Report, EngineError>> for CheckOutcome {
    fn from(result: Result<Report, EngineError>) -> Self {
        match result {
            Ok(report) => CheckOutcome::Ok(report),
            Err(e) => CheckOutcome::Error {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> Record {
        Record {
            id: id.into(),
            timestamp_text: "01.02.2024 10:00".into(),
            description: "Vyhláška".into(),
            attachment_url: None,
            is_available: false,
            is_muted: false,
            is_new: false,
            group_metadata: None,
        }
    }

    #[test]
    fn tags_serialize_as_letters() {
        let mut sections = BTreeMap::new();
        sections.insert(SectionTag::P, Section::empty(SectionTag::P));
        sections.insert(SectionTag::A, Section::Flat(vec![record("A-1")]));
        let json = serde_json::to_value(&sections).unwrap();
        assert_eq!(json["A"][0]["id"], "A-1");
        assert_eq!(json["P"], serde_json::json!([]));
        // BTreeMap keeps A before P
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["A", "P"]);
    }

    #[test]
    fn empty_case_info_is_empty_object() {
        let json = serde_json::to_value(CaseInfo::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn error_envelope_shape() {
        let outcome = CheckOutcome::from(Err::<Report, _>(EngineError::extraction("boom")));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "extraction failed: boom");
    }

    #[test]
    fn grouped_records_iterate_members() {
        let section = Section::Grouped(vec![
            Group {
                key: "C1".into(),
                metadata: String::new(),
                members: vec![record("C1-1"), record("C1-2")],
            },
            Group {
                key: "C2".into(),
                metadata: String::new(),
                members: vec![record("C2-1")],
            },
        ]);
        let ids: Vec<_> = section.records().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["C1-1", "C1-2", "C2-1"]);
    }

    #[test]
    fn parse_rejects_unknown_tags() {
        assert_eq!(SectionTag::parse("C"), Some(SectionTag::C));
        assert_eq!(SectionTag::parse("E"), None);
        assert_eq!(SectionTag::parse("c"), None);
    }
}

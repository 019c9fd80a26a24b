use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Group, Record, SectionTag};

/// Key of the group collecting records whose identity has no `<tag><digits>` prefix.
pub const UNGROUPED_KEY: &str = "*";

/// Leading `<tag><digits>` prefix of an identity, e.g. `C12` for `C12-3`.
pub fn group_key(id: &str, tag: SectionTag) -> Option<String> {
    let rest = id.strip_prefix(tag.as_str())?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("{}{}", tag, digits))
    }
}

/// Cluster oldest-first records into groups ordered naturally by key.
///
/// Members keep the oldest-first order. A group's metadata comes from the first
/// member carrying any in source order, which is newest first.
pub fn group_records(records: Vec<Record>, tag: SectionTag) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = group_key(&record.id, tag).unwrap_or_else(|| UNGROUPED_KEY.to_string());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                key,
                metadata: String::new(),
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(record);
    }

    for group in &mut groups {
        group.metadata = group
            .members
            .iter()
            .rev()
            .find_map(|r| r.group_metadata.clone().filter(|m| !m.is_empty()))
            .unwrap_or_default();
    }

    groups.sort_by(|a, b| compare_keys(&a.key, &b.key));
    groups
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a == UNGROUPED_KEY, b == UNGROUPED_KEY) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => natural_cmp(a, b),
    }
}

/// Natural ordering: digit runs compare numerically, other runs compare
/// case-insensitively, run by run. `C2` sorts before `C10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ra = runs(a);
    let rb = runs(b);
    for (x, y) in ra.iter().zip(rb.iter()) {
        let ord = match (x, y) {
            (Run::Digits(x), Run::Digits(y)) => cmp_digits(x, y),
            (Run::Text(x), Run::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Run::Digits(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ra.len().cmp(&rb.len())
}

enum Run<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn runs(s: &str) -> Vec<Run<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;
    for (i, c) in s.char_indices() {
        let d = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != d => {
                out.push(make_run(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(d);
    }
    if let Some(d) = in_digits {
        out.push(make_run(&s[start..], d));
    }
    out
}

fn make_run(s: &str, digits: bool) -> Run<'_> {
    if digits {
        Run::Digits(s)
    } else {
        Run::Text(s)
    }
}

/// Compare digit strings by value without parsing, so long runs cannot overflow.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, meta: Option<&str>) -> Record {
        Record {
            id: id.into(),
            timestamp_text: String::new(),
            description: String::new(),
            attachment_url: None,
            is_available: false,
            is_muted: false,
            is_new: false,
            group_metadata: meta.map(String::from),
        }
    }

    #[test]
    fn natural_order_of_keys() {
        let groups = group_records(
            vec![rec("C10-1", None), rec("C2-1", None), rec("C1-1", None)],
            SectionTag::C,
        );
        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["C1", "C2", "C10"]);
    }

    #[test]
    fn natural_cmp_basics() {
        assert_eq!(natural_cmp("C2", "C10"), Ordering::Less);
        assert_eq!(natural_cmp("c2", "C2"), Ordering::Equal);
        assert_eq!(natural_cmp("P007", "P7"), Ordering::Equal);
        assert_eq!(natural_cmp("P7", "P7a"), Ordering::Less);
        assert_eq!(
            natural_cmp("C99999999999999999999999", "C100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn group_key_requires_tag_and_digits() {
        assert_eq!(group_key("C12-3", SectionTag::C).as_deref(), Some("C12"));
        assert_eq!(group_key("P4", SectionTag::P).as_deref(), Some("P4"));
        assert_eq!(group_key("P4", SectionTag::C), None);
        assert_eq!(group_key("C-1", SectionTag::C), None);
        assert_eq!(group_key("", SectionTag::C), None);
    }

    #[test]
    fn unmatched_ids_fall_into_catch_all_last() {
        let groups = group_records(
            vec![rec("poznámka", None), rec("P3-1", None), rec("P1-1", None)],
            SectionTag::P,
        );
        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["P1", "P3", UNGROUPED_KEY]);
        assert_eq!(groups[2].members[0].id, "poznámka");
    }

    #[test]
    fn members_stay_oldest_first() {
        let groups = group_records(
            vec![rec("C1-1", None), rec("C2-1", None), rec("C1-2", None)],
            SectionTag::C,
        );
        let c1: Vec<_> = groups[0].members.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(c1, vec!["C1-1", "C1-2"]);
    }

    #[test]
    fn metadata_from_first_in_source_order() {
        // oldest-first input; source order is the reverse
        let groups = group_records(
            vec![
                rec("C1-1", Some("older ref")),
                rec("C1-2", None),
                rec("C1-3", Some("newest ref")),
            ],
            SectionTag::C,
        );
        assert_eq!(groups[0].metadata, "newest ref");
    }

    #[test]
    fn metadata_empty_when_no_member_has_it() {
        let groups = group_records(vec![rec("C5-1", None)], SectionTag::C);
        assert_eq!(groups[0].metadata, "");
    }
}

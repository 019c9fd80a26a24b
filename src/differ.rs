use std::collections::{BTreeSet, HashMap, HashSet};

/// Tracks which record identities one source has already shown.
///
/// The seen-set only grows. An identity is "new" when it is missing from a
/// non-empty seen-set; against an empty set nothing is new, because there is
/// no baseline to compare with.
#[derive(Debug, Default, Clone)]
pub struct Differencer {
    seen: HashSet<String>,
}

impl Differencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Compute `is_new` for every identity without touching the seen-set.
    pub fn diff<'a, I>(&self, ids: I) -> HashMap<String, bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let has_baseline = !self.is_empty();
        ids.into_iter()
            .map(|id| (id.to_string(), has_baseline && !self.contains(id)))
            .collect()
    }

    pub fn commit<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            if !self.contains(id) {
                self.seen.insert(id.to_string());
            }
        }
    }

    /// One pass: diff against the state before the pass, then merge the pass in.
    pub fn diff_and_commit(&mut self, ids: &[&str]) -> HashMap<String, bool> {
        let flags = self.diff(ids.iter().copied());
        self.commit(ids.iter().copied());
        flags
    }

    pub fn export_seen(&self) -> BTreeSet<String> {
        self.seen.iter().cloned().collect()
    }

    pub fn import_seen<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.seen.extend(ids);
    }
}

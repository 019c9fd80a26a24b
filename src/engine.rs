use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info};

use crate::differ::Differencer;
use crate::error::EngineError;
use crate::fetch;
use crate::model::Report;
use crate::parser;
use crate::settings::Settings;

/// Fetch → parse → diff for one monitored source.
///
/// Each source needs its own engine: identities are only unique within one
/// case page, so sharing a seen-set across pages would be wrong.
pub struct Engine {
    client: Client,
    document_base: String,
    differ: Mutex<Differencer>,
}

impl Engine {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Engine {
            client,
            document_base: settings.document_base.clone(),
            differ: Mutex::new(Differencer::new()),
        }
    }

    /// Seed the seen-set, e.g. from what the shell persisted last run.
    pub fn with_seen<I>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.import_seen(ids);
        self
    }

    pub fn import_seen<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.differ
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .import_seen(ids);
    }

    pub fn export_seen(&self) -> BTreeSet<String> {
        self.differ
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .export_seen()
    }

    /// One full check. A transport failure returns before the seen-set is touched.
    pub async fn process(&self, url: &str) -> Result<Report, EngineError> {
        let body = fetch::fetch_document(&self.client, url).await?;
        self.process_document(url, &body)
    }

    /// Parse an already retrieved document and diff it against the seen-set.
    pub fn process_document(&self, url: &str, html: &str) -> Result<Report, EngineError> {
        let links = parser::links_for(url, &self.document_base)?;
        let mut page = parser::parse_page(html, &links);

        let (baseline, flags) = {
            let ids: Vec<&str> = page
                .sections
                .values()
                .flat_map(|s| s.records())
                .map(|r| r.id.as_str())
                .collect();
            // read, flag and commit under one lock
            let mut differ = self.differ.lock().unwrap_or_else(PoisonError::into_inner);
            let baseline = differ.is_empty();
            let flags = differ.diff_and_commit(&ids);
            debug!(url, seen = differ.len(), baseline, "seen-set updated");
            (baseline, flags)
        };

        let mut new_count = 0;
        let mut total_count = 0;
        for record in page.sections.values_mut().flat_map(|s| s.records_mut()) {
            record.is_new = flags.get(&record.id).copied().unwrap_or(false);
            total_count += 1;
            if record.is_new {
                new_count += 1;
            }
        }

        if baseline {
            info!(url, total = total_count, "baseline recorded");
        } else {
            info!(url, total = total_count, new = new_count, "check complete");
        }

        Ok(Report {
            url: url.to_string(),
            checked_at: Utc::now().to_rfc3339(),
            sections: page.sections,
            section_errors: page.section_errors,
            case_info: page.case_info,
            baseline,
            new_count,
            total_count,
        })
    }
}

// ── Tests ──

//! Credit budget tracking.
//!
//! The provider only reports recent requests, so usage is accumulated in a
//! local ledger file (`budget.ledger_path`, `log_data.json` by default):
//!
//! ```json
//! { "budgetDate": "2024-03-01T09:00:00Z", "logs": [ { "credits": 0.42, ... } ] }
//! ```
//!
//! `budgetDate` is the fix point set by `brain budget reset`. Only requests
//! created at or after it count against the configured credits.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::gateway::AlephAlphaGateway;

/// One request as reported by `GET /users/me/requests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLog {
    pub create_timestamp: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub request_type: String,
    #[serde(default)]
    pub token_count_prompt: Option<u64>,
    #[serde(default)]
    pub image_count_prompt: Option<u64>,
    #[serde(default)]
    pub token_count_completion: Option<u64>,
    #[serde(default)]
    pub duration_millis: Option<u64>,
    #[serde(default)]
    pub credits: f64,
}

impl UsageLog {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.create_timestamp)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLedger {
    #[serde(
        rename = "budgetDate",
        default,
        serialize_with = "serialize_budget_date",
        deserialize_with = "deserialize_budget_date"
    )]
    pub budget_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: Vec<UsageLog>,
}

impl BudgetLedger {
    /// Read the ledger at `path`. A missing or unreadable file yields an empty ledger.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read budget ledger; starting empty");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "malformed budget ledger; starting empty");
            Self::default()
        })
    }

    /// Write the ledger atomically: a temp file in the same directory is renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create ledger directory: {}", dir.display()))?;

        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write budget ledger: {}", path.display()))?;
        Ok(())
    }

    /// Put `fetched` in front of the known logs and drop exact duplicates.
    pub fn merge(&mut self, fetched: Vec<UsageLog>) {
        let mut seen = HashSet::new();
        let combined = fetched.into_iter().chain(std::mem::take(&mut self.logs));
        self.logs = combined
            .filter(|log| seen.insert(serde_json::to_string(log).unwrap_or_default()))
            .collect();
    }

    /// Start counting from `now` with an empty log.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.budget_date = Some(now);
        self.logs.clear();
    }

    /// Credits used since the fix point.
    ///
    /// Without a fix point every log counts, including logs whose timestamp
    /// does not parse. A `log_data.json` with an empty `budgetDate` therefore
    /// reports all recorded credits as spent, not zero; call [`reset`] to
    /// start counting from now.
    ///
    /// [`reset`]: BudgetLedger::reset
    pub fn spent(&self) -> f64 {
        self.logs
            .iter()
            .filter(|log| match (self.budget_date, log.created_at()) {
                (None, _) => true,
                (Some(since), Some(created)) => created >= since,
                (Some(_), None) => false,
            })
            .map(|log| log.credits)
            .sum()
    }

    pub fn remaining(&self, budget: f64) -> f64 {
        budget.floor() - self.spent()
    }
}

pub fn budget_text(remaining: f64) -> String {
    format!("Aleph Alpha Budget: {:.2}", remaining)
}

/// Pull recent usage from the provider into the ledger at `path` and return
/// the remaining credits.
///
/// If the provider cannot be reached the stored ledger is used as is.
pub async fn refresh_budget(gateway: &AlephAlphaGateway, path: &Path, budget: f64) -> Result<f64> {
    let mut ledger = BudgetLedger::load(path);
    match gateway.request_log().await {
        Ok(fetched) => {
            tracing::debug!(fetched = fetched.len(), "fetched usage log");
            ledger.merge(fetched);
            ledger.save(path)?;
        }
        Err(e) => tracing::warn!(error = %e, "could not fetch usage log; using stored ledger"),
    }
    Ok(ledger.remaining(budget))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn serialize_budget_date<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(date) => serializer.serialize_str(&date.to_rfc3339()),
        None => serializer.serialize_str(""),
    }
}

/// An empty or unparsable `budgetDate` means no fix point has been set.
fn deserialize_budget_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn log(ts: &str, credits: f64) -> UsageLog {
        UsageLog {
            create_timestamp: ts.to_string(),
            model_name: "luminous-base".into(),
            request_type: "semantic_embed".into(),
            token_count_prompt: Some(12),
            image_count_prompt: Some(0),
            token_count_completion: Some(0),
            duration_millis: Some(80),
            credits,
        }
    }

    #[test]
    fn test_merge_prepends_and_dedups() {
        let mut ledger = BudgetLedger {
            budget_date: None,
            logs: vec![log("2024-01-01T00:00:00Z", 1.0)],
        };
        ledger.merge(vec![
            log("2024-01-02T00:00:00Z", 2.0),
            log("2024-01-01T00:00:00Z", 1.0),
            log("2024-01-02T00:00:00Z", 2.0),
        ]);
        let stamps: Vec<&str> = ledger.logs.iter().map(|l| l.create_timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z"]);
    }

    #[test]
    fn test_spent_counts_from_fix_point() {
        let ledger = BudgetLedger {
            budget_date: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            logs: vec![
                log("2024-01-01T23:59:59Z", 5.0),
                log("2024-01-02T00:00:00Z", 1.5),
                log("2024-01-03T10:00:00.123456", 0.25),
            ],
        };
        assert!((ledger.spent() - 1.75).abs() < 1e-9);
        assert!((ledger.remaining(10.9) - 8.25).abs() < 1e-9);
    }

    #[test]
    fn test_unset_fix_point_counts_everything() {
        let ledger = BudgetLedger {
            budget_date: None,
            logs: vec![log("2020-01-01T00:00:00Z", 1.0), log("garbage", 2.0)],
        };
        assert_eq!(ledger.spent(), 3.0);
    }

    #[test]
    fn test_budget_text() {
        assert_eq!(budget_text(8.25), "Aleph Alpha Budget: 8.25");
        assert_eq!(budget_text(-1.0), "Aleph Alpha Budget: -1.00");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/log_data.json");

        let mut ledger = BudgetLedger::default();
        ledger.reset(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        ledger.merge(vec![log("2024-03-01T10:00:00Z", 0.5)]);
        ledger.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"budgetDate\""));
        assert_eq!(BudgetLedger::load(&path), ledger);
    }

    #[test]
    fn test_load_tolerates_missing_and_malformed() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(BudgetLedger::load(&tmp.path().join("none.json")), BudgetLedger::default());

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(BudgetLedger::load(&bad), BudgetLedger::default());
    }

    #[test]
    fn test_empty_budget_date_reads_as_unset() {
        let ledger: BudgetLedger = serde_json::from_str(r#"{"budgetDate": "", "logs": []}"#).unwrap();
        assert_eq!(ledger.budget_date, None);
    }
}

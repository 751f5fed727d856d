//! Local replica of the backend's alert history.
//!
//! The replica is a snapshot: `refresh` replaces it wholesale, `delete` removes
//! an entry only after the backend confirms. Views are computed from the
//! replica without mutating it.
//!
//! A delete that completes while a refresh is in flight is remembered until
//! that refresh lands, so the refreshed list cannot resurrect the entry.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{
    image_url, parse_alert_list, parse_delete_response, DeleteRequest, Transport,
    ALERTS_DELETE_PATH, ALERTS_LIST_PATH,
};

/// Backend timestamp format, local time.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One historical detection alert as stored by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Local-time timestamp; also the alert's identifier.
    pub timestamp: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub confidences: BTreeMap<String, f64>,
}

impl Alert {
    /// Parsed timestamp. Accepts the backend format and RFC 3339.
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    pub fn image_url(&self, base_url: &Url) -> Option<Url> {
        self.image_path
            .as_deref()
            .and_then(|path| image_url(base_url, path))
    }

    fn matches_search(&self, needle_lower: &str) -> bool {
        self.classes
            .iter()
            .any(|class| class.to_lowercase().contains(needle_lower))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClassFilter {
    #[default]
    All,
    /// Exact membership in an alert's classes.
    Only(String),
}

impl ClassFilter {
    fn admits(&self, alert: &Alert) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::Only(class) => alert.classes.iter().any(|c| c == class),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(format!(
                "unknown sort order '{}'; expected newest or oldest",
                other
            )),
        }
    }
}

/// Search, class filter, and sort order for a view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub search_text: String,
    pub class_filter: ClassFilter,
    pub sort: SortOrder,
}

/// Class filter first, then case-insensitive substring search over class
/// labels, then a stable sort by timestamp. Unparseable timestamps sort as oldest.
pub fn apply_query(alerts: &[Alert], query: &AlertQuery) -> Vec<Alert> {
    let needle = query.search_text.trim().to_lowercase();
    let mut keyed: Vec<(Option<NaiveDateTime>, &Alert)> = alerts
        .iter()
        .filter(|alert| query.class_filter.admits(alert))
        .filter(|alert| needle.is_empty() || alert.matches_search(&needle))
        .map(|alert| (alert.recorded_at(), alert))
        .collect();

    // sort_by is stable, so equal timestamps keep fetch order in both directions.
    keyed.sort_by(|(a, _), (b, _)| match query.sort {
        SortOrder::Newest => b.cmp(a),
        SortOrder::Oldest => a.cmp(b),
    });
    keyed.into_iter().map(|(_, alert)| alert.clone()).collect()
}

/// Sorted union of every alert's classes.
pub fn distinct_classes(alerts: &[Alert]) -> Vec<String> {
    alerts
        .iter()
        .flat_map(|alert| alert.classes.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Default)]
struct Replica {
    alerts: Vec<Alert>,
    classes: Vec<String>,
    refreshes_in_flight: usize,
    /// Deletes confirmed while a refresh was running.
    tombstones: Vec<String>,
}

impl Replica {
    fn replace(&mut self, alerts: Vec<Alert>) {
        self.alerts = alerts;
        if !self.tombstones.is_empty() {
            let tombstones = &self.tombstones;
            self.alerts
                .retain(|alert| !tombstones.iter().any(|ts| ts == &alert.timestamp));
        }
        self.classes = distinct_classes(&self.alerts);
    }

    fn remove(&mut self, timestamp: &str) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|alert| alert.timestamp != timestamp);
        let removed = before - self.alerts.len();
        if removed > 0 {
            self.classes = distinct_classes(&self.alerts);
        }
        removed
    }

    fn finish_refresh(&mut self) {
        self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
        if self.refreshes_in_flight == 0 {
            self.tombstones.clear();
        }
    }
}

pub struct AlertStore {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    replica: Mutex<Replica>,
}

impl AlertStore {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            replica: Mutex::new(Replica::default()),
        }
    }

    fn replica(&self) -> MutexGuard<'_, Replica> {
        self.replica
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the replica with the backend's current list.
    ///
    /// On failure the previous replica is left untouched.
    pub fn refresh(&self) -> Result<Vec<Alert>> {
        self.replica().refreshes_in_flight += 1;

        let fetched = self
            .transport
            .get(ALERTS_LIST_PATH, self.timeout)
            .map_err(|e| Error::Fetch(e.to_string()))
            .and_then(|response| parse_alert_list(&response));

        let mut replica = self.replica();
        let result = match fetched {
            Ok(alerts) => {
                replica.replace(alerts);
                log::info!("alerts: replica refreshed ({} alerts)", replica.alerts.len());
                Ok(replica.alerts.clone())
            }
            Err(err) => {
                log::warn!("alerts: refresh failed, keeping previous replica: {}", err);
                Err(err)
            }
        };
        replica.finish_refresh();
        result
    }

    /// Delete an alert on the backend, then drop it from the replica.
    ///
    /// Callers are expected to have obtained user confirmation. Deleting an
    /// absent timestamp succeeds. If the backend refuses, nothing changes locally.
    pub fn delete(&self, timestamp: &str) -> Result<()> {
        let body = serde_json::to_value(DeleteRequest { timestamp })
            .map_err(|e| Error::Delete(e.to_string()))?;
        let response = self
            .transport
            .post_json(ALERTS_DELETE_PATH, &body, self.timeout)
            .map_err(|e| Error::Delete(e.to_string()))?;
        parse_delete_response(&response)?;

        let mut replica = self.replica();
        let removed = replica.remove(timestamp);
        if replica.refreshes_in_flight > 0 {
            replica.tombstones.push(timestamp.to_string());
        }
        log::info!(
            "alerts: deleted {} ({} local entr{} removed)",
            timestamp,
            removed,
            if removed == 1 { "y" } else { "ies" }
        );
        Ok(())
    }

    /// Filtered, searched, sorted view of the current replica.
    pub fn view(&self, query: &AlertQuery) -> Vec<Alert> {
        apply_query(&self.replica().alerts, query)
    }

    /// Distinct class values available for filtering.
    pub fn classes(&self) -> Vec<String> {
        self.replica().classes.clone()
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.replica().alerts.clone()
    }

    pub fn len(&self) -> usize {
        self.replica().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replica().alerts.is_empty()
    }

    pub fn contains(&self, timestamp: &str) -> bool {
        self.replica()
            .alerts
            .iter()
            .any(|alert| alert.timestamp == timestamp)
    }
}

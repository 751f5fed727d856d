use chrono::{Local, NaiveDateTime};

use crate::alerts::Alert;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

/// Summary tiles shown above the dashboard. Recomputed on every change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_alerts: usize,
    /// Alerts recorded on the current local calendar day.
    pub today_alerts: usize,
    pub camera_active: bool,
    pub last_detection: Option<NaiveDateTime>,
    pub since_last_detection: Option<chrono::Duration>,
}

impl DashboardStats {
    pub fn compute(alerts: &[Alert], camera_active: bool, now: NaiveDateTime) -> Self {
        let today = now.date();
        let recorded: Vec<NaiveDateTime> =
            alerts.iter().filter_map(|alert| alert.recorded_at()).collect();
        let today_alerts = recorded.iter().filter(|at| at.date() == today).count();
        let last_detection = recorded.iter().max().copied();
        Self {
            total_alerts: alerts.len(),
            today_alerts,
            camera_active,
            last_detection,
            since_last_detection: last_detection.map(|at| now - at),
        }
    }

    /// Stats as of the local wall clock.
    pub fn current(alerts: &[Alert], camera_active: bool) -> Self {
        Self::compute(alerts, camera_active, Local::now().naive_local())
    }

    pub fn last_detection_label(&self) -> String {
        format_since(self.last_detection, self.since_last_detection)
    }
}

/// "Just now", "5m ago", "3h ago", or the calendar date past a day.
pub fn format_since(at: Option<NaiveDateTime>, elapsed: Option<chrono::Duration>) -> String {
    let (Some(at), Some(elapsed)) = (at, elapsed) else {
        return "N/A".to_string();
    };
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < MINUTES_PER_HOUR {
        format!("{}m ago", minutes)
    } else if minutes < MINUTES_PER_DAY {
        format!("{}h ago", minutes / MINUTES_PER_HOUR)
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

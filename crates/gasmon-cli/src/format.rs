//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use gasmon_core::{AlarmState, DashboardSnapshot, DeviceId, Reading, ThresholdConfig};

use crate::cli::StyleMode;
use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Visual styling mode.
    pub style: StyleMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            no_header: false,
            style: StyleMode::Rich,
        }
    }
}

impl FormatOptions {
    pub fn new(no_color: bool, style: StyleMode) -> Self {
        // Plain mode automatically disables colors for pipe-friendliness
        Self {
            no_color: no_color || style == StyleMode::Plain,
            no_header: false,
            style,
        }
    }

    /// Create with no_header option for CSV output.
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }
}

/// Reading time as RFC 3339, or empty when the timestamp is unset.
fn format_time(reading: &Reading) -> String {
    if reading.timestamp <= 0 {
        return String::new();
    }
    reading
        .captured_at()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_default()
}

/// Clock time (HH:MM:SS) of a reading for the live view.
fn format_clock(reading: &Reading) -> String {
    format_time(reading)
        .split_once('T')
        .map(|(_, rest)| rest.chars().take(8).collect())
        .unwrap_or_else(|| "--:--:--".to_string())
}

// ============================================================================
// Dashboard
// ============================================================================

/// One line of the live dashboard.
pub fn format_snapshot_line(
    snapshot: &DashboardSnapshot,
    alarm: Option<&AlarmState>,
    opts: &FormatOptions,
) -> String {
    let badge = style::format_status_badge(snapshot.status, opts.no_color);
    let alarm = alarm
        .map(|a| format!(" | {}", style::format_alarm_state(a, opts.no_color)))
        .unwrap_or_default();

    let Some(reading) = &snapshot.latest else {
        return format!("[--:--:--] {} waiting for data{}\n", badge, alarm);
    };

    let stale = if snapshot.stale {
        " (device thresholds out of date)"
    } else {
        ""
    };
    let peak = snapshot
        .chart
        .peak()
        .map(|p| format!(" | peak {:.1}", p))
        .unwrap_or_default();

    format!(
        "[{}] {} index {:>5.1} {} adc {:.0}{}{}{}\n",
        format_clock(reading),
        badge,
        reading.severity(),
        style::format_index_gauge(reading.severity(), &snapshot.config, opts.no_color),
        reading.raw_value,
        peak,
        alarm,
        stale
    )
}

#[derive(Serialize)]
struct SnapshotJson<'a> {
    #[serde(flatten)]
    snapshot: &'a DashboardSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    alarm: Option<&'a AlarmState>,
}

/// One dashboard update as a single JSON line.
pub fn format_snapshot_json(
    snapshot: &DashboardSnapshot,
    alarm: Option<&AlarmState>,
) -> Result<String> {
    let json = serde_json::to_string(&SnapshotJson { snapshot, alarm })?;
    Ok(format!("{}\n", json))
}

/// CSV header for dashboard updates.
pub fn format_snapshot_csv_header() -> String {
    "timestamp,index,adc,status,warn,alert\n".to_string()
}

/// One dashboard update as CSV (no output until the first reading).
pub fn format_snapshot_csv_line(snapshot: &DashboardSnapshot) -> String {
    let Some(reading) = &snapshot.latest else {
        return String::new();
    };
    format!(
        "{},{:.1},{:.0},{},{},{}\n",
        format_time(reading),
        reading.severity(),
        reading.raw_value,
        snapshot.status,
        snapshot.config.warn,
        snapshot.config.alert
    )
}

// ============================================================================
// History
// ============================================================================

/// Format history as a table.
pub fn format_history_text(
    device: &DeviceId,
    readings: &[Reading],
    notable_only: bool,
    opts: &FormatOptions,
) -> String {
    use tabled::{Table, Tabled};

    let title = if notable_only {
        format!("{}: readings at or above WARN, newest first", device)
    } else {
        format!("{}: all readings, newest first", device)
    };
    let mut output = format!("{}\n", style::format_title(&title, opts.no_color));

    if readings.is_empty() {
        output.push_str("No readings.\n");
        return output;
    }

    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Index")]
        index: String,
        #[tabled(rename = "ADC")]
        adc: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<HistoryRow> = readings
        .iter()
        .map(|r| HistoryRow {
            time: format_time(r),
            index: format!("{:.1}", r.severity()),
            adc: format!("{:.0}", r.raw_value),
            status: style::format_status_badge(r.status, opts.no_color),
        })
        .collect();

    let mut table = Table::new(rows);
    style::apply_table_style(&mut table, opts.style);
    output.push_str(&format!("{}\n{} reading(s)\n", table, readings.len()));
    output
}

/// Format history as CSV.
pub fn format_history_csv(readings: &[Reading], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "timestamp,ts_ms,index,adc,status\n".to_string()
    };
    for r in readings {
        output.push_str(&format!(
            "{},{},{:.1},{:.0},{}\n",
            format_time(r),
            r.timestamp,
            r.severity(),
            r.raw_value,
            r.status
        ));
    }
    output
}

/// Format history as pretty JSON using the wire field names.
pub fn format_history_json(readings: &[Reading]) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(readings)?))
}

// ============================================================================
// Thresholds
// ============================================================================

/// Format stored thresholds.
pub fn format_thresholds_text(
    device: &DeviceId,
    config: &ThresholdConfig,
    stored: bool,
    opts: &FormatOptions,
) -> String {
    let mut output = format!(
        "{}\n",
        style::format_title(&format!("Thresholds for {}", device), opts.no_color)
    );
    output.push_str(&format!("  WARN  at index {}\n", config.warn));
    output.push_str(&format!("  ALERT at index {}\n", config.alert));
    if !stored {
        output.push_str("  (nothing stored yet, showing defaults)\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasmon_core::{ChartSeries, Status};

    fn plain() -> FormatOptions {
        FormatOptions::new(true, StyleMode::Plain)
    }

    fn reading(ts: i64, index: f64, status: Status) -> Reading {
        Reading::builder()
            .timestamp(ts)
            .raw_value(index * 40.95)
            .index(index)
            .status(status)
            .build()
    }

    #[test]
    fn test_plain_style_disables_color() {
        assert!(FormatOptions::new(false, StyleMode::Plain).no_color);
        assert!(!FormatOptions::new(false, StyleMode::Rich).no_color);
    }

    #[test]
    fn test_snapshot_line_waiting() {
        let line = format_snapshot_line(&DashboardSnapshot::default(), None, &plain());
        assert!(line.contains("waiting for data"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_snapshot_line_with_reading_and_alarm() {
        let latest = reading(1_700_000_000_000, 72.0, Status::Alert);
        let snapshot = DashboardSnapshot {
            chart: ChartSeries::from_history(std::slice::from_ref(&latest), 35.0),
            latest: Some(latest),
            config: ThresholdConfig::default(),
            status: Status::Alert,
            stale: false,
        };
        let alarm = AlarmState {
            is_alerting: true,
            sound_enabled: true,
            is_sounding: true,
            ..Default::default()
        };
        let line = format_snapshot_line(&snapshot, Some(&alarm), &plain());
        assert!(line.starts_with("[22:13:20] [ALERT] index  72.0"));
        assert!(line.contains("adc 2948"));
        assert!(line.contains("peak 72.0"));
        assert!(line.contains("| ALARM"));
    }

    #[test]
    fn test_snapshot_line_marks_stale() {
        let snapshot = DashboardSnapshot {
            latest: Some(reading(1_000, 50.0, Status::Ok)),
            status: Status::Warn,
            stale: true,
            ..Default::default()
        };
        let line = format_snapshot_line(&snapshot, None, &plain());
        assert!(line.contains("out of date"));
    }

    #[test]
    fn test_snapshot_csv() {
        assert_eq!(
            format_snapshot_csv_line(&DashboardSnapshot::default()),
            String::new()
        );
        let snapshot = DashboardSnapshot {
            latest: Some(reading(1_700_000_000_000, 40.0, Status::Warn)),
            status: Status::Warn,
            ..Default::default()
        };
        assert_eq!(
            format_snapshot_csv_line(&snapshot),
            "2023-11-14T22:13:20Z,40.0,1638,WARN,35,60\n"
        );
    }

    #[test]
    fn test_snapshot_json_includes_alarm() {
        let json = format_snapshot_json(&DashboardSnapshot::default(), Some(&AlarmState::default()))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["latest"].is_null());
        assert_eq!(value["alarm"]["is_alerting"], false);
    }

    #[test]
    fn test_history_csv() {
        let readings = [reading(1_700_000_000_000, 40.0, Status::Warn)];
        let csv = format_history_csv(&readings, &plain());
        assert_eq!(
            csv,
            "timestamp,ts_ms,index,adc,status\n2023-11-14T22:13:20Z,1700000000000,40.0,1638,WARN\n"
        );
        let csv = format_history_csv(&readings, &plain().with_no_header(true));
        assert!(!csv.starts_with("timestamp"));
    }

    #[test]
    fn test_history_json_uses_wire_names() {
        let json = format_history_json(&[reading(5, 40.0, Status::Warn)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["ts"], 5);
        assert_eq!(value[0]["status"], "WARN");
    }

    #[test]
    fn test_history_text() {
        let device = DeviceId::default();
        let empty = format_history_text(&device, &[], true, &plain());
        assert!(empty.contains("No readings."));
        assert!(empty.contains("at or above WARN"));

        let text = format_history_text(
            &device,
            &[reading(1_700_000_000_000, 61.5, Status::Alert)],
            false,
            &plain(),
        );
        assert!(text.contains("all readings"));
        assert!(text.contains("61.5"));
        assert!(text.contains("[ALERT]"));
        assert!(text.contains("1 reading(s)"));
    }

    #[test]
    fn test_thresholds_text() {
        let text =
            format_thresholds_text(&DeviceId::default(), &ThresholdConfig::default(), false, &plain());
        assert!(text.contains("WARN  at index 35"));
        assert!(text.contains("ALERT at index 60"));
        assert!(text.contains("showing defaults"));
    }
}

//! Visual styling utilities for the CLI.
//!
//! This module provides consistent styling across all CLI output including:
//! - Spinners for one-shot store reads
//! - Status badges and the index gauge
//! - Table formatting

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use gasmon_core::{AlarmState, Status, ThresholdConfig};

use crate::cli::StyleMode;

// ============================================================================
// Progress Indicators
// ============================================================================

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

/// Width of the index gauge in cells.
const GAUGE_WIDTH: usize = 20;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner for a store operation.
pub fn operation_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

// ============================================================================
// Status Badges
// ============================================================================

/// Format a status badge: green OK, yellow WARN, red ALERT.
pub fn format_status_badge(status: Status, no_color: bool) -> String {
    let label = format!("[{}]", status_label(status));
    if no_color {
        return label;
    }
    match status {
        Status::Ok => format!("{}", label.green().bold()),
        Status::Warn => format!("{}", label.yellow().bold()),
        Status::Alert => format!("{}", label.white().on_red().bold()),
        _ => format!("{}", label.dimmed()),
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Ok | Status::Warn | Status::Alert => status.as_str(),
        _ => "--",
    }
}

/// Render the index as a gauge with the warn and alert cutoffs marked.
///
/// ```text
/// [██████░░░░|░░░░░!░░░░]
/// ```
pub fn format_index_gauge(index: f64, config: &ThresholdConfig, no_color: bool) -> String {
    let cell = |value: f64| ((value.clamp(0.0, 100.0) / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    let filled = cell(index);
    let warn_at = cell(config.warn);
    let alert_at = cell(config.alert);

    let mut bar = String::with_capacity(GAUGE_WIDTH * 3);
    for i in 0..GAUGE_WIDTH {
        let c = if i < filled {
            '█'
        } else if i == warn_at {
            '|'
        } else if i == alert_at {
            '!'
        } else {
            '░'
        };
        bar.push(c);
    }

    if no_color {
        return format!("[{}]", bar);
    }
    if index >= config.alert {
        format!("[{}]", bar.red())
    } else if index >= config.warn {
        format!("[{}]", bar.yellow())
    } else {
        format!("[{}]", bar.green())
    }
}

/// Short description of what the alarm is doing.
pub fn format_alarm_state(state: &AlarmState, no_color: bool) -> String {
    let text = if state.is_test_mode {
        "TEST ALARM"
    } else if state.is_alerting && state.is_muted {
        "alarm muted"
    } else if state.is_sounding {
        "ALARM"
    } else if !state.sound_enabled {
        "sound off (press e)"
    } else {
        "armed"
    };

    if no_color {
        return text.to_string();
    }
    if state.is_sounding {
        format!("{}", text.red().bold())
    } else if state.is_muted || !state.sound_enabled {
        format!("{}", text.dimmed())
    } else {
        format!("{}", text.green())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    let rule = "━".repeat(title.chars().count().min(terminal_width()));
    if no_color {
        format!("{}\n{}", title, rule)
    } else {
        format!("{}\n{}", title.bold(), rule.dimmed())
    }
}

/// Get terminal width, defaulting to 80 if detection fails.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Apply table style based on StyleMode.
pub fn apply_table_style(table: &mut tabled::Table, style: StyleMode) {
    use tabled::settings::Style;
    match style {
        StyleMode::Rich => {
            table.with(Style::rounded());
        }
        StyleMode::Plain => {
            table.with(Style::blank());
        }
    }
}

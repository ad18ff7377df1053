//! Markdown formatting for terminal output.
//!
//! Domain models and report types are rendered to markdown here so the CLI
//! (and any future interface) shares one presentation layer. All formatters
//! return plain strings; rich rendering happens in the interface.

pub mod reports;

pub use reports::{
    format_actions, format_attention, format_cost, format_critical_path, format_events,
    format_impact, format_intelligence, format_markov, format_plan_list, format_simulation,
    format_task_list,
};

use jiff::Timestamp;

/// Formats an optional instant as a compact UTC date-time, or a dash.
pub fn format_datetime(ts: Option<Timestamp>) -> String {
    match ts {
        Some(ts) => {
            let s = ts.to_string();
            // Trim sub-second noise: 2026-03-01T00:00:00Z stays readable.
            match s.split_once('.') {
                Some((head, _)) => format!("{head}Z"),
                None => s,
            }
        }
        None => "—".to_string(),
    }
}

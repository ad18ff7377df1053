//! Markdown renderers for reports and collections.

use std::fmt::Write as _;

use crate::analytics::attention::{AttentionDashboard, AttentionView, ExecutionTask};
use crate::analytics::cost::CostReport;
use crate::analytics::impact::ImpactReport;
use crate::analytics::intelligence::TaskIntelligence;
use crate::analytics::monte_carlo::SimulationReport;
use crate::models::{ExternalEvent, Plan, ProposedAction};
use crate::planner::analysis_ops::{CriticalPathReport, MarkovReport};

use super::format_datetime;

/// Formats a plan list with an optional heading.
pub fn format_plan_list(plans: &[Plan], title: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(title) = title {
        let _ = writeln!(out, "# {title}\n");
    }
    if plans.is_empty() {
        out.push_str("No plans found.\n");
        return out;
    }
    for plan in plans {
        let _ = writeln!(
            out,
            "- **{}** (`{}`) — event date {}",
            plan.name,
            plan.plan_id,
            format_datetime(plan.event_date)
        );
    }
    out
}

/// Formats the enriched execution task listing.
pub fn format_task_list(tasks: &[ExecutionTask]) -> String {
    if tasks.is_empty() {
        return "No tasks in this plan.\n".to_string();
    }
    let mut out = String::from("| Task | Status | Due | Deps | Badges |\n|---|---|---|---|---|\n");
    for task in tasks {
        let badges = if task.risk_badges.is_empty() {
            String::from("—")
        } else {
            task.risk_badges.join(", ")
        };
        let cp_marker = if task.on_critical_path { " ★" } else { "" };
        let _ = writeln!(
            out,
            "| {} (`{}`){} | {} | {} | ↑{} ↓{} | {} |",
            task.digest.title,
            task.digest.task_id,
            cp_marker,
            task.digest.status.with_icon(),
            format_datetime(task.digest.due_date),
            task.upstream_count,
            task.downstream_count,
            badges
        );
    }
    out
}

fn format_view(out: &mut String, heading: &str, view: &AttentionView) {
    let _ = writeln!(out, "## {heading} ({})", view.count);
    if view.tasks.is_empty() {
        out.push_str("none\n\n");
        return;
    }
    for task in &view.tasks {
        let _ = writeln!(
            out,
            "- {} (`{}`) — due {}",
            task.title,
            task.task_id,
            format_datetime(task.due_date)
        );
    }
    out.push('\n');
}

/// Formats the attention dashboard.
pub fn format_attention(dashboard: &AttentionDashboard) -> String {
    let mut out = format!("# Attention — {}\n\n", dashboard.plan_id);
    format_view(&mut out, "Blockers", &dashboard.blockers);
    format_view(&mut out, "Overdue", &dashboard.overdue);
    format_view(&mut out, "Due next 7 days", &dashboard.due_next_7_days);
    format_view(
        &mut out,
        "Critical path due next",
        &dashboard.critical_path_due_next,
    );
    format_view(&mut out, "Recently changed", &dashboard.recently_changed);
    out
}

/// Formats the critical-path report.
pub fn format_critical_path(report: &CriticalPathReport) -> String {
    let mut out = format!("# Critical Path — {}\n\n", report.plan_id);
    if report.critical_path.is_empty() {
        out.push_str("Plan has no tasks.\n");
        return out;
    }
    for (index, task) in report.critical_path.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} (`{}`) — {} — due {}",
            index + 1,
            task.title,
            task.task_id,
            task.status.with_icon(),
            format_datetime(task.due_date)
        );
    }
    let _ = writeln!(
        out,
        "\nPlan end: {} ({:.1} days). {} task(s) on a maximum path.",
        format_datetime(Some(report.plan_end)),
        report.plan_end_days,
        report.on_path_ids.len()
    );
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "\n> {diagnostic}");
    }
    out
}

/// Formats the Monte Carlo simulation report.
pub fn format_simulation(report: &SimulationReport) -> String {
    let mut out = format!(
        "# Monte Carlo — {} ({} iterations)\n\n",
        report.plan_id, report.iterations
    );
    if let Some(p10) = report.percentiles.p10 {
        let _ = writeln!(out, "- p10: {}", format_datetime(Some(p10)));
    }
    let _ = writeln!(out, "- p50: {}", format_datetime(Some(report.percentiles.p50)));
    let _ = writeln!(out, "- p75: {}", format_datetime(Some(report.percentiles.p75)));
    if let Some(p90) = report.percentiles.p90 {
        let _ = writeln!(out, "- p90: {}", format_datetime(Some(p90)));
    }
    let _ = writeln!(out, "- p95: {}", format_datetime(Some(report.percentiles.p95)));
    if let (Some(event), Some(prob)) = (report.event_date, report.probability_on_time_percent) {
        let _ = writeln!(
            out,
            "\nP(on time for {}): **{prob:.1}%**",
            format_datetime(Some(event))
        );
    }
    if !report.bottlenecks.is_empty() {
        out.push_str("\n## Bottlenecks\n");
        for bottleneck in &report.bottlenecks {
            let _ = writeln!(
                out,
                "- {} (`{}`, {}): spread {:.1}d, CP {:.0}%",
                bottleneck.title,
                bottleneck.task_id,
                bottleneck.bucket,
                bottleneck.spread_days,
                bottleneck.cp_probability * 100.0
            );
        }
    }
    if !report.risk_heatmap.is_empty() {
        out.push_str("\n## Bucket variance (days²)\n");
        for (bucket, variance) in &report.risk_heatmap {
            let _ = writeln!(out, "- {bucket}: {variance:.2}");
        }
    }
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "\n> {diagnostic}");
    }
    out
}

/// Formats the Markov report.
pub fn format_markov(report: &MarkovReport) -> String {
    let mut out = format!("# Markov Analysis — {}\n\n", report.plan_id);
    out.push_str("## Expected days to completion/cancellation\n");
    for (state, days) in &report.absorption.expected_days {
        if days.is_nan() {
            let _ = writeln!(out, "- from {state}: undefined");
        } else {
            let _ = writeln!(out, "- from {state}: {days:.1} days");
        }
    }
    if !report.tasks.is_empty() {
        out.push_str("\n## Tasks\n");
        for task in &report.tasks {
            let _ = writeln!(
                out,
                "- {} (`{}`): {} — {:.1} day(s) to done",
                task.title,
                task.task_id,
                task.current_state.as_str(),
                task.expected_days_to_absorption
            );
        }
    }
    for diagnostic in &report.absorption.diagnostics {
        let _ = writeln!(out, "\n> {diagnostic}");
    }
    out
}

/// Formats an impact preview.
pub fn format_impact(report: &ImpactReport) -> String {
    let mut out = format!(
        "# Impact Preview — {} / {}\n\n{}\n\n",
        report.plan_id, report.task_id, report.message
    );
    let _ = writeln!(
        out,
        "- Plan end shift: {:+.1} day(s)",
        report.delta_plan_end_days
    );
    let _ = writeln!(
        out,
        "- Critical path impact: {}",
        if report.critical_path_impact { "yes" } else { "no" }
    );
    if !report.affected_task_ids.is_empty() {
        let _ = writeln!(out, "- Affected tasks: {}", report.affected_task_ids.join(", "));
    }
    if let Some(sim) = &report.simulated {
        let _ = writeln!(
            out,
            "- Simulated Δp50 {:+.1}d, Δp95 {:+.1}d",
            sim.delta_p50_days, sim.delta_p95_days
        );
        if let Some(delta) = sim.delta_probability_on_time {
            let _ = writeln!(out, "- Δ P(on time): {delta:+.1} pp");
        }
    }
    out
}

/// Formats the task intelligence bundle.
pub fn format_intelligence(bundle: &TaskIntelligence) -> String {
    let mut out = format!(
        "# Task Intelligence — {} / {}\n\nRisk score: **{}**/100",
        bundle.plan_id, bundle.task_id, bundle.risk_score
    );
    if !bundle.risk_factors.is_empty() {
        let _ = write!(out, " ({})", bundle.risk_factors.join("; "));
    }
    out.push_str("\n\n");
    if !bundle.dependency_risks.is_empty() {
        out.push_str("## Dependency risks\n");
        for risk in &bundle.dependency_risks {
            let _ = writeln!(
                out,
                "- [{:?}] {} (`{}`): {}",
                risk.level, risk.title, risk.task_id, risk.suggestion
            );
        }
        out.push('\n');
    }
    for (heading, suggestions) in [
        ("Timeline", &bundle.timeline_suggestions),
        ("Resources", &bundle.resource_suggestions),
    ] {
        if !suggestions.is_empty() {
            let _ = writeln!(out, "## {heading}");
            for s in suggestions {
                let _ = writeln!(out, "- **{}** — {}", s.title, s.detail);
            }
            out.push('\n');
        }
    }
    if !bundle.optimal_assignees.is_empty() {
        out.push_str("## Recommended assignees\n");
        for rec in &bundle.optimal_assignees {
            let marker = if rec.currently_assigned {
                " (current)"
            } else {
                ""
            };
            let _ = writeln!(out, "- {}{} — score {:.2}", rec.assignee, marker, rec.score);
        }
        out.push('\n');
    }
    if let Some(sim) = &bundle.simulation {
        let _ = writeln!(
            out,
            "Simulated finish: p50 {}, p95 {}, CP probability {:.0}%",
            format_datetime(Some(sim.p50_finish)),
            format_datetime(Some(sim.p95_finish)),
            sim.cp_probability * 100.0
        );
    }
    if let Some(markov) = &bundle.markov {
        let _ = writeln!(
            out,
            "State: {} — expected {:.1} day(s) to completion",
            markov.current_state.as_str(),
            markov.expected_days_to_absorption
        );
    }
    for diagnostic in &bundle.diagnostics {
        let _ = writeln!(out, "\n> {diagnostic}");
    }
    out
}

/// Formats the cost breakdown.
pub fn format_cost(report: &CostReport) -> String {
    let mut out = format!(
        "# Plan Cost — {}\n\nTotal: **{:.2}**\n\n",
        report.plan_id, report.total_cost
    );
    for (component, value) in &report.breakdown {
        let _ = writeln!(out, "- {component}: {value:.2}");
    }
    out
}

/// Formats the event alert list.
pub fn format_events(events: &[ExternalEvent]) -> String {
    if events.is_empty() {
        return "No external events.\n".to_string();
    }
    let mut out = String::from("# External Events\n\n");
    for event in events {
        let _ = writeln!(
            out,
            "- #{} [{}] **{}** ({}) at {}",
            event.id,
            event.severity.as_str(),
            event.title,
            event.event_type,
            format_datetime(Some(event.created_at))
        );
    }
    out
}

/// Formats the proposed-action list.
pub fn format_actions(actions: &[ProposedAction]) -> String {
    if actions.is_empty() {
        return "No proposed actions.\n".to_string();
    }
    let mut out = String::from("# Proposed Actions\n\n");
    for action in actions {
        let _ = writeln!(
            out,
            "- #{} [{}] {} → `{}` ({})",
            action.id,
            action.status.as_str(),
            action.title,
            action.task_id,
            action.action_type
        );
    }
    out
}

//! Tempo CLI application
//!
//! Command-line interface for the Tempo event-program planner. Dispatches
//! to the core handler layer and renders markdown reports to the terminal.

mod cli;
mod renderer;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{
    ActionCommands, AnalyzeCommands, Cli, Commands, DepCommands, EventCommands, LockCommands,
    PlanCommands, TaskCommands, TemplateCommands,
};
use log::{debug, info};
use renderer::TerminalRenderer;
use tempo_core::{
    display, handlers, params, CancelToken, Planner, PlannerBuilder, PlannerError,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let renderer = TerminalRenderer::new(!cli.no_color);

    let mut planner_builder = PlannerBuilder::new();
    if let Some(path) = &cli.database_file {
        debug!("Using database path from CLI: {}", path.display());
        planner_builder = planner_builder.with_database_path(path);
    } else {
        debug!("Using default XDG database path");
    }

    let result = match planner_builder.build().await {
        Ok(planner) => {
            info!("Tempo started");
            dispatch(planner, cli.command, &renderer).await
        }
        Err(e) => Err(anyhow::Error::new(e).context("Failed to initialize planner")),
    };

    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(exit_code(&error));
    }
}

// Nonzero exit codes per error kind, stable for scripting.
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<PlannerError>() {
        Some(e) => match e.kind() {
            "validation" => 2,
            "not_found" => 3,
            "conflict" => 4,
            "cycle_detected" => 5,
            "insufficient_calibration" => 6,
            "cancelled" => 7,
            _ => 10,
        },
        None => 1,
    }
}

async fn dispatch(planner: Planner, command: Commands, renderer: &TerminalRenderer) -> Result<()> {
    match command {
        Commands::Plan { command } => handle_plan_command(planner, command, renderer).await,
        Commands::Task { command } => handle_task_command(planner, command, renderer).await,
        Commands::Dep { command } => handle_dep_command(planner, command, renderer).await,
        Commands::Analyze { command } => handle_analyze_command(planner, command, renderer).await,
        Commands::Lock { command } => handle_lock_command(planner, command, renderer).await,
        Commands::Event { command } => handle_event_command(planner, command, renderer).await,
        Commands::Action { command } => handle_action_command(planner, command, renderer).await,
        Commands::Template { command } => handle_template_command(planner, command, renderer).await,
    }
}

async fn handle_plan_command(
    planner: Planner,
    command: PlanCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        PlanCommands::List => {
            let plans = handlers::handle_list_plans(&planner).await?;
            renderer.render(&display::format_plan_list(&plans, Some("Plans")))?;
        }
        PlanCommands::Show(args) => {
            let params: params::PlanRef = (&args).into();
            let plan = handlers::handle_get_plan(&planner, &params)
                .await?
                .ok_or(PlannerError::PlanNotFound {
                    id: args.plan_id.clone(),
                })?;
            let tasks = handlers::handle_get_execution_tasks(&planner, &params).await?;
            let markdown = format!(
                "# {} (`{}`)\n\nEvent date: {}\n\n{}",
                plan.name,
                plan.plan_id,
                display::format_datetime(plan.event_date),
                display::format_task_list(&tasks)
            );
            renderer.render(&markdown)?;
        }
        PlanCommands::Create(args) => {
            let plan = handlers::handle_create_plan(&planner, &(&args).into())
                .await
                .context("Failed to create plan")?;
            renderer.render(&format!("Created plan `{}`", plan.plan_id))?;
        }
        PlanCommands::Delete(args) => {
            handlers::handle_delete_plan(&planner, &(&args).into()).await?;
            renderer.render(&format!("Deleted plan `{}`", args.plan_id))?;
        }
        PlanCommands::Bucket(args) => {
            handlers::handle_upsert_bucket(&planner, &(&args).into()).await?;
            renderer.render(&format!(
                "Bucket `{}` set on plan `{}`",
                args.bucket_id, args.plan_id
            ))?;
        }
        PlanCommands::Sync(args) => {
            let plan_ref = params::PlanRef {
                plan_id: args.plan_id.clone(),
            };
            let state = if args.mark {
                handlers::handle_mark_synced(&planner, &plan_ref).await?
            } else {
                handlers::handle_get_sync_state(&planner, &plan_ref).await?
            };
            let markdown = format!(
                "# Sync state — {}\n\n- dirty: {}\n- last sync: {}\n- previous sync: {}\n",
                args.plan_id,
                state.dirty,
                display::format_datetime(state.last_sync_at),
                display::format_datetime(state.previous_sync_at),
            );
            renderer.render(&markdown)?;
        }
    }
    Ok(())
}

async fn handle_task_command(
    planner: Planner,
    command: TaskCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        TaskCommands::List(args) => {
            let tasks = handlers::handle_get_execution_tasks(&planner, &(&args).into()).await?;
            renderer.render(&display::format_task_list(&tasks))?;
        }
        TaskCommands::Show(args) => {
            let task = handlers::handle_get_task(&planner, &(&args).into())
                .await?
                .ok_or_else(|| PlannerError::task_not_found(&args.plan_id, &args.task_id))?;
            let mut markdown = format!(
                "# {} (`{}`)\n\nStatus: {} ({}%)\nBucket: {}\nStart: {}\nDue: {}\n",
                task.title,
                task.task_id,
                task.status.with_icon(),
                task.percent_complete,
                task.bucket_id,
                display::format_datetime(task.start_date),
                display::format_datetime(task.due_date),
            );
            if !task.assignees.is_empty() {
                markdown.push_str(&format!("Assignees: {}\n", task.assignees.join(", ")));
            }
            if let Some(description) = &task.description {
                markdown.push_str(&format!("\n{description}\n"));
            }
            let subtasks = planner.get_subtasks(&(&args).into()).await?;
            if !subtasks.is_empty() {
                markdown.push_str("\n## Checklist\n");
                for subtask in &subtasks {
                    let mark = if subtask.is_checked { "x" } else { " " };
                    markdown.push_str(&format!("- [{mark}] {}\n", subtask.title));
                }
            }
            renderer.render(&markdown)?;
        }
        TaskCommands::Create(args) => {
            let task = handlers::handle_create_task(&planner, &(&args).into())
                .await
                .with_context(|| format!("Failed to create task in plan {}", args.plan_id))?;
            renderer.render(&format!("Created task `{}`", task.task_id))?;
        }
        TaskCommands::Update(args) => {
            let task = handlers::handle_update_task(&planner, &(&args).into())
                .await
                .with_context(|| format!("Failed to update task {}", args.task_id))?;
            renderer.render(&format!(
                "Updated task `{}` — {} ({}%)",
                task.task_id,
                task.status.with_icon(),
                task.percent_complete
            ))?;
        }
        TaskCommands::Delete(args) => {
            handlers::handle_delete_task(
                &planner,
                &params::DeleteTask {
                    plan_id: args.plan_id.clone(),
                    task_id: args.task_id.clone(),
                    acting_user: args.user.clone(),
                },
            )
            .await?;
            renderer.render(&format!("Deleted task `{}`", args.task_id))?;
        }
        TaskCommands::Subtask(args) => {
            if args.delete {
                handlers::handle_delete_subtask(
                    &planner,
                    &params::DeleteSubtask {
                        plan_id: args.plan_id.clone(),
                        task_id: args.task_id.clone(),
                        subtask_id: args.subtask_id.clone(),
                        acting_user: args.user.clone(),
                    },
                )
                .await?;
                renderer.render(&format!("Deleted subtask `{}`", args.subtask_id))?;
            } else if let Some(checked) = args.check {
                let subtask = handlers::handle_update_subtask(
                    &planner,
                    &params::UpdateSubtask {
                        plan_id: args.plan_id.clone(),
                        task_id: args.task_id.clone(),
                        subtask_id: args.subtask_id.clone(),
                        is_checked: Some(checked),
                        acting_user: args.user.clone(),
                        ..Default::default()
                    },
                )
                .await?;
                renderer.render(&format!(
                    "Subtask `{}` is now {}",
                    subtask.subtask_id,
                    if subtask.is_checked { "checked" } else { "unchecked" }
                ))?;
            } else {
                let subtask = handlers::handle_add_subtask(
                    &planner,
                    &params::AddSubtask {
                        plan_id: args.plan_id.clone(),
                        task_id: args.task_id.clone(),
                        subtask_id: args.subtask_id.clone(),
                        title: args.title.clone(),
                        acting_user: args.user.clone(),
                    },
                )
                .await?;
                renderer.render(&format!("Added subtask `{}`", subtask.subtask_id))?;
            }
        }
    }
    Ok(())
}

async fn handle_dep_command(
    planner: Planner,
    command: DepCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        DepCommands::Add(args) => {
            let dependency = handlers::handle_add_dependency(&planner, &(&args).into()).await?;
            renderer.render(&format!(
                "Added dependency {} -> {} ({})",
                dependency.predecessor_id,
                dependency.successor_id,
                dependency.dep_type.as_str()
            ))?;
        }
        DepCommands::Remove(args) => {
            handlers::handle_remove_dependency(
                &planner,
                &params::RemoveDependency {
                    plan_id: args.plan_id.clone(),
                    predecessor_id: args.predecessor.clone(),
                    successor_id: args.successor.clone(),
                    acting_user: args.user.clone(),
                },
            )
            .await?;
            renderer.render(&format!(
                "Removed dependency {} -> {}",
                args.predecessor, args.successor
            ))?;
        }
        DepCommands::Show(args) => {
            let deps = handlers::handle_get_dependencies(&planner, &(&args).into()).await?;
            let mut markdown = format!(
                "# Dependencies — {}\n\n{}\n\n## Upstream\n",
                deps.task_id, deps.impact_statement
            );
            for task in &deps.upstream {
                markdown.push_str(&format!("- {} (`{}`)\n", task.title, task.task_id));
            }
            markdown.push_str("\n## Downstream\n");
            for task in &deps.downstream {
                markdown.push_str(&format!("- {} (`{}`)\n", task.title, task.task_id));
            }
            renderer.render(&markdown)?;
        }
    }
    Ok(())
}

async fn handle_analyze_command(
    planner: Planner,
    command: AnalyzeCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        AnalyzeCommands::CriticalPath(args) => {
            let report = handlers::handle_get_critical_path(&planner, &(&args).into()).await?;
            renderer.render(&display::format_critical_path(&report))?;
        }
        AnalyzeCommands::Attention(args) => {
            let dashboard = handlers::handle_get_attention(
                &planner,
                &params::AttentionParams {
                    plan_id: args.plan_id.clone(),
                    limit: None,
                },
            )
            .await?;
            renderer.render(&display::format_attention(&dashboard))?;
        }
        AnalyzeCommands::Milestone(args) => {
            let analysis = handlers::handle_get_milestone_analysis(
                &planner,
                &params::MilestoneParams {
                    plan_id: args.plan_id.clone(),
                    event_date: args.event_date.clone(),
                },
            )
            .await?;
            let mut markdown = format!(
                "# Milestone — {} (event {})\n\n## Lands before the event ({})\n",
                analysis.plan_id,
                display::format_datetime(Some(analysis.event_date)),
                analysis.before_event.len()
            );
            for task in &analysis.before_event {
                markdown.push_str(&format!("- {} (`{}`)\n", task.title, task.task_id));
            }
            markdown.push_str(&format!("\n## At risk ({})\n", analysis.at_risk.len()));
            for task in &analysis.at_risk {
                let days = task
                    .days_after_event
                    .map(|d| format!("{d} day(s) past the event"))
                    .unwrap_or_else(|| "no due date".to_string());
                markdown.push_str(&format!(
                    "- {} (`{}`) — {}\n",
                    task.digest.title, task.digest.task_id, days
                ));
            }
            renderer.render(&markdown)?;
        }
        AnalyzeCommands::Simulate(args) => {
            // Ctrl-C cancels the run cooperatively instead of killing it.
            let cancel = CancelToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel();
                }
            });
            let report =
                handlers::handle_run_monte_carlo(&planner, &(&args).into(), cancel).await?;
            renderer.render(&display::format_simulation(&report))?;
        }
        AnalyzeCommands::Markov(args) => {
            let report = handlers::handle_get_markov(
                &planner,
                &params::MarkovParams {
                    plan_id: args.plan_id.clone(),
                    task_id: args.task.clone(),
                    historical_plan_ids: args.historical.clone(),
                    step_days: None,
                },
            )
            .await?;
            renderer.render(&display::format_markov(&report))?;
        }
        AnalyzeCommands::Impact(args) => {
            let report =
                handlers::handle_analyze_impact(&planner, &(&args).into(), CancelToken::new())
                    .await?;
            renderer.render(&display::format_impact(&report))?;
        }
        AnalyzeCommands::Intelligence(args) => {
            let bundle = handlers::handle_get_task_intelligence(
                &planner,
                &params::IntelligenceParams {
                    plan_id: args.plan_id.clone(),
                    task_id: args.task_id.clone(),
                    include_simulations: args.simulations,
                    historical_plan_ids: Vec::new(),
                },
            )
            .await?;
            renderer.render(&display::format_intelligence(&bundle))?;
        }
        AnalyzeCommands::Cost(args) => {
            let report = handlers::handle_compute_cost(
                &planner,
                &params::CostParams {
                    plan_id: args.plan_id.clone(),
                    schedule_weight: args.schedule_weight,
                    resource_weight: args.resource_weight,
                    risk_weight: args.risk_weight,
                    quality_weight: None,
                    disruption_weight: None,
                },
            )
            .await?;
            renderer.render(&display::format_cost(&report))?;
        }
    }
    Ok(())
}

async fn handle_lock_command(
    planner: Planner,
    command: LockCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        LockCommands::Acquire(args) => {
            let lock = handlers::handle_acquire_lock(
                &planner,
                &params::AcquireLock {
                    plan_id: args.plan_id.clone(),
                    task_id: args.task_id.clone(),
                    user_id: args.user_id.clone(),
                    ttl_minutes: args.ttl_minutes,
                },
            )
            .await?;
            renderer.render(&format!(
                "Locked `{}` for {} ({}s TTL from {})",
                lock.task_id,
                lock.user_id,
                lock.ttl_seconds,
                display::format_datetime(Some(lock.acquired_at))
            ))?;
        }
        LockCommands::Release(args) => {
            handlers::handle_release_lock(
                &planner,
                &params::ReleaseLock {
                    plan_id: args.plan_id.clone(),
                    task_id: args.task_id.clone(),
                    user_id: args.user_id.clone(),
                },
            )
            .await?;
            renderer.render(&format!("Released lock on `{}`", args.task_id))?;
        }
        LockCommands::Show(args) => {
            let lock = handlers::handle_get_lock(&planner, &(&args).into()).await?;
            match lock {
                Some(lock) => renderer.render(&format!(
                    "`{}` is locked by {} since {}",
                    lock.task_id,
                    lock.user_id,
                    display::format_datetime(Some(lock.acquired_at))
                ))?,
                None => renderer.render(&format!("`{}` is unlocked", args.task_id))?,
            }
        }
    }
    Ok(())
}

async fn handle_event_command(
    planner: Planner,
    command: EventCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        EventCommands::Ingest(args) => {
            let payload = match &args.payload {
                Some(raw) => serde_json::from_str(raw).context("Invalid --payload JSON")?,
                None => serde_json::Map::new(),
            };
            let outcome = handlers::handle_ingest_event(
                &planner,
                &params::IngestEvent {
                    plan_id: args.plan_id.clone(),
                    event_type: args.event_type.clone(),
                    title: args.title.clone(),
                    description: args.description.clone(),
                    severity: args.severity.clone(),
                    affected_task_ids: args.affected.clone(),
                    payload,
                },
            )
            .await?;
            let markdown = format!(
                "Ingested event #{} ({}). {} proposed action(s) await review.",
                outcome.event.id,
                outcome.event.event_type,
                outcome.proposed_actions.len()
            );
            renderer.render(&markdown)?;
        }
        EventCommands::List(args) => {
            let events = handlers::handle_list_events(
                &planner,
                &params::ListEvents {
                    plan_id: args.plan_id.clone(),
                    limit: None,
                },
            )
            .await?;
            renderer.render(&display::format_events(&events))?;
        }
        EventCommands::Delete(args) => {
            handlers::handle_delete_event(
                &planner,
                &params::EventRef {
                    plan_id: args.plan_id.clone(),
                    event_id: args.event_id,
                },
            )
            .await?;
            renderer.render(&format!("Deleted event #{}", args.event_id))?;
        }
    }
    Ok(())
}

async fn handle_action_command(
    planner: Planner,
    command: ActionCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        ActionCommands::List(args) => {
            let actions = handlers::handle_list_actions(
                &planner,
                &params::ListActions {
                    plan_id: args.plan_id.clone(),
                    status: args.status.clone(),
                    limit: None,
                },
            )
            .await?;
            renderer.render(&display::format_actions(&actions))?;
        }
        ActionCommands::Approve(args) => {
            let action = handlers::handle_approve_action(&planner, &(&args).into()).await?;
            renderer.render(&format!(
                "Approved action #{} — applied `{}` on `{}`",
                action.id, action.action_type, action.task_id
            ))?;
        }
        ActionCommands::Reject(args) => {
            let action = handlers::handle_reject_action(&planner, &(&args).into()).await?;
            renderer.render(&format!("Rejected action #{}", action.id))?;
        }
        ActionCommands::Delete(args) => {
            handlers::handle_delete_action(
                &planner,
                &params::ActionRef {
                    plan_id: args.plan_id.clone(),
                    action_id: args.action_id,
                },
            )
            .await?;
            renderer.render(&format!("Deleted action #{}", args.action_id))?;
        }
    }
    Ok(())
}

async fn handle_template_command(
    planner: Planner,
    command: TemplateCommands,
    renderer: &TerminalRenderer,
) -> Result<()> {
    match command {
        TemplateCommands::List => {
            let templates = handlers::handle_list_templates(&planner).await?;
            renderer.render(&display::format_plan_list(&templates, Some("Templates")))?;
        }
        TemplateCommands::Clone(args) => {
            let plan = handlers::handle_clone_template(&planner, &(&args).into())
                .await
                .context("Failed to clone template")?;
            renderer.render(&format!(
                "Cloned `{}` into `{}` (event {})",
                args.source_plan_id,
                plan.plan_id,
                display::format_datetime(plan.event_date)
            ))?;
        }
    }
    Ok(())
}

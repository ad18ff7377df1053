//! Command-line interface definitions using clap.
//!
//! Implements the parameter wrapper pattern: each subcommand has a
//! clap-specific argument struct plus a conversion into the core's
//! framework-free parameter types, so the CLI can evolve its flags without
//! touching domain logic.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tempo_core::params;

#[derive(Parser)]
#[command(version, about = "Planner-execution and simulation engine for event programs", name = "tempo")]
pub struct Cli {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/tempo/tempo.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage plans and buckets
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Manage tasks and subtasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage dependency edges
    Dep {
        #[command(subcommand)]
        command: DepCommands,
    },
    /// Analytical queries over a plan
    Analyze {
        #[command(subcommand)]
        command: AnalyzeCommands,
    },
    /// Advisory task locks
    Lock {
        #[command(subcommand)]
        command: LockCommands,
    },
    /// External events and alerts
    Event {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Proposed actions awaiting human decision
    Action {
        #[command(subcommand)]
        command: ActionCommands,
    },
    /// Template plans and cloning
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List all plans
    List,
    /// Show one plan with its enriched task listing
    Show(PlanArg),
    /// Create a new empty plan
    Create(CreatePlanArgs),
    /// Permanently delete a plan and everything it owns
    Delete(PlanArg),
    /// Create or rename a bucket
    Bucket(BucketArgs),
    /// Show or record sync state (fingerprint dirty tracking)
    Sync(SyncArgs),
}

#[derive(Args)]
pub struct PlanArg {
    /// Plan identifier
    pub plan_id: String,
}

impl From<&PlanArg> for params::PlanRef {
    fn from(args: &PlanArg) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
        }
    }
}

#[derive(Args)]
pub struct CreatePlanArgs {
    /// Plan identifier
    pub plan_id: String,
    /// Display name (defaults to the id)
    #[arg(short, long)]
    pub name: Option<String>,
    /// Target event date, RFC 3339
    #[arg(short, long)]
    pub event_date: Option<String>,
}

impl From<&CreatePlanArgs> for params::CreatePlan {
    fn from(args: &CreatePlanArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            name: args.name.clone(),
            event_date: args.event_date.clone(),
        }
    }
}

#[derive(Args)]
pub struct BucketArgs {
    pub plan_id: String,
    pub bucket_id: String,
    /// Display name of the bucket
    pub name: String,
}

impl From<&BucketArgs> for params::UpsertBucket {
    fn from(args: &BucketArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            bucket_id: args.bucket_id.clone(),
            name: args.name.clone(),
        }
    }
}

#[derive(Args)]
pub struct SyncArgs {
    pub plan_id: String,
    /// Record a sync point instead of showing the current state
    #[arg(long)]
    pub mark: bool,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List a plan's tasks with risk badges
    List(PlanArg),
    /// Show one task
    Show(TaskArg),
    /// Create a task
    Create(CreateTaskArgs),
    /// Partially update a task
    Update(UpdateTaskArgs),
    /// Delete a task with its subtasks and edges
    Delete(DeleteTaskArgs),
    /// Add a checklist item
    Subtask(SubtaskArgs),
}

#[derive(Args)]
pub struct TaskArg {
    pub plan_id: String,
    pub task_id: String,
}

impl From<&TaskArg> for params::TaskRef {
    fn from(args: &TaskArg) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            task_id: args.task_id.clone(),
        }
    }
}

#[derive(Args)]
pub struct CreateTaskArgs {
    pub plan_id: String,
    pub task_id: String,
    /// Title of the task
    pub title: String,
    /// Bucket (workstream) the task belongs to
    #[arg(short, long)]
    pub bucket: String,
    /// Scheduled start, RFC 3339
    #[arg(long)]
    pub start_date: Option<String>,
    /// Due date, RFC 3339
    #[arg(long)]
    pub due_date: Option<String>,
    /// Priority 0-10, lower is more urgent
    #[arg(short, long)]
    pub priority: Option<u8>,
    /// Assignee user ids (repeatable)
    #[arg(short, long)]
    pub assignee: Vec<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Acting user for the lock contract
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

impl From<&CreateTaskArgs> for params::CreateTask {
    fn from(args: &CreateTaskArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            task_id: args.task_id.clone(),
            title: args.title.clone(),
            bucket_id: args.bucket.clone(),
            start_date: args.start_date.clone(),
            due_date: args.due_date.clone(),
            priority: args.priority,
            assignees: args.assignee.clone(),
            assignee_names: Vec::new(),
            description: args.description.clone(),
            acting_user: args.user.clone(),
        }
    }
}

#[derive(Args)]
pub struct UpdateTaskArgs {
    pub plan_id: String,
    pub task_id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub bucket: Option<String>,
    /// notStarted, inProgress, blocked, underReview, completed, cancelled
    #[arg(short, long)]
    pub status: Option<String>,
    /// Completion percentage 0-100
    #[arg(long)]
    pub percent: Option<u8>,
    /// RFC 3339; pass an empty string to clear
    #[arg(long)]
    pub start_date: Option<String>,
    /// RFC 3339; pass an empty string to clear
    #[arg(long)]
    pub due_date: Option<String>,
    #[arg(short, long)]
    pub priority: Option<u8>,
    /// Replace the assignee list (repeatable)
    #[arg(short, long)]
    pub assignee: Option<Vec<String>>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Acting user for the lock contract
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

impl From<&UpdateTaskArgs> for params::UpdateTask {
    fn from(args: &UpdateTaskArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            task_id: args.task_id.clone(),
            title: args.title.clone(),
            bucket_id: args.bucket.clone(),
            status: args.status.clone(),
            percent_complete: args.percent,
            start_date: args.start_date.clone(),
            due_date: args.due_date.clone(),
            priority: args.priority,
            assignees: args.assignee.clone(),
            assignee_names: None,
            applied_categories: None,
            description: args.description.clone(),
            order_hint: None,
            acting_user: args.user.clone(),
        }
    }
}

#[derive(Args)]
pub struct DeleteTaskArgs {
    pub plan_id: String,
    pub task_id: String,
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

#[derive(Args)]
pub struct SubtaskArgs {
    pub plan_id: String,
    pub task_id: String,
    pub subtask_id: String,
    /// Title when adding; ignored for --check/--delete
    #[arg(default_value = "")]
    pub title: String,
    /// Toggle the checked flag instead of adding
    #[arg(long)]
    pub check: Option<bool>,
    /// Delete the subtask instead of adding
    #[arg(long)]
    pub delete: bool,
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum DepCommands {
    /// Add a dependency edge (refuses duplicates and cycles)
    Add(AddDepArgs),
    /// Remove a dependency edge
    Remove(RemoveDepArgs),
    /// Show a task's upstream/downstream with the impact statement
    Show(TaskArg),
}

#[derive(Args)]
pub struct AddDepArgs {
    pub plan_id: String,
    /// Task that must progress first
    pub predecessor: String,
    /// Task constrained by the predecessor
    pub successor: String,
    /// FS (default), SS, FF or SF
    #[arg(short = 't', long)]
    pub dep_type: Option<String>,
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

impl From<&AddDepArgs> for params::AddDependency {
    fn from(args: &AddDepArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            predecessor_id: args.predecessor.clone(),
            successor_id: args.successor.clone(),
            dep_type: args.dep_type.clone(),
            acting_user: args.user.clone(),
        }
    }
}

#[derive(Args)]
pub struct RemoveDepArgs {
    pub plan_id: String,
    pub predecessor: String,
    pub successor: String,
    #[arg(short = 'u', long)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum AnalyzeCommands {
    /// Critical path of a plan
    CriticalPath(PlanArg),
    /// Attention dashboard: blockers, overdue, due soon, recent changes
    Attention(PlanArg),
    /// Milestone analysis against an event date
    Milestone(MilestoneArgs),
    /// Monte Carlo schedule simulation
    Simulate(SimulateArgs),
    /// Markov state analysis
    Markov(MarkovArgs),
    /// What-if preview of a task edit
    Impact(ImpactArgs),
    /// Fused intelligence bundle for one task
    Intelligence(IntelligenceArgs),
    /// Weighted multi-objective plan cost
    Cost(CostArgs),
}

#[derive(Args)]
pub struct MilestoneArgs {
    pub plan_id: String,
    /// RFC 3339; defaults to the plan's event date
    #[arg(short, long)]
    pub event_date: Option<String>,
}

#[derive(Args)]
pub struct SimulateArgs {
    pub plan_id: String,
    /// Iteration count (default 10,000)
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,
    /// RFC 3339 target event date
    #[arg(short, long)]
    pub event_date: Option<String>,
    /// RNG seed for reproducible runs
    #[arg(short, long)]
    pub seed: Option<u64>,
    /// Also report the p10/p90 band
    #[arg(long)]
    pub bands: bool,
    /// Calibrate from these plans (repeatable; defaults to all others)
    #[arg(long)]
    pub historical: Vec<String>,
    /// Fail instead of using the global prior for uncalibrated buckets
    #[arg(long)]
    pub strict: bool,
}

impl From<&SimulateArgs> for params::RunSimulation {
    fn from(args: &SimulateArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            iterations: args.iterations,
            event_date: args.event_date.clone(),
            seed: args.seed,
            include_bands: args.bands,
            historical_plan_ids: args.historical.clone(),
            strict_calibration: args.strict,
        }
    }
}

#[derive(Args)]
pub struct MarkovArgs {
    pub plan_id: String,
    /// Analyze a single task
    #[arg(short, long)]
    pub task: Option<String>,
    #[arg(long)]
    pub historical: Vec<String>,
}

#[derive(Args)]
pub struct ImpactArgs {
    pub plan_id: String,
    pub task_id: String,
    /// Proposed new due date, RFC 3339
    #[arg(long)]
    pub due_date: Option<String>,
    /// Explicit slippage in days
    #[arg(long)]
    pub slippage_days: Option<f64>,
    /// Also run the seeded simulation delta
    #[arg(long)]
    pub simulate: bool,
}

impl From<&ImpactArgs> for params::ImpactParams {
    fn from(args: &ImpactArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            task_id: args.task_id.clone(),
            due_date: args.due_date.clone(),
            start_date: None,
            assignees: None,
            percent_complete: None,
            slippage_days: args.slippage_days,
            with_simulation: args.simulate,
            historical_plan_ids: Vec::new(),
        }
    }
}

#[derive(Args)]
pub struct IntelligenceArgs {
    pub plan_id: String,
    pub task_id: String,
    /// Include the Monte Carlo and Markov sections
    #[arg(long)]
    pub simulations: bool,
}

#[derive(Args)]
pub struct CostArgs {
    pub plan_id: String,
    #[arg(long)]
    pub schedule_weight: Option<f64>,
    #[arg(long)]
    pub resource_weight: Option<f64>,
    #[arg(long)]
    pub risk_weight: Option<f64>,
}

#[derive(Subcommand)]
pub enum LockCommands {
    /// Acquire or renew a task lock
    Acquire(AcquireLockArgs),
    /// Release a held lock
    Release(ReleaseLockArgs),
    /// Show the live lock on a task
    Show(TaskArg),
}

#[derive(Args)]
pub struct AcquireLockArgs {
    pub plan_id: String,
    pub task_id: String,
    pub user_id: String,
    /// Time-to-live in minutes (default 15)
    #[arg(long)]
    pub ttl_minutes: Option<i64>,
}

#[derive(Args)]
pub struct ReleaseLockArgs {
    pub plan_id: String,
    pub task_id: String,
    pub user_id: String,
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// Ingest an external event and derive proposed actions
    Ingest(IngestEventArgs),
    /// List recent events
    List(PlanArg),
    /// Delete an event and its derived actions
    Delete(EventRefArgs),
}

#[derive(Args)]
pub struct IngestEventArgs {
    pub plan_id: String,
    /// e.g. flight_cancellation, participant_meeting_cancelled
    pub event_type: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// low, medium, high or critical
    #[arg(long)]
    pub severity: Option<String>,
    /// Affected task ids (repeatable)
    #[arg(short, long)]
    pub affected: Vec<String>,
    /// Opaque JSON payload, e.g. '{"shift_days": 2}'
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Args)]
pub struct EventRefArgs {
    pub plan_id: String,
    pub event_id: i64,
}

#[derive(Subcommand)]
pub enum ActionCommands {
    /// List proposed actions, optionally by status
    List(ListActionsArgs),
    /// Approve a pending action (applies its mutation)
    Approve(DecideActionArgs),
    /// Reject a pending action
    Reject(DecideActionArgs),
    /// Delete an action row outright
    Delete(ActionRefArgs),
}

#[derive(Args)]
pub struct ListActionsArgs {
    pub plan_id: String,
    /// pending, approved or rejected
    #[arg(short, long)]
    pub status: Option<String>,
}

#[derive(Args)]
pub struct DecideActionArgs {
    pub plan_id: String,
    pub action_id: i64,
    /// Deciding user
    pub user_id: String,
}

impl From<&DecideActionArgs> for params::ActionDecision {
    fn from(args: &DecideActionArgs) -> Self {
        Self {
            plan_id: args.plan_id.clone(),
            action_id: args.action_id,
            decided_by: args.user_id.clone(),
        }
    }
}

#[derive(Args)]
pub struct ActionRefArgs {
    pub plan_id: String,
    pub action_id: i64,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List plans usable as templates
    List,
    /// Clone a template into a new plan, shifting dates onto an event date
    Clone(CloneTemplateArgs),
}

#[derive(Args)]
pub struct CloneTemplateArgs {
    pub source_plan_id: String,
    pub target_plan_id: String,
    /// RFC 3339; the latest source due date lands here
    pub event_date: String,
    #[arg(short, long)]
    pub name: Option<String>,
    /// Keep the source task ids instead of regenerating them
    #[arg(long)]
    pub preserve_ids: bool,
}

impl From<&CloneTemplateArgs> for params::CloneTemplate {
    fn from(args: &CloneTemplateArgs) -> Self {
        Self {
            source_plan_id: args.source_plan_id.clone(),
            target_plan_id: args.target_plan_id.clone(),
            event_date: args.event_date.clone(),
            name: args.name.clone(),
            preserve_task_ids: args.preserve_ids,
        }
    }
}

//! Reconciliation commands: sync, deactivate and preview.

use std::sync::Arc;

use clap::{Args, Subcommand};
use routinecal_core::{
    CalendarEvent, CoreError, Database, InMemoryCalendar, RoutineCatalog, RoutineProvider,
    SyncOrchestrator, SyncResult, SyncSummary,
};
use serde::Serialize;

use super::{parse_date, print_json, runtime, CliResult, Context};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Tear down and recreate the events of one routine
    Routine {
        /// Routine ID
        routine_id: String,
        /// Owning user
        #[arg(long)]
        user: String,
        /// First day of the schedule (YYYY-MM-DD, default today)
        #[arg(long)]
        start: Option<String>,
    },
    /// Sync every active routine of a user
    All {
        /// Owning user
        #[arg(long)]
        user: String,
        /// First day of the schedule (YYYY-MM-DD, default today)
        #[arg(long)]
        start: Option<String>,
    },
}

#[derive(Args)]
pub struct DeactivateArgs {
    /// Routine ID
    pub routine_id: String,
    /// Owning user
    #[arg(long)]
    pub user: String,
}

#[derive(Args)]
pub struct PreviewArgs {
    /// Routine ID
    pub routine_id: String,
    /// Owning user
    #[arg(long)]
    pub user: String,
    /// First day of the schedule (YYYY-MM-DD, default today)
    #[arg(long)]
    pub start: Option<String>,
}

/// Sync output; offline runs also list the events that would be written.
#[derive(Serialize)]
struct Report<T: Serialize> {
    #[serde(flatten)]
    outcome: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    offline_events: Option<Vec<CalendarEvent>>,
}

pub fn run(ctx: &Context, action: SyncAction) -> CliResult {
    let (orchestrator, calendar) = ctx.orchestrator()?;
    let rt = runtime()?;

    match action {
        SyncAction::Routine {
            routine_id,
            user,
            start,
        } => {
            let start = parse_date(start.as_deref())?;
            let result: SyncResult =
                rt.block_on(orchestrator.resync_routine(&user, &routine_id, start))?;
            print_json(&Report {
                outcome: result,
                offline_events: calendar.offline_events(),
            })
        }
        SyncAction::All { user, start } => {
            let start = parse_date(start.as_deref())?;
            let summary: SyncSummary = rt.block_on(orchestrator.sync_all_routines(&user, start))?;
            print_json(&Report {
                outcome: summary,
                offline_events: calendar.offline_events(),
            })
        }
    }
}

pub fn deactivate(ctx: &Context, args: DeactivateArgs) -> CliResult {
    let (orchestrator, _) = ctx.orchestrator()?;
    let result = runtime()?.block_on(orchestrator.teardown_routine(&args.user, &args.routine_id))?;
    print_json(&result)
}

pub fn preview(ctx: &Context, args: PreviewArgs) -> CliResult {
    let config = ctx.config()?;
    let routine = ctx
        .catalog(&config)?
        .get_routine(&args.user, &args.routine_id)?
        .ok_or_else(|| {
            CoreError::NotFound(format!("routine {} for user {}", args.routine_id, args.user))
        })?;
    let start = parse_date(args.start.as_deref())?;

    // preview never reaches the calendar or the mapping table
    let orchestrator = SyncOrchestrator::new(
        Arc::new(InMemoryCalendar::new()),
        Arc::new(Database::open_in_memory()?),
        Arc::new(RoutineCatalog::default()),
    )
    .configure(&config)?;
    print_json(&orchestrator.preview_routine(&routine, start))
}

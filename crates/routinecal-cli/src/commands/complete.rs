use clap::Args;
use routinecal_core::WorkoutKey;

use super::{parse_date, print_json, runtime, CliResult, Context};

#[derive(Args)]
pub struct CompleteArgs {
    /// Routine ID
    pub routine_id: String,
    /// Workout ID
    pub workout_id: String,
    /// Scheduled date (YYYY-MM-DD)
    pub date: String,
    /// Owning user
    #[arg(long)]
    pub user: String,
    /// Mark the workout incomplete instead
    #[arg(long)]
    pub undo: bool,
    /// Completed exercise IDs, comma-separated (keeps the stored list if omitted)
    #[arg(long, value_delimiter = ',')]
    pub exercises: Option<Vec<String>>,
}

pub fn run(ctx: &Context, args: CompleteArgs) -> CliResult {
    let date = parse_date(Some(&args.date))?;
    let key = WorkoutKey::new(args.user, args.routine_id, args.workout_id, date);

    let completion = ctx.completion()?;
    let result = runtime()?.block_on(completion.toggle_workout_completion(
        &key,
        !args.undo,
        args.exercises,
    ))?;
    print_json(&result)
}

use clap::Args;
use routinecal_core::MappingStore;

use super::{print_json, CliResult, Context};

#[derive(Args)]
pub struct MappingsArgs {
    /// Routine ID; all of the user's mappings when omitted
    pub routine_id: Option<String>,
    /// Owning user
    #[arg(long)]
    pub user: String,
}

pub fn run(ctx: &Context, args: MappingsArgs) -> CliResult {
    let config = ctx.config()?;
    let db = ctx.database(&config)?;
    let mappings = match args.routine_id {
        Some(routine_id) => db.mappings_for_routine(&args.user, &routine_id)?,
        None => db.mappings_for_user(&args.user)?,
    };
    print_json(&mappings)
}

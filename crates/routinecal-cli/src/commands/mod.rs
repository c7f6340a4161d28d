pub mod auth;
pub mod complete;
pub mod config;
pub mod mappings;
pub mod sync;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use routinecal_core::{
    CalendarEvent, CalendarProvider, CompletionStatusSync, Config, Database,
    GoogleCalendarProvider, InMemoryCalendar, RoutineCatalog, SyncOrchestrator,
};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Global options shared by every command.
pub struct Context {
    pub data_dir: PathBuf,
    pub offline: bool,
}

/// Calendar backing a command run. `offline` is set when nothing is sent
/// to Google.
pub struct Calendar {
    pub provider: Arc<dyn CalendarProvider>,
    pub offline: Option<Arc<InMemoryCalendar>>,
}

impl Calendar {
    /// Events the offline calendar holds, `None` when online.
    pub fn offline_events(&self) -> Option<Vec<CalendarEvent>> {
        self.offline
            .as_ref()
            .map(|calendar| calendar.events().into_values().collect())
    }
}

impl Context {
    pub fn new(data_dir: Option<PathBuf>, offline: bool) -> CliResult<Self> {
        let data_dir = match data_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                dir
            }
            None => routinecal_core::storage::data_dir()?,
        };
        Ok(Self { data_dir, offline })
    }

    pub fn config(&self) -> CliResult<Config> {
        Ok(Config::load_from(&self.data_dir)?)
    }

    pub fn database(&self, config: &Config) -> CliResult<Arc<Database>> {
        Ok(Arc::new(Database::open(&config.database_path(&self.data_dir))?))
    }

    pub fn catalog(&self, config: &Config) -> CliResult<Arc<RoutineCatalog>> {
        Ok(Arc::new(RoutineCatalog::from_file(&config.routines_path(&self.data_dir))?))
    }

    pub fn calendar(&self, config: &Config) -> CliResult<Calendar> {
        if self.offline {
            let calendar = Arc::new(InMemoryCalendar::new());
            return Ok(Calendar {
                provider: calendar.clone(),
                offline: Some(calendar),
            });
        }
        let google = GoogleCalendarProvider::from_stored_token(
            config.calendar.api_base.clone(),
            config.calendar.calendar_id.clone(),
        )?;
        Ok(Calendar {
            provider: Arc::new(google),
            offline: None,
        })
    }

    /// Orchestrator wired to the configured calendar, database and catalog.
    pub fn orchestrator(&self) -> CliResult<(SyncOrchestrator, Calendar)> {
        let config = self.config()?;
        let calendar = self.calendar(&config)?;
        let orchestrator = SyncOrchestrator::new(
            calendar.provider.clone(),
            self.database(&config)?,
            self.catalog(&config)?,
        )
        .configure(&config)?;
        Ok((orchestrator, calendar))
    }

    pub fn completion(&self) -> CliResult<CompletionStatusSync> {
        let config = self.config()?;
        let calendar = self.calendar(&config)?;
        let db = self.database(&config)?;
        Ok(CompletionStatusSync::new(calendar.provider, db.clone(), db)
            .with_style(config.completion_style())
            .with_retry_policy(config.retry_policy()))
    }
}

/// Runtime for the async core operations.
pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Parse `YYYY-MM-DD`, defaulting to today.
pub fn parse_date(value: Option<&str>) -> CliResult<NaiveDate> {
    match value {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{raw}' (expected YYYY-MM-DD): {e}").into()),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

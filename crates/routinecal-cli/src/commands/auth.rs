use clap::Subcommand;
use routinecal_core::integrations::google::{TOKEN_ENV, TOKEN_KEY};
use routinecal_core::integrations::keyring_store;
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store a Google Calendar access token in the OS keyring
    SetToken {
        /// OAuth2 bearer token
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Show where the token would be read from
    Status,
}

pub fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::SetToken { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("token must not be empty".into());
            }
            keyring_store::set(TOKEN_KEY, token)?;
            println!("google token stored");
        }
        AuthAction::Clear => {
            keyring_store::delete(TOKEN_KEY)?;
            println!("google token removed");
        }
        AuthAction::Status => {
            let from_env = std::env::var(TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty());
            // keyring may be unavailable on headless machines
            let in_keyring = keyring_store::get(TOKEN_KEY).ok().flatten().is_some();
            let source = if from_env {
                Some("env")
            } else if in_keyring {
                Some("keyring")
            } else {
                None
            };
            print_json(&json!({
                "google": {
                    "authenticated": source.is_some(),
                    "source": source,
                }
            }))?;
        }
    }
    Ok(())
}

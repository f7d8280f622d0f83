//! Session command implementations.
//!
//! The signed-in user is kept in preferences so backups and restores know
//! whose data they handle without a `--user` flag on every call.

use crate::cli::SessionCommands;
use crate::error::Result;
use crate::model::wire::now_millis;
use crate::storage::{PreferenceStore, keys};
use serde::Serialize;
use std::path::PathBuf;

use super::Workspace;

#[derive(Serialize)]
struct SessionOutput {
    user_id: Option<String>,
    email: Option<String>,
    last_login_at: Option<i64>,
}

/// Execute session commands.
///
/// # Errors
///
/// Returns an error if the workspace is not initialized or preferences
/// cannot be written.
pub fn execute(command: &SessionCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut workspace = Workspace::open(db_path, None)?;
    let prefs = &mut workspace.prefs;

    match command {
        SessionCommands::Login { user_id, email } => {
            prefs.put_string(keys::SESSION_USER_ID, user_id)?;
            match email {
                Some(email) => prefs.put_string(keys::SESSION_USER_EMAIL, email)?,
                None => prefs.remove(keys::SESSION_USER_EMAIL)?,
            }
            prefs.put_i64(keys::SESSION_LAST_LOGIN_AT, now_millis())?;
            if !json {
                println!("Signed in as {user_id}");
            }
        }
        SessionCommands::Logout => {
            prefs.remove(keys::SESSION_USER_ID)?;
            prefs.remove(keys::SESSION_USER_EMAIL)?;
            if !json {
                println!("Signed out");
            }
        }
        SessionCommands::Show => {}
    }

    let output = SessionOutput {
        user_id: prefs.get_string(keys::SESSION_USER_ID),
        email: prefs.get_string(keys::SESSION_USER_EMAIL),
        last_login_at: prefs.get_i64(keys::SESSION_LAST_LOGIN_AT),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else if matches!(command, SessionCommands::Show) {
        match (&output.user_id, &output.email) {
            (Some(user), Some(email)) => println!("Signed in as {user} <{email}>"),
            (Some(user), None) => println!("Signed in as {user}"),
            (None, _) => println!("Not signed in."),
        }
    }

    Ok(())
}

use std::path::Path;

use tandem_core::{CommandOutcome, SharedTimer, SyncSettings};

use crate::commands::common::{attach_timer, print_status, timer_status_item};
use crate::error::CliError;

pub async fn run_toggle(
    session: &str,
    as_json: bool,
    db_path: &Path,
    settings: SyncSettings,
) -> Result<(), CliError> {
    let timer = attach_timer(session, db_path, settings).await?;
    let outcome = timer.toggle().await;
    finish_command(timer, outcome, as_json).await
}

/// Wait for a command to settle, then report the resulting state.
pub async fn finish_command(
    timer: SharedTimer,
    outcome: tandem_core::Result<CommandOutcome>,
    as_json: bool,
) -> Result<(), CliError> {
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(error) => {
            timer.close().await;
            return Err(error.into());
        }
    };

    if let CommandOutcome::Rejected(_) = outcome {
        timer.close().await;
        return Err(CliError::SyncInProgress);
    }

    timer.wait_until_synced().await;
    let item = timer_status_item(&timer);
    timer.close().await;

    print_status(&item, as_json)
}

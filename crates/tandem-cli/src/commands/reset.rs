use std::path::Path;

use tandem_core::SyncSettings;

use crate::commands::common::attach_timer;
use crate::commands::toggle::finish_command;
use crate::error::CliError;

pub async fn run_reset(
    session: &str,
    as_json: bool,
    db_path: &Path,
    settings: SyncSettings,
) -> Result<(), CliError> {
    let timer = attach_timer(session, db_path, settings).await?;
    let outcome = timer.reset().await;
    finish_command(timer, outcome, as_json).await
}

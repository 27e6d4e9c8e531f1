use std::path::Path;

use tandem_core::SyncSettings;

use crate::commands::common::{attach_timer, print_status, timer_status_item};
use crate::error::CliError;

pub async fn run_status(
    session: &str,
    as_json: bool,
    db_path: &Path,
    settings: SyncSettings,
) -> Result<(), CliError> {
    let timer = attach_timer(session, db_path, settings).await?;
    let item = timer_status_item(&timer);
    timer.close().await;

    print_status(&item, as_json)
}

use std::io::{self, Write};
use std::path::Path;

use tandem_core::SyncSettings;

use crate::commands::common::{attach_timer, format_elapsed};
use crate::error::CliError;

pub async fn run_watch(
    session: &str,
    db_path: &Path,
    settings: SyncSettings,
) -> Result<(), CliError> {
    let timer = attach_timer(session, db_path, settings).await?;
    let mut display = timer.display();
    let mut stdout = io::stdout();

    let result = loop {
        let line = watch_line(*display.borrow_and_update(), timer.is_running());
        if let Err(error) = write!(stdout, "\r{line}").and_then(|()| stdout.flush()) {
            break Err(error.into());
        }

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(CliError::from);
            }
            changed = display.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
        }
    };

    println!();
    timer.close().await;
    result
}

pub fn watch_line(display_time_ms: u64, is_running: bool) -> String {
    let state = if is_running { "running" } else { "paused " };
    format!("{}  [{state}]", format_elapsed(display_time_ms))
}

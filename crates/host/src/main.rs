mod app;

use std::process::ExitCode;

use tracing::{error, info};

fn main() -> ExitCode {
    let wiring = match app::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match app::run_walkthrough(wiring) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                markers = summary.markers_emitted,
                recomputes = summary.recomputes,
                chain_completed = summary.chain_completed,
                coins_granted = summary.coins_granted,
                players_flushed = summary.players_flushed,
                "walkthrough_finished"
            );
            if summary.chain_completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!(error = %err, "walkthrough_failed");
            ExitCode::FAILURE
        }
    }
}

mod cli;
mod error;
mod io;
mod logging;
mod metadata;
mod run;

use cli::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    let _guard = logging::setup_logging(settings.verbose);
    metadata::log_version_info();

    match run::run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use grader::config::WorkerSettings;
use grader::worker::{SYSTEM_ERROR_EXIT, WORKER_LOG_ENV, run_worker};

/// Grades one staged submission and prints its test case records as JSON
#[derive(Parser)]
#[command(name = "grader-worker", version = "1.0", about, long_about = None)]
struct WorkerArgs {
    /// Problem to grade against
    problem_id: String,

    /// Staged submission source
    source_path: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().filter_or(WORKER_LOG_ENV, "error"));

    let args = WorkerArgs::parse();
    let settings = WorkerSettings::from_env();

    let output = match run_worker(&args.problem_id, &args.source_path, &settings) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let json = match serde_json::to_string(&output) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("failed to encode test case records: {e}");
            return ExitCode::from(SYSTEM_ERROR_EXIT);
        }
    };

    let mut stdout = std::io::stdout().lock();
    match writeln!(stdout, "{json}").and_then(|()| stdout.flush()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to write test case records: {e}");
            ExitCode::from(SYSTEM_ERROR_EXIT)
        }
    }
}

use std::process::ExitCode;

fn main() -> ExitCode {
    match grove_notes::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

fn main() -> ExitCode {
    match synapse::cli::main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

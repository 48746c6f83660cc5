use std::process::ExitCode;

fn main() -> ExitCode {
    chainflow_cli::run()
}

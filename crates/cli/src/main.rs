use std::process::ExitCode;

fn main() -> ExitCode {
    salesbot_cli::run()
}

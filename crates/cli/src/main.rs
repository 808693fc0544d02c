use std::process::ExitCode;

fn main() -> ExitCode {
    covermatch_cli::run()
}

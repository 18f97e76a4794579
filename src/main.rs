use std::process::ExitCode;

fn main() -> ExitCode {
    match dea_rank::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dea: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

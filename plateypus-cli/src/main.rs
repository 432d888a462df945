//! Entry point for the `plateypus` binary.
#![forbid(unsafe_code)]

use plateypus_cli::CliError;

fn main() {
    match plateypus_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("plateypus: {err}");
            std::process::exit(1);
        }
    }
}

use std::process::ExitCode;
use clap::Parser as ClapParser;
use bracket_lang::{run, Config, Error};

fn main() -> ExitCode {
    let config = Config::parse();

    if config.input.extension().map_or(true, |extension| extension != "bl") {
        eprintln!("Error: Only .bl files are allowed");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Io(err)) => {
            eprintln!("Error: Could not open file '{}': {}", config.input.display(), err);
            ExitCode::FAILURE
        },
        Err(err) => {
            eprintln!("Execution error: {}", err);
            ExitCode::FAILURE
        },
    }
}

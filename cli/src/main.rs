use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use devsetup_cli::cli::{Cli, Command};
use devsetup_cli::commands;
use devsetup_cli::logging::{self, Logger};

fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and --version go to stdout and succeed; usage errors exit 1.
            let code = u8::from(e.use_stderr());
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let command = args.command.name();
    logging::init_subscriber(args.verbose, command);
    let log = Arc::new(Logger::new(command));

    let result = match &args.command {
        Command::Install(opts) => commands::install::run(&args.global, opts, &log),
        Command::Doctor => commands::doctor::run(&args.global, &log),
        Command::Update(opts) => commands::update::run(&args.global, opts, &log),
        Command::Version => {
            commands::version::run(&args.global);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

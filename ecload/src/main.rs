mod cli;
mod exit_codes;
mod logging;
mod output;
mod run;
mod run_error;
mod scenario_yaml;

use clap::Parser;
use ecload_shop::Preset;
use exit_codes::ExitCode;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => std::process::exit(usage_error(&err).as_i32()),
    };

    logging::init(cli.log_format);

    let code = match cli.command {
        cli::Command::Run(args) => run::run(args).await.unwrap_or_else(|err| {
            eprintln!("{err}");
            err.exit_code()
        }),
        cli::Command::List => {
            print_scenarios();
            ExitCode::Success
        }
    };

    std::process::exit(code.as_i32());
}

/// Prints clap's message; `--help`/`--version` are not failures.
fn usage_error(err: &clap::Error) -> ExitCode {
    use clap::error::ErrorKind;

    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success,
        _ => ExitCode::InvalidInput,
    }
}

fn print_scenarios() {
    let width = Preset::ALL.iter().map(|p| p.name().len()).max().unwrap_or(0);
    for preset in Preset::ALL {
        println!("{:<width$}  {}", preset.name(), preset.description());
    }
}

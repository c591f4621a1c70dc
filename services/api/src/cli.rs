use crate::render::{run_report, run_sweep, ReportArgs, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lending_lens::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lending Lens",
    about = "Replay, simulate and sweep lending decision thresholds from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print overall and monthly acceptance statistics
    Report(ReportArgs),
    /// Print the acceptance-rate grid across threshold pairs
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report(args) => run_report(args).await,
        Command::Sweep(args) => run_sweep(args).await,
    }
}

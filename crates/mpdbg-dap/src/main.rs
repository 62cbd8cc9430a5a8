use clap::Parser;
use mpdbg_dap::config::Cli;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    mpdbg_dap::start(cli.into())
}

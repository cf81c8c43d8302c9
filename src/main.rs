use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = netbox_secret::cli::Cli::parse();
    netbox_secret::cli::init_tracing(cli.verbose);
    cli.run()
}

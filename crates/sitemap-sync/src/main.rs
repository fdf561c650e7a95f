use clap::Parser;
use sitemap_sync::cli::{self, publish_cmd, Cli, Command};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.json {
        std::env::set_var("SITEMAP_SYNC_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("SITEMAP_SYNC_QUIET", "1");
    }
    cli::init_tracing(cli.log_json);

    let result = match cli.command {
        Command::Publish(args) => publish_cmd::run(args, false).await,
        Command::Preview(args) => publish_cmd::run(args, true).await,
    };

    if let Err(e) = result {
        error!("{e:?}");
        std::process::exit(1);
    }
}

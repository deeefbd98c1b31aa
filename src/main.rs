mod cli;

use slack_mcp::config::Config;
use slack_mcp::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("slack-mcp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cfg = Config::from_env()?;
    server::run_stdio_server(cfg).await
}

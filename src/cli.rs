use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("slack-mcp")
        .about("Slack MCP server (stdio JSON-RPC)")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, then RUST_LOG, then info. Logs go to stderr; stdout carries JSON-RPC.
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.target(env_logger::Target::Stderr).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_level_and_version() {
        let m = build_cli()
            .try_get_matches_from(["slack-mcp", "--log-level", "debug", "--version"])
            .unwrap();
        assert_eq!(m.get_one::<String>("log-level").map(String::as_str), Some("debug"));
        assert!(m.get_flag("version"));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(build_cli().try_get_matches_from(["slack-mcp", "--nope"]).is_err());
    }
}

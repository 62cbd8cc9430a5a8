use std::time::Duration;

use clap::Parser;

use crate::cache::DEFAULT_MAX_SIZE;

/// Debug Adapter Protocol server for programs running on the mpdbg runtime
#[derive(Parser, Debug, Clone)]
#[command(name = "mpdbg-dap")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Address to listen on, or to dial with --connect
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on, or to dial with --connect
    #[arg(short, long, default_value_t = 5678)]
    pub port: u16,

    /// Connect to a waiting client instead of listening
    #[arg(long, default_value_t = false)]
    pub connect: bool,

    /// Module path of the debuggee started on attach
    #[arg(short, long, default_value = "target")]
    pub module: String,

    /// Entry point of the debuggee started on attach
    #[arg(short, long, default_value = "main")]
    pub entry: String,

    /// Maximum number of variable references kept alive per session
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
    pub max_cached_refs: usize,

    /// How long the dispatcher waits for a message per tick, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub poll_interval_ms: u64,

    /// Forward adapter logs to the client's debug console
    #[arg(long, default_value_t = false)]
    pub console_log: bool,
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub host: String,
    pub port: u16,
    pub connect: bool,
    /// Debuggee used when the attach request does not name one.
    pub module: String,
    pub entry_point: String,
    pub max_cached_refs: usize,
    pub poll_interval: Duration,
    pub console_log: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5678,
            connect: false,
            module: "target".to_string(),
            entry_point: "main".to_string(),
            max_cached_refs: DEFAULT_MAX_SIZE,
            poll_interval: Duration::from_millis(50),
            console_log: false,
        }
    }
}

impl AdapterConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<Cli> for AdapterConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            connect: cli.connect,
            module: cli.module,
            entry_point: cli.entry,
            max_cached_refs: cli.max_cached_refs,
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            console_log: cli.console_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let config = AdapterConfig::from(Cli::parse_from(["mpdbg-dap"]));
        let default = AdapterConfig::default();

        assert_eq!(config.address(), default.address());
        assert_eq!(config.module, default.module);
        assert_eq!(config.entry_point, default.entry_point);
        assert_eq!(config.max_cached_refs, default.max_cached_refs);
        assert_eq!(config.poll_interval, default.poll_interval);
        assert!(!config.connect);
        assert!(!config.console_log);
    }

    #[rstest]
    #[case(&["mpdbg-dap", "--port", "6000", "--host", "0.0.0.0"], "0.0.0.0:6000")]
    #[case(&["mpdbg-dap", "-p", "7000", "--connect"], "127.0.0.1:7000")]
    fn test_address(#[case] args: &[&str], #[case] address: &str) {
        let config = AdapterConfig::from(Cli::parse_from(args.iter().copied()));
        assert_eq!(config.address(), address);
    }

    #[test]
    fn test_debuggee_and_tuning_flags() {
        let config = AdapterConfig::from(Cli::parse_from([
            "mpdbg-dap",
            "--module",
            "src/target.py",
            "--entry",
            "mathematics",
            "--max-cached-refs",
            "5",
            "--poll-interval-ms",
            "10",
            "--console-log",
        ]));

        assert_eq!(config.module, "src/target.py");
        assert_eq!(config.entry_point, "mathematics");
        assert_eq!(config.max_cached_refs, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(config.console_log);
    }
}

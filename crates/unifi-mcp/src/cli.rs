//! Clap derive structures for the `unifi-mcp` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// unifi-mcp -- drive the controller session the MCP tools use
#[derive(Debug, Parser)]
#[command(
    name = "unifi-mcp",
    version,
    about = "Call the local UniFi controller API through the MCP adapter's session",
    long_about = "Logs in to a UniFi OS gateway or standalone controller, issues one\n\
        request, prints the tool payload as JSON and logs out again.\n\n\
        Connection settings come from UNIFI_* environment variables, a .env\n\
        file, or a TOML config file.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "UNIFI_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and report the detected controller platform
    Login,

    /// GET a controller path, e.g. /api/s/default/stat/device
    Get(RequestArgs),

    /// POST a JSON body to a controller path
    Post(BodyArgs),

    /// PUT a JSON body to a controller path
    Put(BodyArgs),

    /// DELETE a controller path
    Delete(RequestArgs),
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Controller API path (legacy form; proxied automatically on UniFi OS)
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long, short = 'q', value_parser = parse_pair)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct BodyArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// JSON request body
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

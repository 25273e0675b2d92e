mod cli;
mod error;

use clap::Parser;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use unifi_mcp_api::{ControllerSession, RequestOptions, ToolPayload, envelope_data};

use crate::cli::{BodyArgs, Cli, Command, RequestArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr; stdout carries only the JSON payload.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let credentials = unifi_mcp_config::load_credentials(cli.config.as_deref())?;
    let session = ControllerSession::new(credentials)?;

    tracing::debug!(command = ?cli.command, "dispatching command");
    let outcome = execute(&session, cli.command).await;

    session.shutdown().await;
    outcome
}

async fn execute(session: &ControllerSession, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login => {
            if !session.login().await {
                return Err(CliError::AuthFailed {
                    url: session.base_url().to_string(),
                });
            }
            let platform = session.platform().await;
            print_json(&json!({
                "authenticated": true,
                "platform": platform.map(|p| format!("{p:?}")),
                "csrf_token": session.csrf_token().await.is_some(),
            }))
        }
        Command::Get(args) => {
            let opts = options(&args, None)?;
            emit(session.get(&args.path, opts).await)
        }
        Command::Post(BodyArgs { request, data }) => {
            let opts = options(&request, data.as_deref())?;
            emit(session.post(&request.path, opts).await)
        }
        Command::Put(BodyArgs { request, data }) => {
            let opts = options(&request, data.as_deref())?;
            emit(session.put(&request.path, opts).await)
        }
        Command::Delete(args) => {
            let opts = options(&args, None)?;
            emit(session.delete(&args.path, opts).await)
        }
    }
}

fn options(args: &RequestArgs, data: Option<&str>) -> Result<RequestOptions, CliError> {
    let mut opts = RequestOptions::new();
    for (key, value) in &args.query {
        opts = opts.query(key, value);
    }
    if let Some(raw) = data {
        let body: Value = serde_json::from_str(raw).map_err(CliError::InvalidBody)?;
        opts = opts.json(body);
    }
    Ok(opts)
}

/// Print the tool payload; a failed call still prints `{error, data}`.
fn emit(result: Result<Value, unifi_mcp_api::Error>) -> Result<(), CliError> {
    match result {
        Ok(value) => {
            tracing::info!(records = envelope_data(&value).len(), "request complete");
            print_json(&ToolPayload::Data(value).into_value())
        }
        Err(err) => {
            print_json(&ToolPayload::failure(err.to_string()).into_value())?;
            Err(err.into())
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(CliError::Output)?;
    println!("{text}");
    Ok(())
}

//! `breact`: a command-line client for BReact services.
//!
//! Configuration comes from the environment (`BREACT_API_KEY`,
//! `BREACT_BASE_URL`, and the timeout variables); `--base-url` and
//! `--api-key` override it. Logs go to stderr so command output on stdout
//! can be piped. Set `BREACT_LOG_FORMAT=json` for JSON log lines.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sdk::{BReactClient, ClientConfig, ServiceInstance, SummarizationService};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const LOG_FORMAT_ENV: &str = "BREACT_LOG_FORMAT";

#[derive(Debug, Parser)]
#[command(name = "breact", version, about = "Run BReact services from the command line")]
struct Arguments {
    /// API base URL (defaults to $BREACT_BASE_URL or the public endpoint).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key; $BREACT_API_KEY takes precedence when set.
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the services available to this API key.
    Services,

    /// Run an endpoint of a service and print the response.
    Run {
        service_id: String,
        endpoint: String,

        /// Endpoint parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Summarise text with the built-in summarizer.
    Summarize {
        text: String,

        /// Maximum summary length in words.
        #[arg(long)]
        max_length: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Arguments::parse();
    let client = connect(&args)?;

    let outcome = run(&client, args.command).await;
    client.close().await;
    outcome
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

fn connect(args: &Arguments) -> Result<BReactClient> {
    let mut config = ClientConfig::builder();
    if let Some(base_url) = &args.base_url {
        config = config.base_url(base_url);
    }
    if let Some(api_key) = &args.api_key {
        config = config.api_key(api_key);
    }
    let config = config.build().context("invalid client configuration")?;
    BReactClient::new(config).context("failed to build the BReact client")
}

async fn run(client: &BReactClient, command: Command) -> Result<()> {
    match command {
        Command::Services => {
            let services = client.fetch_services().await?;
            let mut services: Vec<_> = services.into_values().collect();
            services.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
            for service in services {
                println!("{}\t{}", service.id, service.name);
            }
        }
        Command::Run {
            service_id,
            endpoint,
            params,
        } => {
            let params: Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;
            anyhow::ensure!(params.is_object(), "--params must be a JSON object");

            client.fetch_services().await?;
            let response = client.execute_service(&service_id, &endpoint, params).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Summarize { text, max_length } => {
            client.fetch_services().await?;
            let summarizer = client
                .get_service_as::<SummarizationService>()
                .await?
                .context("summarizer service is unavailable")?;
            tracing::debug!(service_id = %summarizer.service_id(), "summarizer ready");

            let response = summarizer.summarize(&text, max_length).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line_is_well_formed() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn run_defaults_to_empty_params() {
        let args = Arguments::parse_from(["breact", "run", "text_analyzer", "analyze"]);
        match args.command {
            Command::Run { params, .. } => assert_eq!(params, "{}"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args = Arguments::parse_from([
            "breact",
            "summarize",
            "some text",
            "--max-length",
            "40",
            "--base-url",
            "http://localhost:8080",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080"));
        assert!(matches!(
            args.command,
            Command::Summarize { max_length: Some(40), .. }
        ));
    }
}

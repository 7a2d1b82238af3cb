//! Audit Client - command-line consumer of the audit API
//!
//! Fetches one page of audit records through the typed client and prints the
//! envelope as JSON.

use std::env;

use anyhow::{bail, Context, Result};
use audit_slice::{
    client::{ApiClient, ClientConfigUpdate, StaticToken},
    models::AuditQuery,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    base_url: Option<String>,
    token: Option<String>,
    query: AuditQuery,
}

fn parse_args(args: &[String]) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--base-url" => parsed.base_url = Some(value(arg)?),
            "--token" => parsed.token = Some(value(arg)?),
            "--page" => {
                parsed.query.page = value(arg)?.parse().context("--page must be a number")?
            }
            "--page-size" => {
                parsed.query.page_size = value(arg)?
                    .parse()
                    .context("--page-size must be a number")?
            }
            "--search" => parsed.query.search_term = Some(value(arg)?),
            "--operation" => parsed.query.operation = Some(value(arg)?),
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(args) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };

    let client = ApiClient::from_env()?;
    if let Some(base_url) = args.base_url {
        client.configure(ClientConfigUpdate::default().base_url(base_url));
    }
    if let Some(token) = args.token.or_else(|| env::var("AUDIT_API_TOKEN").ok()) {
        client.set_token_provider(StaticToken(token));
    }
    client.configure(ClientConfigUpdate::default().on_unauthorized(|err| {
        warn!("Not authorized: {}", err.user_friendly_message());
    }));

    match client.audit().get_records(&args.query).await {
        Ok(page) => {
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        Err(err) => {
            for message in err.all_error_messages() {
                eprintln!("error: {}", message);
            }
            bail!("Request failed with status {}", err.status_code())
        }
    }
}

fn print_help() {
    println!(
        r#"Audit Client {}

USAGE:
    audit-client [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    --base-url <URL>        API root (default: $VITE_API_URL, $AUDIT_API_URL
                            or http://localhost:8080/api/v1)
    --token <TOKEN>         Bearer token (default: $AUDIT_API_TOKEN)
    --page <N>              Page number (default: 1)
    --page-size <N>         Page size, 1-100 (default: 50)
    --search <TERM>         Case-insensitive search term
    --operation <OP>        Operation filter"#,
        env!("CARGO_PKG_VERSION")
    );
}

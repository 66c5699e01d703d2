use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use gxrest::{ClientConfig, FileStore, FileUpload, Progress, ProgressCallback, Resource, RestClient};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Rest(#[from] gxrest::RestError),
    #[error("missing password; pass --password or set GX_PASSWORD")]
    MissingPassword,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gx", about = "Authenticated REST client CLI")]
struct Cli {
    #[arg(long, help = "Overrides GX_ENDPOINT (default http://127.0.0.1:3000)")]
    endpoint: Option<String>,

    #[arg(long, help = "Overrides GX_CLIENT_ID (default gx-cli)")]
    client_id: Option<String>,

    #[arg(long, help = "Overrides GX_STORAGE_KEY")]
    storage_key: Option<String>,

    #[arg(long, env = "GX_STORE_PATH", default_value = ".gx-session.json", help = "File the session is persisted in")]
    store: PathBuf,

    #[arg(long, help = "Overrides GX_REQUEST_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "GX_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    Whoami,
    Get(ReadArgs),
    Post(WriteArgs),
    Put(WriteArgs),
    Delete(ReadArgs),
    Upload(UploadArgs),
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
struct ReadArgs {
    #[arg(required = true, help = "Resource path segments, e.g. `users 42`")]
    resource: Vec<String>,
    #[arg(long, help = "Query parameters as a JSON object")]
    query: Option<String>,
}

#[derive(Args, Debug)]
struct WriteArgs {
    #[arg(required = true)]
    resource: Vec<String>,
    #[arg(long, help = "JSON request body")]
    data: String,
    #[arg(long)]
    query: Option<String>,
}

#[derive(Args, Debug)]
struct UploadArgs {
    #[arg(required = true)]
    resource: Vec<String>,
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    query: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    #[arg(required = true)]
    resource: Vec<String>,
    #[arg(long, help = "Output file path, or - for stdout")]
    output: PathBuf,
    #[arg(long)]
    query: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config =
        ClientConfig::from_lookup(settings(&cli))?.with_on_login(|user| tracing::info!(%user, "session active"));
    let client = RestClient::new(config, Arc::new(FileStore::new(cli.store)))?;
    client.set_on_token_expired(|| tracing::warn!("session expired; run `gx login` again"));

    match cli.command {
        Command::Login { username, password } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            print_json(&client.login(&username, &password).await?)
        }
        Command::Logout => {
            client.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => match client.user() {
            Some(user) => print_json(&user),
            None => {
                println!("not logged in");
                Ok(())
            }
        },
        Command::Get(args) => {
            let query = parse_query(args.query.as_deref())?;
            print_json(&client.get(resource(args.resource), query).await?)
        }
        Command::Post(args) => {
            let (data, query) = parse_write(&args)?;
            print_json(&client.post(resource(args.resource), data, query).await?)
        }
        Command::Put(args) => {
            let (data, query) = parse_write(&args)?;
            print_json(&client.put(resource(args.resource), data, query).await?)
        }
        Command::Delete(args) => {
            let query = parse_query(args.query.as_deref())?;
            print_json(&client.del(resource(args.resource), query).await?)
        }
        Command::Upload(args) => {
            let query = parse_query(args.query.as_deref())?;
            let file = FileUpload::from_path(&args.file).await?;
            let body = client
                .upload(resource(args.resource), file, query, progress_printer(args.progress))
                .await?;
            finish_progress(args.progress);
            print_json(&body)
        }
        Command::Download(args) => {
            let query = parse_query(args.query.as_deref())?;
            let bytes = client
                .download(resource(args.resource), query, progress_printer(args.progress))
                .await?;
            finish_progress(args.progress);
            if args.output.as_os_str() == "-" {
                std::io::stdout().write_all(&bytes)?;
            } else {
                std::fs::write(&args.output, &bytes)?;
                println!("wrote {} bytes to {}", bytes.len(), args.output.display());
            }
            Ok(())
        }
    }
}

/// Variable source for [`ClientConfig::from_lookup`]: flags, then the
/// environment (including `.env`), then CLI defaults.
fn settings(cli: &Cli) -> impl Fn(&str) -> Option<String> + use<> {
    let flags = vec![
        ("GX_ENDPOINT", cli.endpoint.clone()),
        ("GX_CLIENT_ID", cli.client_id.clone()),
        ("GX_STORAGE_KEY", cli.storage_key.clone()),
        ("GX_REQUEST_TIMEOUT_SECS", cli.timeout_secs.map(|s| s.to_string())),
    ];
    move |key| {
        flags
            .iter()
            .find(|(name, _)| *name == key)
            .and_then(|(_, value)| value.clone())
            .or_else(|| std::env::var(key).ok())
            .or_else(|| match key {
                "GX_ENDPOINT" => Some("http://127.0.0.1:3000".to_owned()),
                "GX_CLIENT_ID" => Some("gx-cli".to_owned()),
                _ => None,
            })
    }
}

fn resource(segments: Vec<String>) -> Resource {
    Resource::from(segments)
}

fn parse_query(raw: Option<&str>) -> Result<Option<Value>, CliError> {
    raw.map(serde_json::from_str::<Value>).transpose().map_err(CliError::from)
}

fn parse_write(args: &WriteArgs) -> Result<(Value, Option<Value>), CliError> {
    let data = serde_json::from_str::<Value>(&args.data)?;
    Ok((data, parse_query(args.query.as_deref())?))
}

fn progress_printer(enabled: bool) -> Option<ProgressCallback> {
    if !enabled {
        return None;
    }
    Some(Arc::new(|p: Progress| {
        let total = p.total.map_or_else(|| "?".to_owned(), |t| t.to_string());
        eprint!("\r{:?} {}/{} bytes", p.direction, p.loaded, total);
    }))
}

fn finish_progress(enabled: bool) {
    if enabled {
        eprintln!();
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other)?,
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

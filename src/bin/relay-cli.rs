use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the API relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered configs
    List,
    /// Show one config
    Get { id: String },
    /// Register a config from a JSON file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Patch a config from a JSON file
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Remove a config
    Delete { id: String },
    /// Check connectivity to the upstream of a config
    Test {
        id: String,
        /// Parameters as key=value
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Call a config through the proxy
    Call {
        id: String,
        /// Parameters as key=value
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn params_object(params: Vec<(String, String)>) -> Map<String, Value> {
    params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::List => client.get(format!("{}/configs", base)).send().await?,
        Commands::Get { id } => client.get(format!("{}/configs/{}", base, id)).send().await?,
        Commands::Create { file } => {
            client
                .post(format!("{}/configs", base))
                .json(&read_json(&file)?)
                .send()
                .await?
        }
        Commands::Update { id, file } => {
            client
                .put(format!("{}/configs/{}", base, id))
                .json(&read_json(&file)?)
                .send()
                .await?
        }
        Commands::Delete { id } => {
            client
                .delete(format!("{}/configs/{}", base, id))
                .send()
                .await?
        }
        Commands::Test { id, params } => {
            client
                .post(format!("{}/test/{}", base, id))
                .json(&json!({ "testParams": params_object(params) }))
                .send()
                .await?
        }
        Commands::Call { id, params } => {
            client
                .post(format!("{}/proxy/{}", base, id))
                .json(&params_object(params))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
    } else {
        eprintln!("Error: relay returned status {}", status);
        eprintln!("{}", rendered);
    }
    Ok(())
}

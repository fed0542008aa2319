use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mesh-cli")]
#[command(about = "Management CLI for the service mesh", long_about = None)]
struct Cli {
    /// Base URL of the mesh server
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// API key for registry writes
    #[arg(short, long)]
    key: Option<String>,

    /// Prefix the service routes are mounted under
    #[arg(long, default_value = "/api/v1")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered services
    List,
    /// Show one service
    Get { name: String },
    /// Register or replace a service endpoint
    Register { name: String, url: String },
    /// Remove a service
    Deregister { name: String },
    /// Call a registered service through the mesh
    Proxy {
        name: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long, default_value = "/")]
        path: String,
        /// JSON body forwarded to the service
        #[arg(long)]
        payload: Option<String>,
    },
    /// Check server and store status
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let services = format!("{}{}/services", cli.url.trim_end_matches('/'), cli.prefix.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert("x-api-key", HeaderValue::from_str(key)?);
    }

    let res = match cli.command {
        Commands::List => client.get(&services).send().await?,
        Commands::Get { name } => client.get(format!("{services}/{name}")).send().await?,
        Commands::Register { name, url } => {
            client
                .post(format!("{services}/register"))
                .headers(headers)
                .json(&json!({ "name": name, "url": url }))
                .send()
                .await?
        }
        Commands::Deregister { name } => {
            client
                .delete(format!("{services}/{name}"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Proxy {
            name,
            method,
            path,
            payload,
        } => {
            let payload: Option<Value> = payload.as_deref().map(serde_json::from_str).transpose()?;
            client
                .post(format!("{services}/{name}/proxy"))
                .json(&json!({ "method": method, "path": path, "payload": payload }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", cli.url.trim_end_matches('/'))).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: mesh returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

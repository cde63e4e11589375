use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::{Certificate, Client, Identity};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "shop-cli")]
#[command(about = "Client for the shop item service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "https://localhost:8443")]
    url: String,

    /// Client certificate presented to the server (PEM)
    #[arg(long, default_value = "test-certs/client-cert.pem")]
    cert: PathBuf,

    /// Private key for the client certificate (PEM)
    #[arg(long, default_value = "test-certs/client-key.pem")]
    key: PathBuf,

    /// CA bundle used to verify the server (PEM)
    #[arg(long, default_value = "test-certs/ca-cert.pem")]
    ca: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every item
    List,
    /// Fetch one item
    Get { id: String },
    /// Create an item; the server assigns the id
    Create { name: String, price: f64 },
    /// Replace an existing item
    Update { id: String, name: String, price: f64 },
    /// Delete an item
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = build_client(&cli)?;

    let (method, body) = match cli.command {
        Commands::List => ("GetAll", json!({})),
        Commands::Get { id } => ("Get", json!({ "id": id })),
        Commands::Create { name, price } => ("Create", json!({ "name": name, "price": price })),
        Commands::Update { id, name, price } => {
            ("Update", json!({ "id": id, "name": name, "price": price }))
        }
        Commands::Remove { id } => ("Remove", json!({ "id": id })),
    };

    let res = client
        .post(format!("{}/shop.ShopService/{}", cli.url.trim_end_matches('/'), method))
        .json(&body)
        .send()
        .await?;
    print_response(res).await
}

fn build_client(cli: &Cli) -> Result<Client, Box<dyn std::error::Error>> {
    let mut identity_pem = std::fs::read(&cli.cert)?;
    identity_pem.push(b'\n');
    identity_pem.extend(std::fs::read(&cli.key)?);

    let mut builder = Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .identity(Identity::from_pem(&identity_pem)?);
    for ca in Certificate::from_pem_bundle(&std::fs::read(&cli.ca)?)? {
        builder = builder.add_root_certificate(ca);
    }
    Ok(builder.build()?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

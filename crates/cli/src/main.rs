//! Envprov CLI - operator interface to the provisioning daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "envprov")]
#[command(about = "Environment provisioning CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "ENVPROV_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a new environment
    Create {
        /// Owning tenant id
        #[arg(short, long)]
        owner: String,

        /// Plan: solo, team or enterprise
        #[arg(short, long, default_value = "solo")]
        plan: String,
    },

    /// Tear down an environment
    Delete {
        /// Environment ID
        id: String,
    },

    /// Show one environment
    Show {
        /// Environment ID
        id: String,
    },

    /// List environments
    List {
        /// Only this owner's environments
        #[arg(long)]
        owner: Option<String>,

        /// Only environments in this status
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive match on slug, hostname or owner
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value = "0")]
        skip: i64,

        #[arg(long, default_value = "20")]
        take: i64,
    },

    /// Environment counts per status
    Stats,

    /// Ask the compute provider for an environment's instance status
    LiveStatus {
        /// Environment ID
        id: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Environment {
    id: String,
    slug: String,
    hostname: String,
    owner_id: String,
    plan: String,
    status: String,
    provider_instance_id: Option<String>,
    ipv4: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentPage {
    items: Vec<Environment>,
    total: i64,
    skip: i64,
    take: i64,
}

#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "SLUG")]
    slug: String,
    #[tabled(rename = "OWNER")]
    owner: String,
    #[tabled(rename = "PLAN")]
    plan: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "IPV4")]
    ipv4: String,
}

impl From<&Environment> for EnvironmentRow {
    fn from(env: &Environment) -> Self {
        Self {
            id: env.id.clone(),
            slug: env.slug.clone(),
            owner: env.owner_id.clone(),
            plan: env.plan.clone(),
            status: paint_status(&env.status).to_string(),
            ipv4: env.ipv4.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn paint_status(status: &str) -> ColoredString {
    match status {
        "running" => status.green(),
        "pending" | "provisioning" => status.yellow(),
        "error" => status.red(),
        "deleting" | "stopped" => status.dimmed(),
        other => other.normal(),
    }
}

fn list_params(
    owner: Option<String>,
    status: Option<String>,
    search: Option<String>,
    skip: i64,
    take: i64,
) -> serde_json::Value {
    let mut params = json!({ "skip": skip, "take": take });
    for (key, value) in [("ownerId", owner), ("status", status), ("search", search)] {
        if let Some(value) = value {
            params[key] = json!(value);
        }
    }
    params
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_environment(env: &Environment) {
    println!("  {} {}", "ID:".bold(), env.id);
    println!("  {} {}", "Slug:".bold(), env.slug);
    println!("  {} {}", "Hostname:".bold(), env.hostname);
    println!("  {} {}", "Owner:".bold(), env.owner_id);
    println!("  {} {}", "Plan:".bold(), env.plan);
    println!("  {} {}", "Status:".bold(), paint_status(&env.status));
    println!(
        "  {} {}",
        "Instance:".bold(),
        env.provider_instance_id.as_deref().unwrap_or("-")
    );
    println!("  {} {}", "IPv4:".bold(), env.ipv4.as_deref().unwrap_or("-"));
    if let Some(message) = &env.error_message {
        println!("  {} {}", "Error:".bold(), message.red());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create { owner, plan } => {
            let params = json!({ "ownerId": owner, "plan": plan });
            let result = call_rpc(&cli.rpc_url, "env.create.v1", params).await?;
            let env: Environment = serde_json::from_value(result)?;

            println!("{}", "✓ Environment requested".green().bold());
            println!();
            print_environment(&env);
        }

        Commands::Delete { id } => {
            let result = call_rpc(&cli.rpc_url, "env.delete.v1", json!({ "id": id })).await?;
            let env: Environment = serde_json::from_value(result)?;

            println!(
                "{}",
                format!("✓ Environment {} is {}", env.slug, env.status)
                    .green()
                    .bold()
            );
        }

        Commands::Show { id } => {
            let result = call_rpc(&cli.rpc_url, "env.get.v1", json!({ "id": id })).await?;
            let env: Environment = serde_json::from_value(result)?;
            print_environment(&env);
        }

        Commands::List {
            owner,
            status,
            search,
            skip,
            take,
        } => {
            let params = list_params(owner, status, search, skip, take);
            let result = call_rpc(&cli.rpc_url, "env.list.v1", params).await?;
            let page: EnvironmentPage = serde_json::from_value(result)?;

            if page.items.is_empty() {
                println!("{}", "No environments".yellow());
            } else {
                let rows: Vec<EnvironmentRow> = page.items.iter().map(EnvironmentRow::from).collect();
                println!("{}", Table::new(rows));
            }
            println!(
                "{}",
                format!(
                    "Showing {} of {} (skip {}, take {})",
                    page.items.len(),
                    page.total,
                    page.skip,
                    page.take
                )
                .dimmed()
            );
        }

        Commands::Stats => {
            println!("{}", "Environment Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "env.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Daemon:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total:".bold(), stats["total"]);
                    for status in ["pending", "provisioning", "running", "stopped", "error", "deleting"] {
                        println!("  {:<14} {}", paint_status(status), stats[status]);
                    }
                }
                Err(e) => {
                    println!("  {} {}", "Daemon:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::LiveStatus { id } => {
            let result = call_rpc(&cli.rpc_url, "env.live_status.v1", json!({ "id": id })).await?;
            let status = result["status"].as_str().unwrap_or("unknown");
            println!("  {} {}", "Instance status:".bold(), paint_status(status));
        }
    }

    Ok(())
}

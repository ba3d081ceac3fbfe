use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pharmaledger")]
#[command(about = "CLI client for the pharmaceutical compliance ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a compliance event to the pool
    Submit {
        /// Event type, e.g. sensor-reading, deviation, corrective-action
        #[arg(long = "type")]
        tx_type: String,
        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Seal the pending pool into a new block
    Mine {
        /// Block type, e.g. compliance-audit
        #[arg(long)]
        block_type: Option<String>,
        /// Compliance check as name=pass or name=fail; repeatable
        #[arg(long = "check")]
        checks: Vec<String>,
    },
    /// Cancel the in-progress mining job
    Cancel,
    /// List pending transactions
    Pending,
    /// Chain summary
    Summary,
    /// Print the whole chain
    Chain,
    /// Latest block
    Latest,
    /// Block by number
    Block { number: u64 },
    /// Transaction by id, with its block location once mined
    Tx { id: String },
    /// Merkle inclusion check for a transaction
    Verify { id: String },
    /// Re-validate the full chain
    Validate,
    /// Health monitor snapshot
    Health,
}

#[derive(Serialize)]
struct TxOut {
    #[serde(rename = "type")]
    tx_type: String,
    payload: Value,
}

#[derive(Debug, PartialEq, Serialize)]
struct CheckOut {
    #[serde(rename = "type")]
    check_type: String,
    passed: bool,
}

#[derive(Serialize)]
struct MineOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    block_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    compliance_checks: Vec<CheckOut>,
}

fn parse_check(raw: &str) -> Result<CheckOut> {
    let Some((name, outcome)) = raw.split_once('=') else {
        bail!("check must look like name=pass or name=fail, got {raw:?}");
    };
    let passed = match outcome {
        "pass" | "passed" | "true" => true,
        "fail" | "failed" | "false" => false,
        other => bail!("unknown check outcome {other:?} for {name}"),
    };
    Ok(CheckOut { check_type: name.to_string(), passed })
}

async fn print_response(req: reqwest::RequestBuilder) -> Result<()> {
    let res = req.send().await.context("request to node failed")?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    debug!(node, command = ?cli.cmd, "sending request");

    let req = match cli.cmd {
        Command::Submit { tx_type, payload } => {
            let payload: Value = serde_json::from_str(&payload).context("payload is not valid JSON")?;
            client.post(format!("{node}/tx")).json(&TxOut { tx_type, payload })
        }
        Command::Mine { block_type, checks } => {
            let compliance_checks = checks.iter().map(|c| parse_check(c)).collect::<Result<Vec<_>>>()?;
            client.post(format!("{node}/mine")).json(&MineOut { block_type, compliance_checks })
        }
        Command::Cancel => client.post(format!("{node}/mine/cancel")),
        Command::Pending => client.get(format!("{node}/mempool")),
        Command::Summary => client.get(format!("{node}/chain/summary")),
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Latest => client.get(format!("{node}/chain/latest")),
        Command::Block { number } => client.get(format!("{node}/chain/blocks/{number}")),
        Command::Tx { id } => client.get(format!("{node}/tx/{id}")),
        Command::Verify { id } => client.get(format!("{node}/tx/{id}/verify")),
        Command::Validate => client.post(format!("{node}/chain/validate")),
        Command::Health => client.get(format!("{node}/health/ledger")),
    };
    print_response(req).await
}

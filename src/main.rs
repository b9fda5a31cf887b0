//! Grid Tactics - resolve one battle turn from the command line
//!
//! Reads a battle record (or a full turn request) as JSON, resolves the turn
//! and prints the result envelope as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use grid_tactics::battle::battle_map::MapDescriptor;
use grid_tactics::battle::execution::{TurnOutcome, TurnRequest, TurnResolver};
use grid_tactics::battle::narrative::{NarrativeGenerator, TemplateNarrator};
use grid_tactics::battle::state::BattleRecord;
use grid_tactics::core::config::{load_rules, RulesConfig};
use grid_tactics::core::error::{BattleError, Result};
use grid_tactics::core::types::Side;
use grid_tactics::llm::{LlmClient, LlmNarrator, LlmOrderInterpreter};
use grid_tactics::orders::{OrderInterpreter, StructuredOrderInterpreter};

/// Resolve one turn of a grid battle
#[derive(Parser, Debug)]
#[command(name = "grid-tactics")]
#[command(about = "Resolve one turn of a two-sided grid battle and print the result as JSON")]
struct Args {
    /// Full turn request (JSON); overrides --battle, --map and the order files
    #[arg(long)]
    request: Option<PathBuf>,

    /// Battle record (JSON)
    #[arg(long)]
    battle: Option<PathBuf>,

    /// Map descriptor (JSON); defaults to an open field
    #[arg(long)]
    map: Option<PathBuf>,

    /// Player 1 orders
    #[arg(long)]
    p1_orders: Option<PathBuf>,

    /// Player 2 orders
    #[arg(long)]
    p2_orders: Option<PathBuf>,

    /// Rules file (TOML); unset keys keep their defaults
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Orders are natural language, interpreted through the LLM
    #[arg(long)]
    llm: bool,

    /// Write the turn narrative through the LLM
    #[arg(long)]
    narrative: bool,

    /// Write the result here instead of stdout
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("grid_tactics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut rules = match &args.rules {
        Some(path) => load_rules(path)?,
        None => RulesConfig::default(),
    };
    if args.narrative {
        rules.narrative_enabled = true;
    }

    let request = build_request(&args)?;
    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, turn = request.battle_record.current_turn, "Starting turn resolution");

    let rt = Runtime::new()?;
    let outcome = rt.block_on(async {
        match (args.llm, args.narrative) {
            (false, false) => {
                let outcome =
                    resolve(rules, StructuredOrderInterpreter, TemplateNarrator, &request, seed)
                        .await;
                Ok::<_, BattleError>(outcome)
            }
            (true, false) => {
                let interpreter = LlmOrderInterpreter::new(LlmClient::from_env()?);
                Ok(resolve(rules, interpreter, TemplateNarrator, &request, seed).await)
            }
            (false, true) => {
                let narrator = LlmNarrator::new(LlmClient::from_env()?);
                Ok(resolve(rules, StructuredOrderInterpreter, narrator, &request, seed).await)
            }
            (true, true) => {
                let client = LlmClient::from_env()?;
                let interpreter = LlmOrderInterpreter::new(client.clone());
                Ok(resolve(rules, interpreter, LlmNarrator::new(client), &request, seed).await)
            }
        }
    })?;

    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.out {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }

    if !outcome.is_success() {
        std::process::exit(2);
    }
    Ok(())
}

async fn resolve<I: OrderInterpreter, N: NarrativeGenerator>(
    rules: RulesConfig,
    interpreter: I,
    narrator: N,
    request: &TurnRequest,
    seed: u64,
) -> TurnOutcome {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    TurnResolver::new(rules, interpreter, narrator)
        .resolve_turn(request, &mut rng)
        .await
}

fn build_request(args: &Args) -> Result<TurnRequest> {
    if let Some(path) = &args.request {
        return read_json(path);
    }

    let battle = args
        .battle
        .as_ref()
        .ok_or_else(|| BattleError::Config("either --request or --battle is required".into()))?;
    let record: BattleRecord = read_json(battle)?;
    let map = match &args.map {
        Some(path) => read_json(path)?,
        None => MapDescriptor::open_field(),
    };

    let mut request = TurnRequest::new(record, map);
    if let Some(path) = &args.p1_orders {
        request = request.with_orders(Side::Player1, fs::read_to_string(path)?);
    }
    if let Some(path) = &args.p2_orders {
        request = request.with_orders(Side::Player2, fs::read_to_string(path)?);
    }
    Ok(request)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

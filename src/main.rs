//! Claim Publisher CLI
//!
//! Command-line interface for managing the local wallet and publishing
//! claims to the on-chain registry.

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;
use claim_publisher::chain::AlloyClientFactory;
use claim_publisher::graphql::EntityLookupClient;
use claim_publisher::notify::TracingNotifier;
use claim_publisher::settings::{JsonFileStore, SettingsStore};
use claim_publisher::wallet::KeyWallet;
use claim_publisher::{
    build_plan, ClaimDraft, EntityRef, Error, Result, Stake, StakeSide, TransactionExecutor,
};

#[derive(Parser)]
#[command(name = "claim-publisher")]
#[command(about = "Publish knowledge-graph claims to an on-chain registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "claim-publisher.json")]
    settings: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local wallet
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Show the transaction plan for a claim without publishing
    Plan {
        #[command(flatten)]
        claim: ClaimArgs,
    },

    /// Publish a claim: create missing records, then deposit the stake
    Publish {
        #[command(flatten)]
        claim: ClaimArgs,
    },

    /// Search existing entity records by label
    Lookup {
        /// Entity label to search for
        label: String,
    },

    /// Show current settings
    Config,
}

#[derive(Subcommand)]
enum WalletAction {
    /// Generate a new wallet
    Create,

    /// Import a 0x-prefixed private key
    Import {
        /// Private key (0x + 64 hex chars)
        private_key: String,
    },

    /// Show wallet state
    Status,

    /// Fetch and show the wallet balance
    Balance,

    /// Delete the wallet (password re-verified first)
    Delete,
}

#[derive(Args)]
struct ClaimArgs {
    /// Label for a new subject entity
    #[arg(long, conflicts_with = "subject_id")]
    subject: Option<String>,

    /// ID of an existing subject entity
    #[arg(long)]
    subject_id: Option<String>,

    /// Label for a new predicate entity
    #[arg(long, conflicts_with = "predicate_id")]
    predicate: Option<String>,

    /// ID of an existing predicate entity
    #[arg(long)]
    predicate_id: Option<String>,

    /// Label for a new object entity
    #[arg(long, conflicts_with = "object_id")]
    object: Option<String>,

    /// ID of an existing object entity
    #[arg(long)]
    object_id: Option<String>,

    /// Stake an existing relationship record instead of creating one
    #[arg(long)]
    relationship_id: Option<String>,

    /// Stake amount in ETH (e.g. 0.001)
    #[arg(long, default_value = "0.001")]
    stake: String,

    /// Stake side: "for" or "against"
    #[arg(long, default_value = "for")]
    side: String,
}

impl ClaimArgs {
    fn entity(
        label: &Option<String>,
        id: &Option<String>,
        slot: &str,
    ) -> Result<EntityRef> {
        match (label, id) {
            (Some(label), None) => Ok(EntityRef::New {
                label: label.clone(),
            }),
            (None, Some(id)) => Ok(EntityRef::Existing {
                id: parse_u256(id, slot)?,
            }),
            _ => Err(Error::Validation(format!(
                "provide exactly one of --{slot} or --{slot}-id"
            ))),
        }
    }

    fn to_draft(&self) -> Result<ClaimDraft> {
        Ok(ClaimDraft {
            subject: Self::entity(&self.subject, &self.subject_id, "subject")?,
            predicate: Self::entity(&self.predicate, &self.predicate_id, "predicate")?,
            object: Self::entity(&self.object, &self.object_id, "object")?,
            existing_relationship: self
                .relationship_id
                .as_deref()
                .map(|raw| parse_u256(raw, "relationship"))
                .transpose()?,
        })
    }

    fn to_stake(&self) -> Result<Stake> {
        let amount = parse_ether(&self.stake)
            .map_err(|e| Error::Validation(format!("bad stake amount: {}", e)))?;
        let side = match self.side.to_lowercase().as_str() {
            "for" => StakeSide::For,
            "against" => StakeSide::Against,
            other => {
                return Err(Error::Validation(format!(
                    "side must be \"for\" or \"against\", got \"{}\"",
                    other
                )))
            }
        };
        Ok(Stake { amount, side })
    }
}

fn parse_u256(raw: &str, what: &str) -> Result<U256> {
    U256::from_str(raw).map_err(|e| Error::Validation(format!("bad {} id {}: {}", what, raw, e)))
}

fn prompt_password(prompt: &str) -> Result<SecretString> {
    let raw = rpassword::prompt_password(prompt)
        .map_err(|e| Error::Validation(format!("password entry failed: {}", e)))?;
    Ok(SecretString::from(raw))
}

fn open_wallet(store: Arc<JsonFileStore>) -> Result<KeyWallet> {
    KeyWallet::new(
        store,
        Arc::new(AlloyClientFactory),
        Arc::new(TracingNotifier),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let store = Arc::new(JsonFileStore::new(cli.settings.clone()));

    match cli.command {
        Commands::Wallet { action } => run_wallet(store, action).await?,
        Commands::Plan { claim } => run_plan(claim)?,
        Commands::Publish { claim } => run_publish(store, claim).await?,
        Commands::Lookup { label } => run_lookup(store, label).await?,
        Commands::Config => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings).unwrap());
        }
    }

    Ok(())
}

async fn run_wallet(store: Arc<JsonFileStore>, action: WalletAction) -> Result<()> {
    let wallet = open_wallet(store)?;

    match action {
        WalletAction::Create => {
            let password = prompt_password("New wallet password (min 8 chars): ")?;
            let address = wallet.create_wallet(&password).await?;
            println!("Created wallet {}", address);
            wallet.lock();
        }
        WalletAction::Import { private_key } => {
            let password = prompt_password("New wallet password (min 8 chars): ")?;
            let address = wallet.import_wallet(&private_key, &password).await?;
            println!("Imported wallet {}", address);
            wallet.lock();
        }
        WalletAction::Status => {
            let state = wallet.state();
            println!("initialized: {}", state.is_initialized);
            println!("unlocked:    {}", state.is_unlocked);
            match state.address {
                Some(address) => println!("address:     {}", address),
                None => println!("address:     -"),
            }
        }
        WalletAction::Balance => {
            let password = prompt_password("Wallet password: ")?;
            wallet.unlock(&password).await?;
            let balance = wallet.refresh_balance().await?;
            println!("{} ETH", format_ether(balance));
            wallet.lock();
        }
        WalletAction::Delete => {
            let password = prompt_password("Wallet password (confirms deletion): ")?;
            wallet.delete_wallet(&password).await?;
            println!("Wallet deleted");
        }
    }
    Ok(())
}

fn run_plan(claim: ClaimArgs) -> Result<()> {
    let draft = claim.to_draft()?;
    let stake = claim.to_stake()?;
    let plan = build_plan(&draft, &stake);

    println!("Plan ({} steps):", plan.steps.len());
    for (index, step) in plan.steps.iter().enumerate() {
        println!("  {}. {}", index + 1, step.description);
    }
    println!("Total cost:    {} ETH", format_ether(plan.total_cost));
    println!("Estimated gas: {}", plan.estimated_gas);
    Ok(())
}

async fn run_publish(store: Arc<JsonFileStore>, claim: ClaimArgs) -> Result<()> {
    let draft = claim.to_draft()?;
    let stake = claim.to_stake()?;

    let settings = store.load()?;
    let registry = settings.network.registry_address();

    let wallet = open_wallet(store)?;
    let password = prompt_password("Wallet password: ")?;
    let handle = wallet.unlock(&password).await?;
    let balance = wallet.state().balance.unwrap_or_default();

    let mut plan = build_plan(&draft, &stake);
    println!(
        "Publishing {} steps, total cost {} ETH",
        plan.steps.len(),
        format_ether(plan.total_cost)
    );

    let executor = TransactionExecutor::new(&handle, registry, balance);
    let result = executor
        .execute(&draft, &stake, &mut plan, |step| {
            println!("  [{}] {}", step.status, step.description);
            if let Some(error) = &step.error {
                println!("        {}", error);
            }
        })
        .await;

    wallet.lock();

    if result.success {
        println!("Published.");
        if let Some(relationship_id) = result.relationship_id {
            println!("  relationship: {}", relationship_id);
        }
        if let Some(shares) = result.shares_received {
            println!("  shares:       {}", shares);
        }
        for hash in &result.transaction_hashes {
            println!("  tx: {}", hash);
        }
        Ok(())
    } else {
        println!(
            "Publish failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        if !result.entities_created.is_empty() {
            println!(
                "  entities already created on-chain: {:?}",
                result.entities_created
            );
        }
        for hash in &result.transaction_hashes {
            println!("  confirmed tx: {}", hash);
        }
        // Partial progress is already on-chain; exit nonzero so scripts
        // notice, but everything above tells the user where things stand.
        std::process::exit(1);
    }
}

async fn run_lookup(store: Arc<JsonFileStore>, label: String) -> Result<()> {
    let settings = store.load()?;
    let client = EntityLookupClient::new(settings.network.graphql_url());

    let matches = client.search_entities(&label).await?;
    if matches.is_empty() {
        println!("No entities found for \"{}\"", label);
        return Ok(());
    }
    for entity in matches {
        println!("{}  {}", entity.id, entity.label);
    }
    Ok(())
}

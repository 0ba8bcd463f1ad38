//! Cart CLI - Command-line client for the cartridge storage ledger.
//!
//! Provides commands for:
//! - Browsing the catalog (`list`, `info`)
//! - Publishing cartridges (`publish`)
//! - Catalog administration (`init`)
//! - Wallet plumbing (`airdrop`, `balance`)
//! - Address derivation (`pda`)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cart_client::{
    CartridgeClient, LocalLedger, ProgressFn, PublishOptions, PublishOutcome, PublishProgress,
};
use cart_core::{Address, ContentId, Keypair};
use cart_net::{Endpoint, Network, RpcPool};
use cart_proto::seeds::{
    catalog_page_address, catalog_root_address, chunk_address, manifest_address,
};
use cart_proto::{CatalogEntry, MAX_CHUNK_SIZE, MAX_METADATA_LEN, PROGRAM_ID};
use cart_store::ChunkCache;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Cartridge storage CLI.
#[derive(Parser)]
#[command(name = "cart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Target network
    #[arg(long, default_value = "devnet", global = true)]
    network: String,

    /// RPC URL override (custom endpoints bypass rate limiting)
    #[arg(long, global = true)]
    url: Option<String>,

    /// WebSocket URL override (reserved for subscription transports)
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Keypair file (JSON array of 64 bytes)
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog entries
    List {
        /// Only this page
        #[arg(long, conflicts_with = "all")]
        page: Option<u32>,

        /// Every page (the default)
        #[arg(long)]
        all: bool,

        /// Include retired entries
        #[arg(long)]
        include_retired: bool,
    },

    /// Show a cartridge's manifest
    Info {
        /// Content id (64 hex chars)
        content_id: String,
    },

    /// Publish a cartridge file
    Publish {
        /// Path to the blob
        path: PathBuf,

        /// Chunk size in bytes
        #[arg(long, default_value_t = MAX_CHUNK_SIZE)]
        chunk_size: u32,

        /// Manifest metadata as a JSON string
        #[arg(long)]
        metadata: Option<String>,

        /// Run the pipeline against an in-memory ledger instead
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize the catalog (signer becomes admin)
    Init {
        /// Also create the next catalog page
        #[arg(long)]
        create_page: bool,
    },

    /// Request an airdrop to the keypair's address
    Airdrop {
        /// Amount in lamports
        #[arg(long, default_value_t = 1_000_000_000)]
        amount: u64,
    },

    /// Show an address's balance
    Balance {
        /// Address to query (defaults to the keypair's)
        #[arg(long)]
        address: Option<String>,
    },

    /// Derive program addresses
    Pda {
        /// Catalog root address
        #[arg(long, conflicts_with_all = ["catalog_page", "manifest", "chunk"])]
        catalog_root: bool,

        /// Catalog page address for an index
        #[arg(long)]
        catalog_page: Option<u32>,

        /// Manifest address for a content id
        #[arg(long)]
        manifest: Option<String>,

        /// Chunk address as HEX:INDEX
        #[arg(long)]
        chunk: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")?;

    let network = Network::parse(&cli.network)
        .with_context(|| format!("Unknown network: {}", cli.network))?;
    let rpc_url = cli
        .url
        .clone()
        .unwrap_or_else(|| network.default_url().to_string());
    if let Some(ws_url) = &cli.ws_url {
        // Subscriptions are not part of the HTTP transport; accepted for
        // config parity with other tooling.
        tracing::debug!(%ws_url, "WebSocket endpoint noted");
    }

    match cli.command {
        Commands::List {
            page,
            all,
            include_retired,
        } => {
            let client = remote_client(&rpc_url)?;
            let page = if all { None } else { page };
            cmd_list(&client, page, include_retired).await
        }

        Commands::Info { content_id } => {
            let client = remote_client(&rpc_url)?;
            cmd_info(&client, &content_id).await
        }

        Commands::Publish {
            path,
            chunk_size,
            metadata,
            dry_run,
        } => {
            let keypair = load_keypair(cli.keypair.as_deref())?;
            cmd_publish(&rpc_url, &keypair, &path, chunk_size, metadata, dry_run).await
        }

        Commands::Init { create_page } => {
            let keypair = load_keypair(cli.keypair.as_deref())?;
            let client = remote_client(&rpc_url)?;
            cmd_init(&client, &keypair, create_page).await
        }

        Commands::Airdrop { amount } => {
            let keypair = load_keypair(cli.keypair.as_deref())?;
            let pool = rpc_pool(&rpc_url);
            let signature = pool.request_airdrop(&keypair.address(), amount).await?;
            println!("Airdrop requested: {signature}");
            Ok(())
        }

        Commands::Balance { address } => {
            let address = match address {
                Some(hex) => Address::from_hex(&hex).context("Invalid address hex")?,
                None => load_keypair(cli.keypair.as_deref())?.address(),
            };
            let pool = rpc_pool(&rpc_url);
            let lamports = pool.get_balance(&address).await?;
            println!("{address}: {lamports} lamports");
            Ok(())
        }

        Commands::Pda {
            catalog_root,
            catalog_page,
            manifest,
            chunk,
        } => cmd_pda(catalog_root, catalog_page, manifest, chunk),
    }
}

fn rpc_pool(url: &str) -> RpcPool {
    RpcPool::new(vec![Endpoint::new(url)])
}

fn remote_client(url: &str) -> Result<CartridgeClient> {
    let mut client = CartridgeClient::new(Arc::new(rpc_pool(url)));
    if let Some(cache) = open_cache()? {
        client = client.with_cache(cache);
    }
    Ok(client)
}

fn open_cache() -> Result<Option<Arc<ChunkCache>>> {
    let Some(home) = dirs::home_dir() else {
        return Ok(None);
    };
    let path = home.join(".cart").join("cache");
    std::fs::create_dir_all(&path).context("Failed to create cache directory")?;
    match ChunkCache::open(&path) {
        Ok(cache) => Ok(Some(Arc::new(cache))),
        Err(err) => {
            // The cache is a hint; a broken one must not block the CLI.
            tracing::warn!(%err, "Cache unavailable, continuing without it");
            Ok(None)
        }
    }
}

fn default_keypair_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".cart").join("keypair.json"))
}

fn load_keypair(path: Option<&Path>) -> Result<Keypair> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_keypair_path()?,
    };

    if !path.exists() {
        let keypair = Keypair::random();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create keypair directory")?;
        }
        let bytes: Vec<u8> = keypair.to_bytes().to_vec();
        std::fs::write(&path, serde_json::to_string(&bytes)?)
            .context("Failed to write keypair file")?;
        println!("Generated new keypair at {path:?}: {}", keypair.address());
        return Ok(keypair);
    }

    let raw = std::fs::read_to_string(&path).context("Failed to read keypair file")?;
    let bytes: Vec<u8> = serde_json::from_str(&raw).context("Keypair file is not a JSON array")?;
    let bytes: [u8; 64] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("Keypair file must hold exactly 64 bytes"))?;
    Ok(Keypair::from_bytes(&bytes)?)
}

async fn cmd_list(
    client: &CartridgeClient,
    page: Option<u32>,
    include_retired: bool,
) -> Result<()> {
    let entries = client.list_entries(page, include_retired).await?;
    if entries.is_empty() {
        println!("No cartridges found");
        return Ok(());
    }
    for entry in &entries {
        print_entry(entry);
    }
    println!("{} cartridge(s)", entries.len());
    Ok(())
}

fn print_entry(entry: &CatalogEntry) {
    let retired = if entry.is_retired() { " [retired]" } else { "" };
    println!(
        "{}  {:>9} bytes  slot {}{}",
        entry.content_id, entry.blob_size, entry.created_slot, retired
    );
}

async fn cmd_info(client: &CartridgeClient, content_id_hex: &str) -> Result<()> {
    let content_id = ContentId::from_hex(content_id_hex).context("Invalid content id hex")?;
    let Some((address, manifest)) = client.manifest(&content_id).await? else {
        bail!("No manifest for {content_id}");
    };

    println!("Content ID:  {}", manifest.content_id);
    println!("Manifest:    {address}");
    println!("Size:        {} bytes", manifest.blob_size);
    println!(
        "Chunks:      {} x {} bytes",
        manifest.chunk_count, manifest.chunk_size
    );
    println!("Publisher:   {}", manifest.publisher);
    println!("Created:     slot {}", manifest.created_slot);
    println!(
        "Finalized:   {}",
        if manifest.finalized { "yes" } else { "no" }
    );
    if !manifest.metadata.is_empty() {
        println!(
            "Metadata:    {}",
            String::from_utf8_lossy(&manifest.metadata)
        );
    }
    Ok(())
}

async fn cmd_publish(
    rpc_url: &str,
    keypair: &Keypair,
    path: &Path,
    chunk_size: u32,
    metadata: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let blob = std::fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;

    let metadata = match metadata {
        Some(raw) => {
            // Must be valid JSON and fit the fixed manifest buffer.
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("Metadata is not valid JSON")?;
            let bytes = serde_json::to_vec(&value)?;
            if bytes.len() > MAX_METADATA_LEN {
                bail!("Metadata is {} bytes, maximum is {MAX_METADATA_LEN}", bytes.len());
            }
            bytes
        }
        None => Vec::new(),
    };

    let client = if dry_run {
        let ledger = LocalLedger::new(PROGRAM_ID);
        let client = CartridgeClient::new(Arc::new(ledger));
        client.initialize_catalog(keypair).await?;
        client.create_next_page(keypair).await?;
        println!("Dry run against an in-memory ledger");
        client
    } else {
        remote_client(rpc_url)?
    };

    let progress: ProgressFn<PublishProgress> = Arc::new(|event: &PublishProgress| match event {
        PublishProgress::Preparing { content_id } => println!("Preparing {content_id}"),
        PublishProgress::Manifest => println!("Creating manifest"),
        PublishProgress::Chunks { written, total, .. } => {
            println!("Chunks {written}/{total}")
        }
        PublishProgress::Finalizing => println!("Finalizing"),
        PublishProgress::Complete { .. } => println!("Complete"),
    });

    let receipt = client
        .publish(
            keypair,
            &blob,
            PublishOptions {
                chunk_size,
                metadata,
                progress: Some(progress),
                ..Default::default()
            },
        )
        .await?;

    match receipt.outcome {
        PublishOutcome::Published => println!("Published {}", receipt.content_id),
        PublishOutcome::AlreadyExists => println!("Already published {}", receipt.content_id),
    }
    println!("Manifest: {}", receipt.manifest_address);
    for tx in &receipt.transactions {
        println!("  tx {tx}");
    }
    Ok(())
}

async fn cmd_init(client: &CartridgeClient, keypair: &Keypair, create_page: bool) -> Result<()> {
    match client.catalog_root().await? {
        Some(root) => {
            println!(
                "Catalog exists: {} cartridge(s), {} page(s), admin {}",
                root.total_cartridges, root.page_count, root.admin
            );
        }
        None => {
            let tx = client.initialize_catalog(keypair).await?;
            println!("Catalog initialized (tx {tx})");
        }
    }

    if create_page {
        let (page_index, tx) = client.create_next_page(keypair).await?;
        println!("Created page {page_index} (tx {tx})");
    }
    Ok(())
}

fn cmd_pda(
    catalog_root: bool,
    catalog_page: Option<u32>,
    manifest: Option<String>,
    chunk: Option<String>,
) -> Result<()> {
    if catalog_root {
        let (address, bump) = catalog_root_address(&PROGRAM_ID)?;
        println!("catalog_root: {address} (bump {bump})");
    } else if let Some(page_index) = catalog_page {
        let (address, bump) = catalog_page_address(&PROGRAM_ID, page_index)?;
        println!("catalog_page {page_index}: {address} (bump {bump})");
    } else if let Some(hex) = manifest {
        let content_id = ContentId::from_hex(&hex).context("Invalid content id hex")?;
        let (address, bump) = manifest_address(&PROGRAM_ID, &content_id)?;
        println!("manifest {content_id}: {address} (bump {bump})");
    } else if let Some(target) = chunk {
        let (hex, index) = target
            .split_once(':')
            .context("Chunk argument must be HEX:INDEX")?;
        let content_id = ContentId::from_hex(hex).context("Invalid content id hex")?;
        let index: u32 = index.parse().context("Invalid chunk index")?;
        let (address, bump) = chunk_address(&PROGRAM_ID, &content_id, index)?;
        println!("chunk {content_id}:{index}: {address} (bump {bump})");
    } else {
        bail!("Specify one of --catalog-root, --catalog-page, --manifest, --chunk");
    }
    Ok(())
}

//! obscura-node binary: the `obscura` command-line entry point for running a
//! full node and managing the local wallet keystore.
//!
//! Grounded on `examples/Counselco-chronx/crates/chronx-node/src/main.rs`'s
//! argument layout, startup tracing and `expand_tilde`/
//! `load_or_generate_genesis_params` helpers, adapted to the `obscura-node`
//! crate's `NodeConfig` and `obscura_core::genesis::Genesis` shape.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use obscura_core::address::Address;
use obscura_core::config::Config;
use obscura_core::genesis::Genesis;
use obscura_network::{Multiaddr, Protocol};
use obscura_node::NodeConfig;

#[derive(Parser)]
#[command(name = "obscura", about = "Obscura blockchain node and wallet", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node: state replay, P2P networking, mining and the RPC server.
    Node(NodeArgs),
    /// Manage the local account keystore.
    Wallet(WalletArgs),
}

#[derive(Parser)]
struct NodeArgs {
    /// Directory holding the chain's data and keystore.
    #[arg(long, default_value = "~/.obscura/data")]
    data_dir: PathBuf,

    /// Chain identifier; namespaces the data directory and gossip topics.
    #[arg(long, default_value = "obscura-main")]
    chain_id: String,

    /// P2P listen multiaddress.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/7780")]
    p2p_listen: String,

    /// JSON-RPC listen address. Defaults to the p2p listen address's host
    /// with its port shifted by `Config::rpc_port_offset` (+1000).
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,

    /// Bootstrap peer multiaddresses (comma-separated).
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<String>,

    /// Path to a genesis.json to seed a fresh chain (only read if the
    /// chain's data directory has no genesis file yet).
    #[arg(long)]
    genesis_params: Option<PathBuf>,

    /// The keystore account this node mines to and signs RPC-submitted
    /// transactions with.
    #[arg(long)]
    account: Address,

    /// Keystore password for `--account`. Prompted for if omitted.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Parser)]
struct WalletArgs {
    #[command(subcommand)]
    command: WalletCommand,

    /// Directory holding the keystore.
    #[arg(long, default_value = "~/.obscura/data", global = true)]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Generates a new secp256k1 account key and writes it to the keystore.
    NewAccount,
    /// Lists every account address in the keystore.
    List,
    /// Generates the Curve25519 key pair used for private channel messages.
    NewEncryptionKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,obscura=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Node(args) => run_node(args).await,
        Commands::Wallet(args) => run_wallet(args),
    }
}

async fn run_node(args: NodeArgs) -> anyhow::Result<()> {
    info!("obscura node starting");
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let password = match args.password {
        Some(p) => p,
        None => rpassword::prompt_password("keystore password: ").context("reading password")?,
    };
    // Fails fast on a missing/wrong-password account rather than surfacing it
    // only once the first mined block or RPC submission needs to sign.
    obscura_wallet::keystore::recover_private_key(&data_dir, &args.account, &password)
        .context("unlocking --account with the given password")?;

    let genesis = load_or_generate_genesis(&data_dir, &args.chain_id, args.genesis_params.as_deref())?;

    let p2p_listen: Multiaddr = args
        .p2p_listen
        .parse()
        .with_context(|| format!("parsing --p2p-listen {}", args.p2p_listen))?;
    let bootstrap_peers = args
        .bootstrap
        .iter()
        .map(|s| {
            s.parse::<Multiaddr>()
                .with_context(|| format!("parsing bootstrap peer {s}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = Config {
        chain_id: args.chain_id.clone(),
        ..Config::default()
    };

    let rpc_addr = args
        .rpc_addr
        .unwrap_or_else(|| derive_rpc_addr(&p2p_listen, config.rpc_port_offset));

    let node_config = NodeConfig {
        data_dir,
        chain_id: args.chain_id,
        p2p_listen,
        bootstrap_peers,
        rpc_addr,
        node_account: args.account,
        genesis,
        config,
    };

    obscura_node::run(node_config).await
}

fn run_wallet(args: WalletArgs) -> anyhow::Result<()> {
    let data_dir = expand_tilde(&args.data_dir);
    match args.command {
        WalletCommand::NewAccount => {
            let password =
                rpassword::prompt_password("new keystore password: ").context("reading password")?;
            let confirm =
                rpassword::prompt_password("confirm password: ").context("reading password")?;
            anyhow::ensure!(password == confirm, "passwords did not match");
            let address = obscura_wallet::keystore::new_account(&data_dir, &password)
                .context("generating new account")?;
            println!("{}", address);
        }
        WalletCommand::List => {
            for address in obscura_wallet::keystore::accounts(&data_dir).context("reading keystore")? {
                println!("{}", address);
            }
        }
        WalletCommand::NewEncryptionKey => {
            let password = rpassword::prompt_password("new encryption-key password: ")
                .context("reading password")?;
            let pair = obscura_wallet::keys::new_encryption_key_pair(&data_dir, &password)
                .context("generating encryption key pair")?;
            println!("{}", hex::encode(pair.public.as_bytes()));
        }
    }
    Ok(())
}

/// Loads a genesis file from `--genesis-params`, or generates an ephemeral
/// single-chain genesis with no funded accounts if omitted. Only consulted
/// on a chain's first run; `obscura_core::genesis::initialise` refuses to
/// overwrite an existing `genesis.json`.
fn load_or_generate_genesis(
    data_dir: &Path,
    chain_id: &str,
    path: Option<&Path>,
) -> anyhow::Result<Genesis> {
    if let Some(p) = path {
        let json = std::fs::read_to_string(p)
            .with_context(|| format!("reading genesis params from {}", p.display()))?;
        return serde_json::from_str(&json).context("parsing genesis params JSON");
    }
    if obscura_core::genesis::genesis_path(data_dir, chain_id).exists() {
        return obscura_core::genesis::load(data_dir, chain_id).context("loading existing genesis");
    }
    warn!("no --genesis-params provided. Generating an empty genesis with no pre-mine.");
    Ok(Genesis::empty(chain_id, chrono::Utc::now().to_rfc3339()))
}

/// Derives the default RPC listen address from the p2p multiaddress's own
/// host/port, shifting the port by `offset` (`spec.md` §6: "Default listen
/// port is the main p2p port + 1000"). Falls back to `127.0.0.1` if the
/// multiaddress carries no IPv4/IPv6 component (e.g. a unix socket).
fn derive_rpc_addr(p2p_listen: &Multiaddr, offset: u16) -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr};

    let mut ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let mut port: u16 = 0;
    for component in p2p_listen.iter() {
        match component {
            Protocol::Ip4(addr) => ip = IpAddr::V4(addr),
            Protocol::Ip6(addr) => ip = IpAddr::V6(addr),
            Protocol::Tcp(p) => port = p,
            _ => {}
        }
    }
    SocketAddr::new(ip, port.saturating_add(offset))
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

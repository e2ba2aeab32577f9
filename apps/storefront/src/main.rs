//! # Dokan Storefront CLI
//!
//! Command-line client for the storefront: browse the catalog, keep a cart,
//! and place cash-on-delivery orders.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! dokan catalog list --refresh
//! dokan catalog show <product-id>
//!
//! # Cart
//! dokan cart add <product-id> --size XXL --quantity 2
//! dokan cart move <product-id> --from M --to L
//! dokan cart show
//!
//! # Checkout (preview, then place)
//! dokan checkout cart --name Rahim --phone 01712345678 \
//!     --address "House 1, Road 2" --district Dhaka
//! dokan checkout cart ... --place
//! dokan checkout buy-now --item <product-id>:M:1 ... --place
//!
//! # Account
//! dokan account login --phone 01712345678 --password ********
//! dokan account orders
//!
//! # Machine-readable output
//! dokan --json cart show
//! ```
//!
//! ## Application Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        dokan (this binary)                              │
//! │                                                                         │
//! │  main.rs ────► parse flags, load config, open Storefront                │
//! │                                                                         │
//! │  commands/ ──► catalog, cart, checkout, account, sync, config           │
//! │                                                                         │
//! │  state/ ─────► CatalogState, CartStore, Session, CheckoutAssembler      │
//! │                                 │                                       │
//! │                 ┌───────────────┴───────────────┐                       │
//! │                 ▼                               ▼                       │
//! │        SQLite (dokan.db)                 Shop backend (HTTP)            │
//! │        slots + cart outbox               catalog, cart, orders          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use dokan_storefront::commands::{self, checkout::AddressInput, print};
use dokan_storefront::error::ApiResult;
use dokan_storefront::state::ConfigState;
use dokan_storefront::{get_database_path, init_tracing, Storefront};
use dokan_sync::SyncConfig;

#[derive(Parser)]
#[command(name = "dokan")]
#[command(author, version, about = "Dokan storefront client")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Storefront config file (default: platform config dir)
    #[arg(long, global = true, env = "DOKAN_CONFIG")]
    config: Option<PathBuf>,

    /// Backend and sync config file (default: platform config dir)
    #[arg(long, global = true, env = "DOKAN_SYNC_CONFIG")]
    sync_config: Option<PathBuf>,

    /// Local database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse products
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Preview or place an order
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Sign in and manage the account
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Cart sync queue
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    List {
        /// Fetch from the backend instead of using the local snapshot
        #[arg(long)]
        refresh: bool,
    },
    /// Show one product with per-size prices
    Show { product_id: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the priced cart
    Show,
    /// Add units of a product
    Add {
        product_id: String,
        #[arg(short, long)]
        size: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set the quantity of a line (0 removes it)
    Update {
        product_id: String,
        #[arg(short, long)]
        size: Option<String>,
        #[arg(short, long)]
        quantity: i64,
    },
    /// Move a line to another size
    Move {
        product_id: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Remove every line
    Clear,
    /// Replace the local cart with the account's cart
    Refresh,
}

#[derive(Args)]
struct AddressArgs {
    /// Recipient name
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Street address
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
}

impl From<AddressArgs> for AddressInput {
    fn from(args: AddressArgs) -> Self {
        AddressInput {
            name: args.name,
            phone: args.phone,
            address: args.address,
            district: args.district,
            postal_code: args.postal_code,
        }
    }
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Check out the cart
    Cart {
        #[command(flatten)]
        address: AddressArgs,
        /// Delivery zone key; inferred from the address when left out
        #[arg(long)]
        zone: Option<String>,
        /// Place the order instead of previewing it
        #[arg(long)]
        place: bool,
    },
    /// Buy items directly, leaving the cart alone
    BuyNow {
        /// `id[:size[:quantity]]`, repeatable. Resumes the stored list when
        /// left out.
        #[arg(long = "item")]
        items: Vec<String>,
        #[command(flatten)]
        address: AddressArgs,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long)]
        place: bool,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Sign in with phone and password
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long, env = "DOKAN_PASSWORD")]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "DOKAN_PASSWORD")]
        password: String,
    },
    /// Adopt a session token obtained elsewhere
    UseToken { token: String },
    /// Sign out and forget the local cart
    Logout,
    /// Show the profile
    Profile,
    /// Save the default delivery address
    SaveAddress {
        #[command(flatten)]
        address: AddressArgs,
    },
    /// List past orders
    Orders,
    /// Show the status of one order
    Track { order_id: String },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Show pending cart changes and the last error
    Status,
    /// Replay pending cart changes now
    Flush,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        error!("Command failed: {e}");
        if json {
            if let Ok(out) = serde_json::to_string_pretty(&e) {
                println!("{out}");
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> ApiResult<()> {
    let config = ConfigState::load(cli.config.clone())?;
    let sync_config = SyncConfig::load(cli.sync_config.clone())?;
    let db_path = get_database_path(&config, cli.db.clone())?;

    let store = Storefront::open(config, sync_config, db_path).await?;
    let result = dispatch(&store, cli.command, cli.json).await;
    store.shutdown().await;
    info!("Done");
    result
}

async fn dispatch(store: &Storefront, command: Commands, json: bool) -> ApiResult<()> {
    let config = &store.config;
    match command {
        Commands::Catalog { action } => match action {
            CatalogAction::List { refresh } => {
                print(&commands::catalog::list(store, refresh).await?, config, json)
            }
            CatalogAction::Show { product_id } => {
                print(&commands::catalog::show(store, &product_id).await?, config, json)
            }
        },
        Commands::Cart { action } => {
            let view = match action {
                CartAction::Show => commands::cart::show(store).await?,
                CartAction::Add {
                    product_id,
                    size,
                    quantity,
                } => commands::cart::add(store, &product_id, size.as_deref(), quantity).await?,
                CartAction::Update {
                    product_id,
                    size,
                    quantity,
                } => {
                    commands::cart::update(store, &product_id, size.as_deref(), quantity).await?
                }
                CartAction::Move {
                    product_id,
                    from,
                    to,
                } => {
                    commands::cart::move_size(store, &product_id, from.as_deref(), to.as_deref())
                        .await?
                }
                CartAction::Clear => commands::cart::clear(store).await?,
                CartAction::Refresh => commands::cart::refresh(store).await?,
            };
            print(&view, config, json)
        }
        Commands::Checkout { action } => {
            let outcome = match action {
                CheckoutAction::Cart {
                    address,
                    zone,
                    place,
                } => commands::checkout::cart(store, address.into(), zone, place).await?,
                CheckoutAction::BuyNow {
                    items,
                    address,
                    zone,
                    place,
                } => {
                    commands::checkout::buy_now(store, &items, address.into(), zone, place).await?
                }
            };
            print(&outcome, config, json)
        }
        Commands::Account { action } => match action {
            AccountAction::Login { phone, password } => print(
                &commands::account::login(store, &phone, &password).await?,
                config,
                json,
            ),
            AccountAction::Register {
                name,
                phone,
                password,
            } => print(
                &commands::account::register(store, &name, &phone, &password).await?,
                config,
                json,
            ),
            AccountAction::UseToken { token } => print(
                &commands::account::use_token(store, &token).await?,
                config,
                json,
            ),
            AccountAction::Logout => print(&commands::account::logout(store).await?, config, json),
            AccountAction::Profile => {
                print(&commands::account::profile(store).await?, config, json)
            }
            AccountAction::SaveAddress { address } => print(
                &commands::account::save_address(store, address.into()).await?,
                config,
                json,
            ),
            AccountAction::Orders => print(&commands::account::orders(store).await?, config, json),
            AccountAction::Track { order_id } => print(
                &commands::account::track(store, &order_id).await?,
                config,
                json,
            ),
        },
        Commands::Sync { action } => match action {
            SyncAction::Status => print(&commands::sync::status(store).await?, config, json),
            SyncAction::Flush => print(&commands::sync::flush(store).await?, config, json),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => print(&commands::config::show(store), config, json),
        },
    }
}

//! Rekey CLI
//!
//! One subcommand per migration stage:
//! - `transform`: legacy dump → transformed records (+ follow-up files)
//! - `index`: transformed records → index commands
//! - `validate`: reconcile dump, transformed records and index commands
//! - `inspect`: classify a dump without touching the store
//!
//! Exit status: 0 success, 1 validation failed, 2 fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use rekey_codec::redis_store::{DEFAULT_REDIS_URL, DEFAULT_SCRATCH_DB};
use rekey_codec::{PayloadCodec, RedisStore, StoreConfig};
use rekey_model::profile::{CUSTOMER, CUSTOM_DOMAIN, ORGANIZATION};
use rekey_model::EntityProfile;

mod artifacts;
mod index;
mod inspect;
mod summary;
mod transform;
mod validate;

#[derive(Parser)]
#[command(name = "rekey")]
#[command(author, version, about = "Rekey: legacy → V2 keyspace migration toolchain")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Entity profile to migrate
    #[arg(long, global = true, value_enum, default_value_t = Entity::CustomDomain)]
    entity: Entity,

    /// Store used as the payload serialization engine
    #[arg(long, global = true, env = "REKEY_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    /// Database holding scratch keys (keep it apart from live data)
    #[arg(long, global = true, env = "REKEY_SCRATCH_DB", default_value_t = DEFAULT_SCRATCH_DB)]
    scratch_db: i64,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

impl GlobalArgs {
    fn profile(&self) -> &'static EntityProfile {
        match self.entity {
            Entity::CustomDomain => &CUSTOM_DOMAIN,
            Entity::Customer => &CUSTOMER,
            Entity::Organization => &ORGANIZATION,
        }
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.redis_url.clone(),
            scratch_db: self.scratch_db,
        }
    }

    /// Connect to the scratch store. Unreachable is fatal.
    fn connect(&self) -> Result<PayloadCodec<RedisStore>> {
        let config = self.store_config();
        let store = RedisStore::connect(&config).with_context(|| {
            format!(
                "scratch store unreachable at {} (db {})",
                config.url, config.scratch_db
            )
        })?;
        Ok(PayloadCodec::new(store))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Entity {
    CustomDomain,
    Customer,
    Organization,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-key and transcode a legacy dump into V2 records.
    Transform(transform::TransformArgs),

    /// Derive V2 secondary-index commands from transformed records.
    Index(index::IndexArgs),

    /// Cross-check the legacy dump, transformed records and index commands.
    ///
    /// Exits 1 when the verdict is a failure.
    Validate(validate::ValidateArgs),

    /// Classify a legacy dump without decoding anything.
    Inspect {
        /// Legacy dump (JSON lines)
        input: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rekey=debug" } else { "rekey=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let global = cli.global;
    match cli.command {
        Commands::Transform(args) => transform::cmd_transform(&global, &args),
        Commands::Index(args) => index::cmd_index(&global, &args),
        Commands::Validate(args) => validate::cmd_validate(&global, &args),
        Commands::Inspect { input } => inspect::cmd_inspect(global.profile(), &input),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

//! flashslot CLI
//!
//! Command-line access to a file-backed partition through a single slot handle.

use clap::{Parser, Subcommand};
use flashslot::{Config, FileEngine, HandleConfig, SlotError, SlotManager};
use tracing_subscriber::{fmt, EnvFilter};

/// flashslot CLI
#[derive(Parser, Debug)]
#[command(name = "flashslot")]
#[command(about = "Handle-based string slots over a flash-style key-value store")]
#[command(version)]
struct Args {
    /// Data directory holding partition logs
    #[arg(short, long, default_value = "./flashslot_data")]
    data_dir: String,

    /// Partition label
    #[arg(short, long, default_value = "nvs")]
    partition: String,

    /// Namespace of the slot
    #[arg(short, long, default_value = "storage")]
    namespace: String,

    /// Key of the slot
    #[arg(short, long, default_value = "key-1")]
    key: String,

    /// Value buffer capacity in bytes
    #[arg(short, long, default_value = "64")]
    capacity: usize,

    /// Max namespaces reported by `namespaces`
    #[arg(long, default_value = "64")]
    max_namespaces: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read the slot's value
    Get,

    /// Write a value into the slot
    Set {
        /// The value to store
        value: String,
    },

    /// Delete the slot's key
    Del,

    /// List distinct namespaces in the partition
    Namespaces,

    /// Print partition usage
    Stats,

    /// Run a write/read/rekey/erase walkthrough
    Demo,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flashslot=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), SlotError> {
    tracing::debug!("flashslot v{}", flashslot::VERSION);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .partition(&args.partition)
        .max_namespaces(args.max_namespaces)
        .build();

    let engine = FileEngine::open(&config).map_err(SlotError::EngineInitFailed)?;
    let manager = SlotManager::new(engine, config);

    let mut handle = manager.create(HandleConfig::new(&args.namespace, &args.key, args.capacity))?;

    match args.command {
        Commands::Get => {
            let value = manager.read(&mut handle)?;
            println!("{}", value);
        }
        Commands::Set { value } => {
            manager.write(&handle, &value)?;
        }
        Commands::Del => {
            if !manager.erase(&handle)? {
                println!("(not found)");
            }
        }
        Commands::Namespaces => {
            for namespace in manager.list_namespaces() {
                println!("{}", namespace);
            }
        }
        Commands::Stats => match manager.stats() {
            Some(stats) => println!(
                "namespaces: {}, used: {}, free: {}, total: {}",
                stats.namespace_count, stats.used_entries, stats.free_entries, stats.total_entries
            ),
            None => println!("(stats unavailable)"),
        },
        Commands::Demo => demo(&manager, &mut handle)?,
    }

    manager.destroy(handle);
    Ok(())
}

/// Write, read, switch keys, write again, erase, and list namespaces
fn demo(
    manager: &SlotManager<FileEngine>,
    handle: &mut flashslot::SlotHandle,
) -> Result<(), SlotError> {
    manager.stats();

    manager.write(handle, "example_value")?;
    println!("Read string: {}", manager.read(handle)?);
    println!("Read string: {}", manager.read(handle)?);

    manager.rekey(handle, "key-2")?;
    manager.write(handle, "example_value2")?;
    println!("Read string: {}", manager.read(handle)?);

    manager.erase(handle)?;
    match manager.read(handle) {
        Ok(value) => println!("Read string: {}", value),
        Err(e) => println!("Read after erase failed: {}", e),
    }

    for namespace in manager.list_namespaces() {
        println!("Unique namespace: {}", namespace);
    }
    Ok(())
}

//! # Cache Seeder
//!
//! Primes a local store with the demo fuel-station dataset so a console
//! that has never been online still has something to show.
//!
//! ## Usage
//! ```bash
//! # Seed ./fuelpos_dev.db
//! cargo run -p fuelpos-db --bin seed
//!
//! # Specify database path
//! cargo run -p fuelpos-db --bin seed -- --db ./data/fuelpos.db
//!
//! # Overwrite collections that already have cached entities
//! cargo run -p fuelpos-db --bin seed -- --force
//! ```
//!
//! Collections that already hold cached entities are skipped unless
//! `--force` is given.

use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fuelpos_core::demo;
use fuelpos_db::{DbConfig, LocalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fuelpos=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./fuelpos_dev.db");
    let mut force = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                println!("FuelPOS Cache Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./fuelpos_dev.db)");
                println!("  -f, --force        Re-seed collections that already have data");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let store = LocalStore::connect(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected to local store");

    let mut seeded = 0usize;
    for (collection, records) in demo::dataset() {
        let existing = store.count(collection).await?;
        if existing > 0 && !force {
            info!(
                collection = %collection,
                existing,
                "Collection already cached, skipping"
            );
            continue;
        }

        store.upsert_many(collection, &records).await?;
        seeded += records.len();
        info!(collection = %collection, count = records.len(), "Seeded collection");
    }

    info!(entities = seeded, "Seed complete");
    store.close().await;

    Ok(())
}

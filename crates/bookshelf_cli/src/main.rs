//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load layered configuration, start logging and open the store.
//! - Print catalog statistics so wiring can be checked without a server.

use anyhow::{Context, Result};
use bookshelf_core::{
    core_version, init_logging, open_pool, BookRepository, PageRequest, SqliteBookRepository,
    StoreConfig,
};
use log::info;

const CONFIG_FILE: &str = "config/bookshelf";
const ENV_PREFIX: &str = "BOOKSHELF";

fn main() -> Result<()> {
    let config = load_config()?;
    config.validate().context("invalid configuration")?;
    init_logging(&config.logging)
        .map_err(anyhow::Error::msg)
        .context("failed to initialize logging")?;

    let pool = open_pool(&config.database).with_context(|| {
        format!(
            "failed to open database `{}`",
            config.database.connection_string
        )
    })?;
    let books = SqliteBookRepository::try_new(pool).context("store is not ready")?;

    let catalog = books
        .list(PageRequest::new(0, 1))
        .context("failed to count books")?;
    let tags = books.list_tags().context("failed to list tags")?;
    info!(
        "event=cli_stats module=cli status=ok books={} tags={}",
        catalog.total,
        tags.len()
    );

    println!("bookshelf_core version={}", core_version());
    println!("database={}", config.database.connection_string);
    println!("books={} tags={}", catalog.total, tags.len());
    Ok(())
}

/// `.env`, then `config/bookshelf.{toml,json,...}`, then `BOOKSHELF_*` variables
/// (`BOOKSHELF_DATABASE__MAX_OPEN_CONNECTIONS=10`).
fn load_config() -> Result<StoreConfig> {
    // A missing `.env` is fine.
    let _ = dotenvy::dotenv();

    config::Config::builder()
        .add_source(config::File::with_name(CONFIG_FILE).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to build configuration")?
        .try_deserialize()
        .context("failed to deserialize configuration")
}

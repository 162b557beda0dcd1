//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::store::connect_index;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a default config, create the database and prepare the index
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions { config_path, force } = options;

    if config_path.exists() && !force {
        return Err(Error::AlreadyInitialized(format!(
            "{} (use --force to overwrite)",
            config_path.display()
        )));
    }

    let base_dir = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(Config::default_base_dir);

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    std::fs::create_dir_all(&config.paths.upload_dir)?;
    info!("Created upload directory at {:?}", config.paths.upload_dir);

    let db = MetaDb::new(&config.paths.db_file).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    let index = connect_index(&config, config.embedding.resolved_dimension()).await?;
    match index.ensure_ready().await {
        Ok(()) => info!("Vector index '{}' ready", index.name()),
        Err(e) => warn!(
            "Could not prepare the vector index: {}. It will be created on first serve.",
            e
        ),
    }

    Ok(config)
}

pub fn print_init(config: &Config) {
    println!("✓ Initialized boardgame-rag at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("Uploads: {:?}", config.paths.upload_dir);
    println!("\nNext steps:");
    println!("  boardgame-rag ingest ./catan.pdf --game Catan   # Index a rulebook");
    println!("  boardgame-rag serve                              # Start the HTTP API");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir, force: bool) -> InitOptions {
        InitOptions {
            config_path: dir.path().join("config.toml"),
            force,
        }
    }

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let dir = TempDir::new().unwrap();
        let config = cmd_init(options(&dir, false)).await.unwrap();

        assert!(config.paths.config_file.exists());
        assert!(config.paths.db_file.exists());
        assert!(config.paths.upload_dir.is_dir());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.paths.db_file, config.paths.db_file);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        cmd_init(options(&dir, false)).await.unwrap();

        let again = cmd_init(options(&dir, false)).await;
        assert!(matches!(again, Err(Error::AlreadyInitialized(_))));

        assert!(cmd_init(options(&dir, true)).await.is_ok());
    }
}

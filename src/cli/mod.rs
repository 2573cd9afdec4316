use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::history::{ClipboardHistory, PopularTagsInput};
use crate::rpc::{Dispatcher, RpcServer};

#[derive(Parser)]
#[command(name = "clipshelf")]
#[command(about = "Clipboard history service with tags, search and usage statistics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the RPC server")]
    Serve {
        /// Override the configured listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    #[command(about = "Print history statistics")]
    Stats,

    #[command(about = "List tags")]
    Tags {
        /// Show the N most used tags with counts
        #[arg(short, long)]
        popular: Option<i64>,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

pub struct CliHandler {
    config: Arc<Config>,
    config_path: Option<PathBuf>,
}

impl CliHandler {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    async fn open_history(&self) -> Result<Arc<ClipboardHistory>> {
        let db = &self.config.database;
        let history = ClipboardHistory::open(&db.path, db.busy_timeout())
            .await
            .with_context(|| format!("opening history database {}", db.path.display()))?;
        Ok(Arc::new(history))
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Serve { listen } => self.serve(listen).await,
            Commands::Stats => {
                let stats = self.open_history().await?.stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                Ok(())
            }
            Commands::Tags { popular } => {
                let history = self.open_history().await?;
                match popular {
                    Some(limit) => {
                        let tags = history
                            .popular_tags(PopularTagsInput { limit: Some(limit) })
                            .await?;
                        for tag in tags {
                            println!("{:>6}  {}", tag.count, tag.tag);
                        }
                    }
                    None => {
                        for tag in history.all_tags().await? {
                            println!("{}", tag);
                        }
                    }
                }
                Ok(())
            }
            Commands::Config { action } => self.handle_config(action),
        }
    }

    async fn serve(&self, listen: Option<String>) -> Result<()> {
        let mut server_config = self.config.server_config()?;
        if let Some(addr) = listen {
            server_config.listen_addr = addr
                .parse()
                .with_context(|| format!("invalid listen address '{}'", addr))?;
        }

        let history = self.open_history().await?;
        let server = RpcServer::bind(server_config, Dispatcher::new(history)).await?;
        info!("Serving clipboard history on {}", server.local_addr()?);
        server.run().await?;
        Ok(())
    }

    fn handle_config(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(self.config.as_ref())?);
            }
            ConfigAction::Init { force } => {
                let path = Config::generate_example_config(force)?;
                println!("Wrote example configuration to {}", path.display());
            }
            ConfigAction::Validate => {
                match &self.config_path {
                    Some(path) => {
                        Config::load_from_path(path)?;
                        println!("{} is valid", path.display());
                    }
                    None => {
                        self.config.validate()?;
                        println!("Configuration is valid");
                    }
                }
            }
        }
        Ok(())
    }
}

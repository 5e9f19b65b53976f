use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ipweather_core::{Config, Providers};
use ipweather_server::{AppState, serve};
use std::path::PathBuf;
use tokio::net::TcpListener;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "ipweather", version, about = "Client IP geolocation and weather service")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to bind, e.g. "127.0.0.1:8080". Overrides the config file.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Geolocate an IP and print its current weather as JSON.
    Lookup {
        /// IP address to look up.
        ip: String,
    },

    /// Write a config file with default values.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print where the config file is read from.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { ref listen } => {
                let config = self.load_config()?;
                let listen = listen.clone().unwrap_or_else(|| config.server.listen.clone());

                let providers = Providers::from_config(&config)?;
                let listener = TcpListener::bind(&listen)
                    .await
                    .with_context(|| format!("Failed to bind {listen}"))?;

                serve(listener, AppState::new(providers)).await?;
            }
            Command::Lookup { ref ip } => {
                let config = self.load_config()?;
                let providers = Providers::from_config(&config)?;

                let enrichment = providers
                    .enrich(ip)
                    .await
                    .with_context(|| format!("Failed to get IP geolocation for {ip}"))?;

                let json = serde_json::to_string_pretty(&enrichment)
                    .context("Failed to serialize lookup result")?;
                println!("{json}");
            }
            Command::InitConfig { force } => {
                let path = self.config_path()?;
                if path.exists() && !force {
                    bail!(
                        "Config file already exists: {}\n\
                         Hint: pass --force to overwrite it.",
                        path.display()
                    );
                }

                let path = self.write_config(&Config::default())?;
                println!("Wrote default config to {}", path.display());
            }
            Command::ConfigPath => {
                println!("{}", self.config_path()?.display());
            }
        }

        Ok(())
    }

    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file_path(),
        }
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }

    fn write_config(&self, config: &Config) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => {
                config.save_to(path)?;
                Ok(path.clone())
            }
            None => config.save(),
        }
    }
}

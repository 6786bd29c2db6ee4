use std::path::PathBuf;

use anyhow::bail;
use autonumber::DEFAULT_MAX_RETRIES;
use clap::Parser;

/// Runtime configuration for the `autonumber-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a local
/// `.env` file is loaded first).
///
/// Counters live in process memory. Restarting the server restarts every
/// sequence at `1`, so run one long-lived instance per counter table.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "autonumber-server",
    version,
    about = "An HTTP service for numbering new records (counters are kept in memory and reset on restart)"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// JSON file holding an array of entity schemas. Without it the server
    /// only exposes the counter endpoints.
    ///
    /// Environment variable: `SCHEMA_PATH`
    #[arg(long, env = "SCHEMA_PATH")]
    pub schema_path: Option<PathBuf>,

    /// Rounds of creation-race recovery before an allocation fails.
    ///
    /// Environment variable: `MAX_RETRIES`
    #[arg(long, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub schema_path: Option<PathBuf>,
    pub max_retries: u32,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_retries == 0 {
            bail!("MAX_RETRIES must be at least 1");
        }

        if let Some(path) = &args.schema_path {
            if !path.is_file() {
                bail!("SCHEMA_PATH ({}) is not a file", path.display());
            }
        }

        Ok(Self {
            server_addr: args.server_addr,
            schema_path: args.schema_path,
            max_retries: args.max_retries,
        })
    }
}

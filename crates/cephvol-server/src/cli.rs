//! Command-line interface.

use clap::{Parser, Subcommand};

use cephvol_kernel::plugin::{NameRequest, Request};

#[derive(Parser, Debug)]
#[command(name = "cephvol", about = "CephFS volume driver", version)]
pub struct Cli {
    /// Log at debug level (same as DEBUG=1)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use an in-memory cluster and record mounts instead of performing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Connect to the cluster and ensure the base namespace exists
    Check,
    /// Show driver capabilities
    Capabilities,
    /// List volumes in the base namespace
    Ls,
    /// Show one volume
    Inspect { name: String },
    /// Create a volume
    Create { name: String },
    /// Remove a volume
    Rm { name: String },
    /// Print a volume's mountpoint
    Path { name: String },
}

impl Commands {
    /// Plugin request for this command, if it maps to one.
    pub fn request(&self) -> Option<Request> {
        let request = match self {
            Commands::Check => return None,
            Commands::Capabilities => Request::Capabilities,
            Commands::Ls => Request::List,
            Commands::Inspect { name } => Request::Get(NameRequest::new(name)),
            Commands::Create { name } => Request::Create(NameRequest::new(name)),
            Commands::Rm { name } => Request::Remove(NameRequest::new(name)),
            Commands::Path { name } => Request::Path(NameRequest::new(name)),
        };
        Some(request)
    }
}

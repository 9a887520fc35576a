use clap::{Parser, Subcommand};

/// gatepass: single-use QR tickets, validated exactly once
#[derive(Parser)]
#[command(name = "gatepass", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to GATEPASS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Issue new tickets and print their URLs
    Issue {
        #[arg(short, long, default_value = "1")]
        count: usize,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long)]
        label: Option<String>,
    },

    /// Show total / used ticket counts
    Stats,

    /// Print every ticket, newest first
    Export {
        /// Emit CSV instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Resolve a token from the terminal
    Resolve {
        token: String,
        /// Consume the ticket as a validator would. Without this flag the
        /// public view is shown and nothing changes.
        #[arg(long)]
        validator: bool,
    },
}

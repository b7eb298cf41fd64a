// Sealbox — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, create, update, verify, list, show, delete, audit,
// serve.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Sealbox — owner-gated secret digest store.
#[derive(Parser, Debug)]
#[command(name = "sealbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Act as this identity (64 hex characters) instead of the invoking
    /// user. Intended for scripts and testing.
    #[arg(long, global = true, value_name = "HEX")]
    pub identity: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Sealbox: provision the master key and encrypted store.
    Init,

    /// Create a new secret record owned by the caller.
    Create {
        /// Human-readable label for the record.
        #[arg(long)]
        label: String,

        /// Plaintext secret. It is hashed locally and immediately
        /// discarded; only the digest is stored.
        #[arg(long, conflicts_with = "digest")]
        secret: Option<String>,

        /// Precomputed digest as 64 hex characters, for callers that hash
        /// out-of-process.
        #[arg(long)]
        digest: Option<String>,
    },

    /// Replace the digest of a record you own.
    Update {
        /// The UUID of the record.
        id: String,

        /// Plaintext secret, hashed locally.
        #[arg(long, conflicts_with = "digest")]
        secret: Option<String>,

        /// Precomputed digest as 64 hex characters.
        #[arg(long)]
        digest: Option<String>,
    },

    /// Check a plaintext candidate against a record you own.
    Verify {
        /// The UUID of the record.
        id: String,

        /// The candidate plaintext.
        #[arg(long)]
        secret: String,
    },

    /// List all records (metadata only, no digests).
    List,

    /// Show the metadata of one record.
    Show {
        /// The UUID of the record.
        id: String,
    },

    /// Delete a record you own.
    Delete {
        /// The UUID of the record.
        id: String,
    },

    /// View the audit log for a record.
    Audit {
        /// The UUID of the record.
        id: String,
    },

    /// Start the Unix-domain-socket gateway.
    Serve,
}

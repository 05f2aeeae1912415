use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mixa_publish_api::DEFAULT_API_BASE;
use mixa_publish_s3::{DEFAULT_BUCKET, DEFAULT_ENDPOINT, DEFAULT_REGION};

/// Command-line configuration for mixa-publish.
#[derive(Parser, Debug, Clone)]
#[command(name = "mixa-publish")]
#[command(about = "Publish a folder of markdown notes to a Mixa site")]
pub struct Config {
    /// Vault directory holding the notes
    #[arg(long, default_value = ".", env = "MIXA_VAULT", global = true)]
    pub vault: PathBuf,

    /// Secret token, overriding the one saved in the vault settings
    #[arg(long, env = "MIXA_SECRET_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the publishing service API
    #[arg(long, default_value = DEFAULT_API_BASE, env = "MIXA_API_BASE", global = true)]
    pub api_base: String,

    /// Bucket the site mirror lives in
    #[arg(long, default_value = DEFAULT_BUCKET, env = "MIXA_BUCKET", global = true)]
    pub bucket: String,

    /// S3 endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT, env = "MIXA_S3_ENDPOINT", global = true)]
    pub s3_endpoint: String,

    /// S3 region
    #[arg(long, default_value = DEFAULT_REGION, env = "MIXA_S3_REGION", global = true)]
    pub s3_region: String,

    /// Documents read concurrently while scanning for references
    #[arg(long, default_value = "16", global = true)]
    pub scan_concurrency: usize,

    /// Uploads and deletions in flight at once
    #[arg(long, default_value = "8", global = true)]
    pub apply_concurrency: usize,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Link the vault to the site a secret token belongs to
    Login {
        /// Secret token from the Mixa dashboard
        token: Option<String>,
    },

    /// Show or change what gets published
    Config {
        /// Folder to publish; an empty value publishes the whole vault
        #[arg(long)]
        site_folder: Option<String>,

        /// Also publish notes and images referenced from outside the site folder
        #[arg(long)]
        publish_external: Option<bool>,
    },

    /// Show what a publish would upload and delete, without changing anything
    Diff,

    /// Sync the site and trigger a rebuild
    Publish,

    /// Print the linked site's URLs
    Info,
}

use clap::{Parser, Subcommand};
use news_aggregator::Category;
use std::path::PathBuf;

/// News Pulse aggregation pipeline
#[derive(Parser)]
#[command(name = "news-aggregator")]
#[command(about = "Fetch, cache and enrich categorized news", long_about = None)]
pub struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one category and print its items as JSON
    Fetch {
        /// studio, hyderabad, telangana, india, international, sports or gallery
        category: Category,
    },
    /// Generate the article/summary/translation payload for an item
    Enhance {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Synthesize speech for a text
    Audio {
        #[arg(long)]
        text: String,
        /// Write the decoded audio here instead of printing base64
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add a curated gallery post to the shared store
    GalleryAdd {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        media_url: String,
    },
    /// Create the shared store tables
    InitDb,
}

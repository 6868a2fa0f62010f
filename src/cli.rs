use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shopgrab",
    version,
    about = "Extract normalized product data from e-commerce product pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Bypass the local cache and fetch fresh data
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Extra settle delay after page load in milliseconds (default: 2000)
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Run browser in headed mode for troubleshooting
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a product page in a browser and extract its data
    Extract {
        /// Full product page URL (e.g., https://www.aliexpress.com/item/100500123.html)
        url: String,

        /// Print the record as JSON instead of a text report
        #[arg(long)]
        json: bool,
    },

    /// Extract from a saved HTML file without launching a browser
    Parse {
        /// Path to a saved product page HTML file
        file: PathBuf,

        /// Original page URL, used for platform detection and id extraction
        #[arg(long)]
        url: Option<String>,

        /// Print the record as JSON instead of a text report
        #[arg(long)]
        json: bool,
    },
}

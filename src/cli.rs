use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory for config, caches and index artifacts
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan a trip from a free-text request
    Plan {
        /// e.g. "5 days in Tokyo in April with a $1500 budget"
        request: String,
    },

    /// Search indexed attractions for a destination
    Search {
        /// Interest query, e.g. "museums and history"
        query: String,

        /// Destination city to filter results to
        #[clap(short, long)]
        city: String,

        /// Number of results
        #[clap(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Rebuild the attraction index and wait for it to finish
    BuildIndex {},

    /// Fetch and print top attractions for a city
    Attractions {
        city: String,
    },

    /// Print current weather for a city
    Weather {
        city: String,
    },
}

use core::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nearsight_core::{ClientConfig, Protocol};

#[derive(Parser, Debug)]
#[command(name = "nearsight")]
#[command(about = "Near-text image search client", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the config file and environment.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    #[arg(long, global = true, help = "Config file [default: ~/.nearsight/config.toml]")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Search protocol (structured or rest)")]
    pub protocol: Option<Protocol>,

    #[arg(long, global = true, help = "Base URL of the vector search service")]
    pub search_url: Option<String>,

    #[arg(long, global = true, help = "Base URL of the asset gateway")]
    pub asset_url: Option<String>,

    #[arg(long, global = true, help = "Maximum number of matches per search")]
    pub limit: Option<NonZeroUsize>,
}

impl ConfigArgs {
    /// Writes every flag that was given into `config`.
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(protocol) = self.protocol {
            config.backend.protocol = protocol;
        }
        if let Some(url) = &self.search_url {
            config.backend.search_url.clone_from(url);
        }
        if let Some(url) = &self.asset_url {
            config.backend.asset_url.clone_from(url);
        }
        if let Some(limit) = self.limit {
            config.backend.limit = limit;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Search for images matching a text description")]
    Search {
        #[arg(required = true, num_args = 1.., help = "Text describing the image")]
        query: Vec<String>,
    },

    #[command(about = "Download the original asset for a match id")]
    Download {
        #[arg(help = "Asset id as printed by search")]
        id: String,

        #[arg(short, long, help = "Output directory [default: download.output_dir]")]
        out: Option<PathBuf>,
    },

    #[command(about = "Upload image files or directories and print the assigned ids")]
    Upload {
        #[arg(required = true, num_args = 1.., help = "Files, or directories whose files are all sent")]
        paths: Vec<PathBuf>,
    },

    #[command(about = "Search line by line; :download saves the top match, :quit exits")]
    Interactive,

    #[command(about = "Print the effective configuration, writing the default file if missing")]
    Config,
}

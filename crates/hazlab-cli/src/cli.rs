//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hazlab")]
#[command(about = "Query seismic hazard curves from a hazard store", version)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hazard store base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub store_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Serve Prometheus metrics on this address
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    pub metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a hazard model's metadata summary
    Meta {
        /// Hazard model identifier
        hazard_id: String,
    },

    /// Print one hazard curve
    Curve {
        /// Hazard model identifier
        hazard_id: String,
        /// Location code (`lat~lon`) or site id
        location: String,
        /// Intensity measure type, e.g. PGA
        imt: String,
        /// Realization index or aggregate label
        selector: String,
        /// Check location and IMT against the model metadata first
        #[arg(long)]
        validate: bool,
    },

    /// Print the shaking level at a probability of exceedance
    Poe {
        /// Hazard model identifier
        hazard_id: String,
        /// Location code (`lat~lon`) or site id
        location: String,
        /// Intensity measure type, e.g. PGA
        imt: String,
        /// Aggregate label, e.g. mean
        agg: String,
        /// Probability of exceedance over the investigation time
        #[arg(long)]
        poe: f64,
        /// Investigation time in years (defaults to the configured value)
        #[arg(long)]
        investigation_time: Option<f64>,
    },

    /// Local curve archive
    #[command(subcommand)]
    Archive(ArchiveCommand),
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommand {
    /// Fetch aggregate curves and write the archive file
    Download(ArchiveTarget),

    /// Print archived rows, downloading first if needed
    Query {
        #[command(flatten)]
        target: ArchiveTarget,
        /// Intensity measure types to keep
        #[arg(long, value_delimiter = ',', required = true)]
        imts: Vec<String>,
        /// Aggregate labels to keep
        #[arg(long, value_delimiter = ',', required = true)]
        aggs: Vec<String>,
        /// Download even if the archive file exists
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct ArchiveTarget {
    /// Hazard model identifier
    pub hazard_id: String,
    /// Site VS30 (defaults to the configured value)
    #[arg(long)]
    pub vs30: Option<u32>,
    /// Location codes or site ids
    #[arg(long, value_delimiter = ',', required = true)]
    pub locations: Vec<String>,
}

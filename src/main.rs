//! NDR Access CLI
//!
//! Look up wells and LAS files in the NDR register and pull BGS tops depth
//! models from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Column metadata of the file list
//! ndr-access columns "file id"
//!
//! # LAS files for one well
//! ndr-access las-by-key --key survid --value "15/9- 19"
//!
//! # Wells of quadrant 15
//! ndr-access las-by-quadrant 15
//!
//! # BGS tops
//! ndr-access wells
//! ndr-access tops "15/9- 19"
//!
//! # Identifier translation (no network)
//! ndr-access to-ndr 015/09-0019
//! ndr-access to-bgs "15/9- 19"
//! ```
//!
//! # Environment Variables
//!
//! - `NDR_CREDENTIALS`: path to a TOML credentials file
//! - `NDR_API_SITE_ID` etc.: individual credentials (see the config module)
//! - `RUST_LOG`: logging level (default: info)

use anyhow::Result;
use clap::Parser;
use ndr_access::{bgs_to_ndr, ndr_to_bgs};
use ndr_access::{BgsTopsScraper, ClientOptions, NdrClient, NdrCredentials};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ndr-access")]
#[command(about = "NDR well-register lookups and BGS tops extraction")]
#[command(version)]
struct CliArgs {
    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Proxy URL for register traffic (e.g. http://proxy.example:8080)
    #[arg(long)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Column metadata (name, displayName, description) of a register list
    Columns {
        /// Logical list key: "project id" or "file id"
        list: String,
    },

    /// LAS files matching a file-list column filter
    LasByKey {
        /// Filter column, e.g. survid
        #[arg(long, default_value = "survid")]
        key: String,
        /// Value the column must equal, e.g. "15/9- 19"
        #[arg(long)]
        value: String,
    },

    /// Wells of one quadrant, from the project list
    LasByQuadrant {
        /// Quadrant number, e.g. 15
        quadrant: String,
    },

    /// Labels of every well on the BGS tops index
    Wells,

    /// Tops depth model (meters) for one BGS well label
    Tops {
        /// Well label as it appears on the index page, e.g. "15/9- 19"
        well_id: String,
    },

    /// Convert a national (BGS) well id to the register form
    ToNdr { id: String },

    /// Convert a register well id to the national (BGS) form
    ToBgs { id: String },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let timeout = Duration::from_secs(args.timeout_secs);
    let options = ClientOptions {
        timeout,
        proxy: args.proxy.clone(),
        ..ClientOptions::default()
    };

    match args.command {
        Command::Columns { list } => {
            let mut client = connect(options)?;
            let columns = client.get_key_names(&list)?;
            println!("{:<28} {:<32} description", "name", "displayName");
            for column in columns {
                println!(
                    "{:<28} {:<32} {}",
                    column.name, column.display_name, column.description
                );
            }
        }
        Command::LasByKey { key, value } => {
            let mut client = connect(options)?;
            for (well, file) in client.get_las_by_key(&key, &value)? {
                println!("{well}  ->  {file}");
            }
        }
        Command::LasByQuadrant { quadrant } => {
            let mut client = connect(options)?;
            for (well, survid) in client.get_las_by_quadrant(&quadrant)? {
                println!("{well}  ->  {survid}");
            }
        }
        Command::Wells => {
            let mut scraper = BgsTopsScraper::with_timeout(timeout)?;
            for label in scraper.well_ids()? {
                println!("{label}");
            }
        }
        Command::Tops { well_id } => {
            let mut scraper = BgsTopsScraper::with_timeout(timeout)?;
            for depth in scraper.tops_for_well(&well_id)? {
                println!("{depth:.1}");
            }
        }
        Command::ToNdr { id } => println!("{}", bgs_to_ndr(&id)?),
        Command::ToBgs { id } => println!("{}", ndr_to_bgs(&id)?),
    }

    Ok(())
}

/// Load credentials and open an authenticated register client. Missing
/// credentials or a rejected token request end the process here.
fn connect(options: ClientOptions) -> Result<NdrClient> {
    let credentials = NdrCredentials::load()?;
    Ok(NdrClient::connect_with(credentials, options)?)
}

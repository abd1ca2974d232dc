//! Command-line surface for `oiltrack`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "oiltrack", version, about = "Oil delivery load-session ledger", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "OILTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Acting user id; entries are recorded as `anonymous` without one
    #[arg(long, env = "OILTRACK_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a new load session
    Load {
        #[arg(long)]
        oil_type: String,
        #[arg(long)]
        liters: f64,
        #[arg(long)]
        meter: Option<f64>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Record a supply; omit --session for a direct supply
    Supply {
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        oil_type: String,
        #[arg(long)]
        liters: f64,
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        start_meter: Option<f64>,
        #[arg(long)]
        end_meter: Option<f64>,
    },
    /// List load sessions
    Sessions {
        /// Only sessions with liters left
        #[arg(long, default_value_t = false)]
        active: bool,
    },
    /// Stored vs. ledger-derived balance of one session
    Balance { session: String },
    /// Repair every session balance that drifted from the ledger
    Reconcile,
    /// Write the combined CSV export
    ExportCsv {
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Zip the photos of a date range
    ExportPhotos {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Photo and transaction counts of a date range
    PhotoStats {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Delete records of one collection created in a date range
    Purge {
        /// users, deliveries, complaints, branches, oilTypes, tasks,
        /// loadSessions or transactions
        collection: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Delete stored photos of a date range
    PurgePhotos {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Record counts per collection
    Usage,
    /// Dashboard counters
    Summary,
    /// Liters supplied per oil type on one day (today by default)
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Oil type management
    OilTypes {
        #[command(subcommand)]
        action: OilTypeCmd,
    },
    /// Branch management
    Branches {
        #[command(subcommand)]
        action: BranchCmd,
    },
    /// Driver directory
    Drivers {
        #[command(subcommand)]
        action: DriverCmd,
    },
    /// Write the default config file
    InitConfig,
}

#[derive(Subcommand, Debug)]
pub enum OilTypeCmd {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        color: String,
    },
    /// Delete with every session, entry and delivery of this oil type
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum BranchCmd {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        contact: String,
    },
    /// Delete with every supply entry and delivery at this branch
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum DriverCmd {
    List,
    Add {
        email: String,
        #[arg(long)]
        uid: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        licence: Option<String>,
        #[arg(long)]
        tanker_licence: Option<String>,
    },
    Delete { uid: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_supply_has_no_session() {
        let cli = Cli::try_parse_from([
            "oiltrack", "supply", "--branch", "b1", "--oil-type", "diesel", "--liters", "75",
        ])
        .unwrap();
        match cli.command {
            Commands::Supply {
                session, liters, ..
            } => {
                assert!(session.is_none());
                assert_eq!(liters, 75.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_date_arguments_parse() {
        let cli = Cli::try_parse_from([
            "oiltrack", "purge", "tasks", "--start", "2024-03-01", "--end", "2024-03-31",
        ])
        .unwrap();
        match cli.command {
            Commands::Purge {
                collection,
                start,
                end,
            } => {
                assert_eq!(collection, "tasks");
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
                assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["oiltrack", "daily", "--date", "31/03/2024"]).is_err());
    }

    #[test]
    fn test_nested_subcommands() {
        let cli = Cli::try_parse_from(["oiltrack", "oil-types", "add", "Diesel"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::OilTypes {
                action: OilTypeCmd::Add { ref name, .. }
            } if name == "Diesel"
        ));
    }
}

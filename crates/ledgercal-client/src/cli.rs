//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ledgercal_core::{EventType, SyncType};

/// ledgercal - keep the company calendar and the remote calendar in step
#[derive(Debug, Parser)]
#[command(name = "ledgercal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "LEDGERCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the daemon socket
    #[arg(long, global = true, env = "LEDGERCAL_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long, global = true, env = "LEDGERCAL_DB")]
    pub database: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one reconciliation pass through the daemon
    Sync(SyncArgs),

    /// Show recent passes and 24h counts
    Status {
        /// Number of recent passes to show
        #[arg(long, short)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Start the daemon in the foreground
    Server,

    /// Manage local events
    Events {
        #[command(subcommand)]
        action: EventsAction,
    },

    /// Inspect and control generated anniversaries
    Anniversaries {
        #[command(subcommand)]
        action: AnniversariesAction,
    },

    /// Manage the company records anniversaries derive from
    Companies {
        #[command(subcommand)]
        action: CompaniesAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Remote calendar id (default: google.calendar_id)
    #[arg(long)]
    pub calendar: Option<String>,

    /// Pass type: all, or generated (anniversaries and overrides, push only)
    #[arg(long = "type", value_name = "TYPE")]
    pub sync_type: Option<SyncType>,

    /// Leave generated anniversaries out of this pass
    #[arg(long)]
    pub no_anniversaries: bool,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Day after the last day of the window (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum EventsAction {
    /// Add an event
    Add {
        title: String,

        /// Event day (YYYY-MM-DD)
        date: NaiveDate,

        #[arg(long = "type", value_name = "TYPE", default_value = "meeting")]
        event_type: EventType,

        #[arg(long)]
        description: Option<String>,

        /// Logical id of the generated anniversary this event replaces
        #[arg(long, value_name = "LOGICAL_ID")]
        overrides: Option<String>,
    },

    /// List events
    List {
        /// Only events on or after this day
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Only events before this day
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        #[arg(long = "type", value_name = "TYPE")]
        event_type: Option<EventType>,

        /// Include soft-deleted events
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Delete an event; synced events are removed remotely on the next pass
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum AnniversariesAction {
    /// Show the anniversaries a pass over the window would consider
    Preview {
        /// Calendar year to preview (default: the configured rolling window)
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        json: bool,
    },

    /// Stop an occurrence from ever being pushed (removes a pushed copy on the next full pass)
    Dismiss { logical_id: String },

    /// Undo a dismissal; the occurrence is pushed again on the next pass
    Restore { logical_id: String },
}

#[derive(Debug, Subcommand)]
pub enum CompaniesAction {
    /// Add a company
    Add {
        name: String,

        /// Registration day (YYYY-MM-DD)
        #[arg(long)]
        registered: Option<NaiveDate>,
    },

    /// List companies
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Dump,

    /// Show configuration, database and socket paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_flags() {
        let cli = Cli::parse_from([
            "ledgercal",
            "sync",
            "--type",
            "generated",
            "--no-anniversaries",
            "--from",
            "2025-01-01",
            "--to",
            "2026-01-01",
        ]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.sync_type, Some(SyncType::Generated));
        assert!(args.no_anniversaries);
        assert_eq!(args.from, NaiveDate::from_ymd_opt(2025, 1, 1));
    }

    #[test]
    fn half_window_is_rejected() {
        assert!(Cli::try_parse_from(["ledgercal", "sync", "--from", "2025-01-01"]).is_err());
    }

    #[test]
    fn event_type_parsing() {
        let cli = Cli::parse_from([
            "ledgercal", "events", "add", "INV-7", "2025-06-01", "--type", "invoice",
        ]);
        let Command::Events {
            action: EventsAction::Add { event_type, .. },
        } = cli.command
        else {
            panic!("expected events add");
        };
        assert_eq!(event_type, EventType::Invoice);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ledgercal", "status", "-vv", "--limit", "3"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Status { limit: Some(3), .. }));
    }
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "oda",
    version,
    about = "Snapshot, restore and neutralize Odoo databases and filestores",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $ODA_CONFIG                 (environment variable)
  3. ./oda.yaml                  (project)
  4. $XDG_CONFIG_HOME/oda/config.yaml or ~/.config/oda/config.yaml (user)
  5. /etc/oda/config.yaml        (system)

Running `oda` without a subcommand backs up and then trims to retention.keep."
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides ODA_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Archive the database, its filestore and the addon directories
    Backup {
        /// Skip the addon directory archives
        #[arg(long)]
        no_addons: bool,

        /// Trim old archives of this database afterwards (keeps retention.keep)
        #[arg(long)]
        trim: bool,
    },

    /// List archives in the backups directory
    List {
        /// Show archives of every database, not only the configured one
        #[arg(long)]
        any: bool,

        /// Only show archives whose database name contains this text
        #[arg(long, conflicts_with = "any")]
        filter: Option<String>,
    },

    /// Restore a database archive (and optionally an addon archive)
    Restore {
        /// Database archive file name; prompts when omitted
        archive: Option<String>,

        /// Addon archive file name to restore alongside ("none" to skip)
        #[arg(long)]
        addon: Option<String>,

        /// Offer archives of every database when prompting
        #[arg(long)]
        any: bool,

        /// Keep production identity: skip neutralization
        #[arg(long = "move", conflicts_with = "full")]
        move_data: bool,

        /// Full-strength neutralization, including the test-instance banner
        #[arg(long)]
        full: bool,

        /// Skip interactive confirmation (for scripting)
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete the oldest archives beyond the retention limit
    Trim {
        /// Archives kept per database (and per addon); defaults to retention.keep
        #[arg(long)]
        limit: Option<usize>,

        /// Trim every database in the backups directory, not only the configured one
        #[arg(long)]
        all: bool,

        /// Leave addon archives untouched
        #[arg(long)]
        no_addons: bool,

        /// Only show what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show the keep/delete decision for every archive
        #[arg(long)]
        list: bool,
    },

    /// Neutralize the configured database in place
    Neutralize {
        /// Full-strength neutralization, including the test-instance banner
        #[arg(long)]
        full: bool,

        /// Skip interactive confirmation (for scripting)
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate a starter configuration file
    Config {
        /// Destination path; prompts for a location when omitted
        dest: Option<String>,
    },
}

//! CLI Module
//!
//! Command-line interface for the Funzl song toolkit.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::song::BuzzerFilter;

/// Funzl - prepare and upload buzzer songs
#[derive(Parser, Debug)]
#[command(name = "funzl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (JSON)
    #[arg(short, long, global = true, default_value = "funzl.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a MIDI file and save it as a song document
    #[command(name = "import")]
    Import {
        /// MIDI file to import
        input: PathBuf,

        /// Song document to write
        #[arg(short, long)]
        output: PathBuf,

        /// Assign buzzers and repair overlaps after importing
        #[arg(long)]
        schedule: bool,
    },

    /// Print song statistics
    #[command(name = "info")]
    Info {
        /// Song document
        path: PathBuf,

        /// List notes on this buzzer (any, none, 1, 2, 3)
        #[arg(short, long)]
        buzzer: Option<BuzzerFilter>,
    },

    /// List notes that overlap on the same buzzer
    #[command(name = "conflicts")]
    Conflicts {
        /// Song document
        path: PathBuf,
    },

    /// Shorten notes so no two overlap on the same buzzer
    #[command(name = "fix-overlaps")]
    FixOverlaps {
        /// Song document, rewritten in place
        path: PathBuf,
    },

    /// Spread notes over the three buzzers
    #[command(name = "auto-assign")]
    AutoAssign {
        /// Song document, rewritten in place
        path: PathBuf,
    },

    /// Export the song as a firmware source table
    #[command(name = "export")]
    Export {
        /// Song document
        path: PathBuf,

        /// Header file to write (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload the song to the board
    #[command(name = "send")]
    Send {
        /// Song document
        path: PathBuf,

        /// Send only notes on this buzzer, in the text protocol
        #[arg(short, long)]
        buzzer: Option<BuzzerFilter>,

        /// Start time in microseconds for a partial upload
        #[arg(short, long)]
        start: Option<u64>,
    },

    /// Silence the board
    #[command(name = "stop")]
    Stop,
}

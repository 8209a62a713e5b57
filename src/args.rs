//! Command-line surface: subcommands, global flags, argument parsing.
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Extract, edit and repack the ARC/GMD script containers of a localized visual-novel release"
)]
pub struct Arg {
    /// Print the project's license text and exit, without requiring a
    /// subcommand.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub license: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recursively extract every `.arc` under `install_folder` into an
    /// editable directory tree under `destination_folder`.
    Extract {
        /// Directory containing the game's shipped `.arc` files.
        install_folder: String,
        /// Directory to write the editable tree into.
        destination_folder: String,
    },
    /// Inverse of `extract`: rebuild archives from an edited tree.
    Repack {
        /// Directory holding the edited tree produced by `extract`.
        edited_folder: String,
        /// Directory to write the rebuilt `.arc` files into.
        target_archive_folder: String,
    },
}

pub fn parse_args() -> Arg {
    Arg::parse()
}

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ds-cli")]
#[command(about = "DialogueScript interactive player")]
pub(crate) struct Cli {
    /// Directory scanned recursively for .ds/.txt script files.
    #[arg(long = "scripts-dir", default_value = "scripts")]
    pub(crate) scripts_dir: String,

    /// Node the session starts at.
    #[arg(long = "entry-node", default_value = "start")]
    pub(crate) entry_node: String,

    /// Language used for localization lookups.
    #[arg(long = "language")]
    pub(crate) language: Option<String>,

    /// JSON file script variables are loaded from and saved to.
    #[arg(long = "variables-file")]
    pub(crate) variables_file: Option<String>,

    /// Print the parsed node table as JSON before playing.
    #[arg(long = "dump-nodes")]
    pub(crate) dump_nodes: bool,
}

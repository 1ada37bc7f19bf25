use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hoard",
    about = "hoard: incremental, deduplicating snapshots",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory (default: $HOARD_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// More output; repeat for more (-v: directories, -vv: files)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only errors; no progress line
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init(InitArgs),
    /// Scan paths into the staging index
    Index(IndexArgs),
    /// Snapshot indexed paths into the repository
    Save(SaveArgs),
    /// List branches and the commits they point at
    ShowRef,
    /// List a tree (or a commit's root tree)
    LsTree(LsTreeArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Where to create the repository (default: --repo or $HOARD_DIR)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct IndexArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("output")
        .required(true)
        .multiple(true)
        .args(["tree", "commit", "name"])
))]
pub struct SaveArgs {
    /// Print the root tree id
    #[arg(short = 't', long)]
    pub tree: bool,

    /// Write a commit and print its id
    #[arg(short = 'c', long)]
    pub commit: bool,

    /// Advance branch NAME to the new commit
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Skip files of BYTES or more
    #[arg(long, value_name = "BYTES")]
    pub smaller: Option<u64>,

    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct LsTreeArgs {
    /// Branch name or object id
    pub target: String,
}

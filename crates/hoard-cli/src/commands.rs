use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use hoard_sdk::{command_message, NoProgress, Progress, Repository, SaveOptions};

use crate::cli::*;
use crate::progress::TermProgress;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        command,
        repo,
        quiet,
        ..
    } = cli;
    match command {
        Command::Init(args) => cmd_init(args.path.or(repo)),
        Command::Index(args) => cmd_index(repo, args, quiet),
        Command::Save(args) => cmd_save(repo, args, quiet),
        Command::ShowRef => cmd_show_ref(repo),
        Command::LsTree(args) => cmd_ls_tree(repo, args),
    }
}

fn open(repo: Option<PathBuf>) -> anyhow::Result<Repository> {
    Ok(Repository::open(Repository::locate(repo)?)?)
}

fn cmd_init(path: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let repo = Repository::init(Repository::locate(path)?)?;
    println!(
        "{} Initialized empty hoard repository in {}",
        "✓".green().bold(),
        repo.root().display().to_string().bold()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_index(
    repo: Option<PathBuf>,
    args: IndexArgs,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let repo = open(repo)?;
    let report = repo.update_index(&args.paths)?;
    if !quiet {
        println!(
            "Indexed {} paths: {} added, {} modified, {} deleted",
            report.scanned.to_string().bold(),
            report.added.to_string().green(),
            report.modified.to_string().yellow(),
            report.deleted.to_string().red()
        );
    }
    if report.errors > 0 {
        eprintln!(
            "{} {} paths could not be indexed.",
            "WARNING:".yellow().bold(),
            report.errors
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_save(
    repo: Option<PathBuf>,
    args: SaveArgs,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let repo = open(repo)?;
    let argv: Vec<String> = std::env::args().collect();
    let options = SaveOptions {
        name: args.name.clone(),
        commit: args.commit,
        smaller: args.smaller,
        message: Some(command_message(&argv)),
    };

    let mut term = TermProgress::new();
    let mut silent = NoProgress;
    let progress: &mut dyn Progress = if !quiet && std::io::stderr().is_terminal() {
        &mut term
    } else {
        &mut silent
    };
    let report = repo.save(&args.paths, &options, progress)?;

    if args.tree {
        println!("{}", report.tree.to_hex());
    }
    if args.commit {
        if let Some(commit) = report.commit {
            println!("{}", commit.to_hex());
        }
    }
    if !report.is_clean() {
        eprintln!(
            "{} {} errors encountered while saving.",
            "WARNING:".yellow().bold(),
            report.soft_errors.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_show_ref(repo: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let repo = open(repo)?;
    for (name, target) in repo.list_refs()? {
        println!("{} {}", target.to_hex().yellow(), name);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_ls_tree(repo: Option<PathBuf>, args: LsTreeArgs) -> anyhow::Result<ExitCode> {
    let repo = open(repo)?;
    let id = repo.resolve(&args.target)?;
    let tree = repo.read_tree(&id)?;
    for entry in &tree.entries {
        let kind = if entry.mode.is_tree() { "tree" } else { "blob" };
        println!(
            "{} {} {}\t{}",
            entry.mode,
            kind,
            entry.object_id.to_hex().dimmed(),
            entry.name
        );
    }
    Ok(ExitCode::SUCCESS)
}

use std::io;

use anyhow::Result;
use clap::Args;
use git_merge::{MergeOptions, OutcomeReporter, ResolveDriver};

use super::open_repo;
use crate::Cli;

/// The well-known empty-tree object id. Callers pass this in place of a real
/// commit-ish to mean "this side doesn't exist" (no base, no head, no
/// remote), the same sentinel `git merge-resolve`'s plumbing siblings use.
const EMPTY_TREE_SENTINEL: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Args)]
pub struct MergeResolveArgs {
    /// Common ancestor(s), head, and remote commit-ishes, `--`-separated as
    /// `<bases>... -- <head> <remote>`. Only the first base and exactly one
    /// head/remote pair are honored; extra bases are ignored.
    #[arg(value_name = "commit-ish", required = true, num_args = 1..)]
    args: Vec<String>,
}

pub fn run(args: &MergeResolveArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let mut reporter = OutcomeReporter::new(io::stdout(), io::stderr());

    let sep = match args.args.iter().position(|a| a == "--") {
        Some(idx) => idx,
        None => {
            eprintln!("usage: merge-resolve <bases>... -- <head> <remote>");
            return Ok(2);
        }
    };

    if sep == 0 {
        eprintln!("fatal: merge-resolve: no merge base found, refusing baseless merge");
        return Ok(2);
    }

    let (bases, rest) = (&args.args[..sep], &args.args[sep + 1..]);

    if rest.len() != 2 {
        eprintln!("usage: merge-resolve <bases>... -- <head> <remote>");
        return Ok(2);
    }

    let base = resolve_side(&repo, bases.first())?;
    let head = resolve_side(&repo, Some(&rest[0]))?;
    let remote = resolve_side(&repo, Some(&rest[1]))?;

    let mut options = MergeOptions::default();
    options.external_merge_program = repo.config().get_string("merge.tool")?;

    let code = ResolveDriver::run(&repo, base, head, remote, &options, &mut reporter)?;
    Ok(code)
}

fn resolve_side(repo: &git_repository::Repository, rev: Option<&String>) -> Result<Option<git_hash::ObjectId>> {
    match rev {
        None => Ok(None),
        Some(s) if s == EMPTY_TREE_SENTINEL => Ok(None),
        Some(s) => Ok(Some(git_revwalk::resolve_revision(repo, s)?)),
    }
}

use std::io;

use anyhow::Result;
use clap::Args;
use git_merge::{MergeOptions, OctopusDriver, OutcomeReporter};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct MergeOctopusArgs {
    /// Common ancestor(s), head, and two or more remote commit-ishes,
    /// `--`-separated as `<bases>... -- <head> <remote1> <remote2> [<remotes>...]`.
    #[arg(value_name = "commit-ish", required = true, num_args = 1..)]
    args: Vec<String>,
}

pub fn run(args: &MergeOctopusArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let mut reporter = OutcomeReporter::new(io::stdout(), io::stderr());

    let sep = match args.args.iter().position(|a| a == "--") {
        Some(idx) => idx,
        None => {
            eprintln!("usage: merge-octopus <bases>... -- <head> <remote1> <remote2> [<remotes>...]");
            return Ok(2);
        }
    };

    let (bases, rest) = (&args.args[..sep], &args.args[sep + 1..]);

    if rest.len() < 3 {
        eprintln!("usage: merge-octopus <bases>... -- <head> <remote1> <remote2> [<remotes>...]");
        return Ok(2);
    }

    let bases = bases
        .iter()
        .map(|rev| git_revwalk::resolve_revision(&repo, rev))
        .collect::<Result<Vec<_>, _>>()?;
    let head = git_revwalk::resolve_revision(&repo, &rest[0])?;
    let remotes = rest[1..]
        .iter()
        .map(|rev| git_revwalk::resolve_revision(&repo, rev))
        .collect::<Result<Vec<_>, _>>()?;

    let mut options = MergeOptions::default();
    options.external_merge_program = repo.config().get_string("merge.tool")?;

    let code = OctopusDriver::run(&repo, head, &bases, &remotes, &options, &mut reporter)?;
    Ok(code)
}

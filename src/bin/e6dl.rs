//! Checksum-indexed batch downloader over the site's search API.
//!
//! Each `-q QUERY -d DEST` pair is reconciled independently; a failing
//! pair is logged and the run moves on to the next one.

use std::path::PathBuf;
use std::process::ExitCode;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use dote6::reconcile::{Backoff, Options, Reconciler};
use dote6::store::ContentIndex;
use dote6::Client;

const USAGE: &str = "\
usage: e6dl -q QUERY -d DEST [-q QUERY2 -d DEST2 ...] [options]

  -q, --query    A search query. Must be surrounded by quotes if spaces
                 exist. Repeatable; must be paired with a destination.
  -d, --dest     Destination directory for the preceding query.
      --noverify Do not verify settings before downloading.
      --nolog    Do not save a log file for this session.
      --enumerate
                 Prepend a number to downloaded files.
      --storemeta
                 Save downloaded posts' metadata in a subfolder.
      --nocheck  Do not check if extra folder images exist on the site.
      --onlynew  Stop downloading once an image that already exists is
                 found.
      --copyextras
                 Copy existing files not found in search to
                 subdirectories.";

#[derive(Debug)]
struct Args {
    pairs: Vec<(String, String)>,
    verify: bool,
    log_to_file: bool,
    enumerate: bool,
    store_meta: bool,
    check_extra: bool,
    new_only: bool,
    copy_extras: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut queries = Vec::new();
    let mut dests = Vec::new();
    let mut parsed = Args {
        pairs: Vec::new(),
        verify: true,
        log_to_file: true,
        enumerate: false,
        store_meta: false,
        check_extra: true,
        new_only: false,
        copy_extras: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-q" | "--query" => match args.next() {
                Some(query) => queries.push(query),
                None => return Err(String::from("missing value for --query")),
            },
            "-d" | "--dest" => match args.next() {
                Some(dest) => dests.push(dest),
                None => return Err(String::from("missing value for --dest")),
            },
            "--noverify" => parsed.verify = false,
            "--nolog" => parsed.log_to_file = false,
            "--enumerate" => parsed.enumerate = true,
            "--storemeta" => parsed.store_meta = true,
            "--nocheck" => parsed.check_extra = false,
            "--onlynew" => parsed.new_only = true,
            "--copyextras" => parsed.copy_extras = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    if queries.is_empty() {
        return Err(String::from("at least one -q/-d pair is required"));
    }
    if queries.len() != dests.len() {
        return Err(String::from(
            "you must specify the same number of queries and destination directories",
        ));
    }
    parsed.pairs = queries.into_iter().zip(dests).collect();
    Ok(parsed)
}

fn confirm_pair(query: &str, dest: &str) -> bool {
    println!("\nDownloading ALL images containing search term(s): {query}");
    println!("Downloading to folder: {dest}");
    dialoguer::Confirm::new()
        .with_prompt("Is this correct?")
        .default(true)
        .interact()
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> ExitCode {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .ok();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("e6dl: {message}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let client = Client::new();
    let mut total = 0usize;

    for (query, dest) in &args.pairs {
        let dest = if dest.is_empty() { "." } else { dest.as_str() };
        if args.verify && !confirm_pair(query, dest) {
            println!("Skipped.");
            continue;
        }
        let dest = PathBuf::from(dest);

        let options = Options {
            enumerate: args.enumerate,
            stop_on_existing: args.new_only,
            verify_extras: args.check_extra,
            copy_extras: args.copy_extras,
            write_metadata: args.store_meta,
            log_to_file: args.log_to_file,
            ..Options::default()
        };
        let mut reconciler = Reconciler::new(&client, &dest, options);
        if !args.verify {
            // unattended run, no operator to confirm overload retries
            reconciler = reconciler.with_policy(Box::new(Backoff::default()));
        }

        let mut index = match ContentIndex::load(&dest) {
            Ok(index) => index,
            Err(err) => {
                log::error!("cannot index {}: {err}", dest.display());
                continue;
            }
        };
        match reconciler.run(query, &mut index).await {
            Ok(report) => total += report.downloaded(),
            Err(err) => log::error!("query \"{query}\" failed: {err}"),
        }
    }

    println!("Total images downloaded: {total}");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::parse_args;

    fn strings(args: &[&str]) -> impl Iterator<Item = String> {
        args.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn pairs_are_zipped_in_order() {
        let args = parse_args(strings(&[
            "-q", "blotch", "-d", "art", "-q", "pool:3484", "-d", "pools", "--onlynew",
        ]))
        .unwrap();
        assert_eq!(
            args.pairs,
            vec![
                (String::from("blotch"), String::from("art")),
                (String::from("pool:3484"), String::from("pools")),
            ]
        );
        assert!(args.new_only);
        assert!(args.verify);
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        assert!(parse_args(strings(&["-q", "blotch"])).is_err());
        assert!(parse_args(strings(&["-q", "a", "-d", "x", "-q", "b"])).is_err());
        assert!(parse_args(strings(&["--noverify"])).is_err());
        assert!(parse_args(strings(&["-x"])).is_err());
    }
}

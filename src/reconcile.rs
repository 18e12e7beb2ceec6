//! Reconciliation of a local download directory against a remote search.
//!
//! One [`Reconciler::run`] makes a single pass: it walks the remote result
//! stream page by page, classifying every post against the directory's
//! [`ContentIndex`] (already present, renamed, downloaded, failed), then
//! checks every indexed file the search never mentioned against the site
//! (extra-on-site / not-found-on-site). Per-item failures are recorded in
//! the [`Report`] and never abort the run; the index is saved once, at the
//! end, only if something was downloaded.

use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    client::Client,
    error::Error,
    listing::Listing,
    models::{bind_template, pool::Pool, post, post::Post},
    result::Result,
    store::{self, ContentIndex},
};

/// Name of the per-directory run log.
pub const LOG_FILE: &str = "download-log.txt";

/// Subdirectory extras are copied into when they exist on the site.
const EXTRA_ONSITE_DIR: &str = "!extra/onsite";

/// Subdirectory extras are copied into when the site does not know them.
const EXTRA_NOTFOUND_DIR: &str = "!extra/notfound";

/// How one item of a reconciliation run was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The file was fetched from the site and stored.
    Downloaded,
    /// The content was already present under another name and was renamed.
    Renamed,
    /// The content was already present under the expected name.
    AlreadyPresent,
    /// The item could not be downloaded, renamed, or checked.
    Failed,
    /// A local file the search never yielded, but the site knows.
    ExtraOnSite,
    /// A local file neither the search nor the site knows.
    NotFoundOnSite,
}

/// One entry of a [`Report`].
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Local filename the outcome applies to.
    pub file: String,
    /// ID of the remote post involved, when one was.
    pub post_id: Option<u64>,
    /// How the item was resolved.
    pub outcome: Outcome,
}

/// The ordered per-item outcomes and aggregate counts of one run.
#[derive(Debug, Default)]
pub struct Report {
    items: Vec<ItemOutcome>,
    total_seen: usize,
    stopped_early: bool,
}

impl Report {
    fn record(&mut self, file: String, post_id: Option<u64>, outcome: Outcome) {
        self.items.push(ItemOutcome {
            file,
            post_id,
            outcome,
        });
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome == outcome)
            .count()
    }

    /// Returns the per-item outcomes in scan order.
    pub fn items(&self) -> &[ItemOutcome] {
        &self.items
    }

    /// Number of remote posts the scan saw before it ended.
    pub fn total_seen(&self) -> usize {
        self.total_seen
    }

    /// Whether the scan halted on the first already-present file.
    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    /// Number of files downloaded.
    pub fn downloaded(&self) -> usize {
        self.count(Outcome::Downloaded)
    }

    /// Number of files renamed to their expected name.
    pub fn renamed(&self) -> usize {
        self.count(Outcome::Renamed)
    }

    /// Number of files already present under their expected name.
    pub fn already_present(&self) -> usize {
        self.count(Outcome::AlreadyPresent)
    }

    /// Number of items that failed.
    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    /// Number of local files the site knows but the search excluded.
    pub fn extra_on_site(&self) -> usize {
        self.count(Outcome::ExtraOnSite)
    }

    /// Number of local files the site does not know.
    pub fn not_found_on_site(&self) -> usize {
        self.count(Outcome::NotFoundOnSite)
    }
}

/// Decides whether an operation interrupted by [`Error::SiteOverloaded`]
/// should be retried, and performs the wait.
///
/// `attempt` counts the retries already consumed for the current
/// operation, starting at 1 for the first decision.
#[async_trait]
pub trait OverloadPolicy: Send + Sync {
    /// Waits, then returns whether the identical operation should be
    /// retried.
    async fn wait_for_retry(&self, attempt: u32) -> bool;
}

/// Blocks on operator confirmation before every retry.
///
/// This is deliberate manual backpressure for attended runs; unattended
/// runs want [`Backoff`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOperator;

#[async_trait]
impl OverloadPolicy for PromptOperator {
    async fn wait_for_retry(&self, _attempt: u32) -> bool {
        let prompt = tokio::task::spawn_blocking(|| {
            dialoguer::Confirm::new()
                .with_prompt("The site is under heavy load. Wait a bit, then press enter to retry")
                .default(true)
                .interact()
                .unwrap_or(false)
        });
        prompt.await.unwrap_or(false)
    }
}

/// Sleeps with a linearly growing delay, giving up after `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Delay before the first retry; later retries wait multiples of it.
    pub delay: Duration,
    /// Number of retries granted per operation.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

#[async_trait]
impl OverloadPolicy for Backoff {
    async fn wait_for_retry(&self, attempt: u32) -> bool {
        if attempt > self.max_attempts {
            return false;
        }
        tokio::time::sleep(self.delay * attempt).await;
        true
    }
}

/// Per-run behaviour switches for the reconciler.
#[derive(Debug, Clone)]
pub struct Options {
    /// Filename template bound against each post's fields.
    pub name_template: String,
    /// Buffer the whole result set and prepend a descending ordinal to
    /// each filename.
    pub enumerate: bool,
    /// Halt the scan at the first file that is already present.
    pub stop_on_existing: bool,
    /// Check indexed files the search never yielded against the site.
    pub verify_extras: bool,
    /// Copy extra files into the `!extra` subdirectories.
    pub copy_extras: bool,
    /// Write a metadata sidecar for every scanned post.
    pub write_metadata: bool,
    /// Keep a `download-log.txt` in the destination directory.
    pub log_to_file: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            name_template: String::from("{md5}.{file_ext}"),
            enumerate: false,
            stop_on_existing: false,
            verify_extras: true,
            copy_extras: false,
            write_metadata: false,
            log_to_file: true,
        }
    }
}

/// Append-only run log in the destination directory, mirrored through the
/// `log` facade. Log-file write failures are swallowed; the log is
/// best-effort by contract.
struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    fn create(dir: &Path, enabled: bool) -> Result<Self> {
        if !enabled {
            return Ok(RunLog { path: None });
        }
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE);
        fs::write(
            &path,
            format!(
                "Run started {}\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
        )?;
        Ok(RunLog { path: Some(path) })
    }

    fn append(&self, message: &str) {
        if let Some(path) = &self.path {
            if let Ok(mut file) = fs::OpenOptions::new().append(true).open(path) {
                let _ = writeln!(file, "{message}");
            }
        }
    }

    /// Records an event in the file only.
    fn write(&self, message: &str) {
        log::debug!("{}", message.trim_start());
        self.append(message);
    }

    /// Records an event in the file and announces it to the operator.
    fn echo(&self, message: &str) {
        log::info!("{}", message.trim_start());
        self.append(message);
    }
}

/// Either the live remote stream or the buffered form used by enumeration.
enum Feed<'c> {
    Live(Listing<'c, Post>),
    Buffered(std::vec::IntoIter<Post>),
}

impl Feed<'_> {
    async fn next(&mut self) -> Result<Option<Post>> {
        match self {
            Feed::Live(listing) => listing.next().await,
            Feed::Buffered(posts) => Ok(posts.next()),
        }
    }
}

/// Drives one reconciliation run for a destination directory.
pub struct Reconciler<'c> {
    client: &'c Client,
    dest: PathBuf,
    options: Options,
    policy: Box<dyn OverloadPolicy>,
}

impl<'c> Reconciler<'c> {
    /// Constructs a reconciler for `dest` with the interactive overload
    /// policy.
    pub fn new(client: &'c Client, dest: &Path, options: Options) -> Self {
        Reconciler {
            client,
            dest: dest.to_path_buf(),
            options,
            policy: Box::new(PromptOperator),
        }
    }

    /// Replaces the overload policy, e.g. with [`Backoff`] for unattended
    /// runs.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn OverloadPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the reconciliation for `query` against `index`.
    ///
    /// `pool:<id>` queries walk the pool's posts instead of a tag search.
    /// The index must belong to the destination directory and is owned by
    /// this run for its duration.
    ///
    /// # Errors
    ///
    /// Setup failures (log creation, pool resolution) and page-fetch
    /// failures of the primary stream abort the run, except that an
    /// overloaded site consults the overload policy and retries the same
    /// page; per-item download, rename and metadata failures are recorded
    /// in the report instead.
    pub async fn run(&self, query: &str, index: &mut ContentIndex) -> Result<Report> {
        let run_log = RunLog::create(&self.dest, self.options.log_to_file)?;
        run_log.echo(&format!(
            "Downloading images containing search term(s): {query}"
        ));
        run_log.echo(&format!("Downloading to folder: {}", self.dest.display()));
        run_log.echo("Running search...");

        let pool_ident = pool_query(query);
        let is_pool = pool_ident.is_some();
        let listing = match pool_ident {
            Some(ident) => {
                let id: u64 = ident.trim().parse().map_err(|_| Error::NotFound {
                    kind: "pool",
                    ident: ident.to_string(),
                })?;
                let pool = Pool::new(self.client, id).await?;
                pool.posts(self.client)?
            }
            None => post::search(self.client, query, 0),
        };

        let mut report = Report::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut downloaded = 0usize;

        let (mut feed, total) = if self.options.enumerate {
            let mut posts = listing.collect().await?;
            if is_pool {
                posts.reverse();
            }
            run_log.echo(&format!(
                "{} images found. Downloading images...",
                posts.len()
            ));
            let total = posts.len();
            (Feed::Buffered(posts.into_iter()), total)
        } else {
            run_log.echo("Downloading images...");
            (Feed::Live(listing), 0)
        };
        let width = total.to_string().len();
        let mut ordinal = total;
        let mut page_attempts = 0u32;

        loop {
            // a failed fetch leaves the page cursor in place, so retrying
            // the feed re-requests the identical page
            let item = match feed.next().await {
                Ok(item) => {
                    page_attempts = 0;
                    item
                }
                Err(Error::SiteOverloaded) => {
                    run_log.echo("Error fetching results: the site is under heavy load");
                    page_attempts += 1;
                    if self.policy.wait_for_retry(page_attempts).await {
                        continue;
                    }
                    return Err(Error::SiteOverloaded);
                }
                Err(err) => return Err(err),
            };
            let item = match item {
                Some(item) => item,
                None => break,
            };
            report.total_seen += 1;
            let post_id = item.id();
            run_log.write(&format!(
                "Post {}",
                post_id.map_or_else(|| String::from("?"), |id| id.to_string())
            ));

            let (md5, file_ext) = match (item.md5(), item.file_ext()) {
                (Some(md5), Some(ext)) => (md5.to_string(), ext.to_string()),
                _ => {
                    run_log.echo("\tPost carries no checksum or extension, skipping.");
                    report.record(String::from("(unnamed)"), post_id, Outcome::Failed);
                    continue;
                }
            };

            let mut save_name = bind_template(&self.options.name_template, &item.field_map());
            let suffix = format!(".{file_ext}");
            if !save_name.ends_with(&suffix) {
                save_name.push_str(&suffix);
            }
            if self.options.enumerate {
                save_name = format!("{ordinal:0width$} - {save_name}");
                ordinal = ordinal.saturating_sub(1);
            }

            seen.insert(md5.clone());
            let existing = index.get(&md5).map(ToString::to_string);
            match existing {
                Some(existing) if existing != save_name => {
                    run_log.echo(&format!("\tRenaming file {existing} to {save_name}"));
                    match fs::rename(self.dest.join(&existing), self.dest.join(&save_name)) {
                        Ok(()) => {
                            index.insert(md5.clone(), save_name.clone());
                            report.record(save_name.clone(), post_id, Outcome::Renamed);
                        }
                        Err(err) => {
                            run_log.echo(&format!("\tError renaming file: {err}"));
                            report.record(existing, post_id, Outcome::Failed);
                        }
                    }
                }
                Some(_) => {
                    run_log.write(&format!("\tFile {save_name} already exists."));
                    report.record(save_name.clone(), post_id, Outcome::AlreadyPresent);
                    if self.options.stop_on_existing {
                        run_log.write("Ending download...");
                        report.stopped_early = true;
                        break;
                    }
                }
                None => {
                    if self
                        .download_with_retries(&item, &save_name, &run_log)
                        .await
                    {
                        downloaded += 1;
                        index.insert(md5.clone(), save_name.clone());
                        report.record(save_name.clone(), post_id, Outcome::Downloaded);
                    } else {
                        report.record(save_name.clone(), post_id, Outcome::Failed);
                    }
                }
            }

            if self.options.write_metadata {
                match store::write_metadata(&self.dest, &item, None) {
                    Ok(()) => run_log.write(&format!("\tWrote/Updated metadata: {md5}")),
                    Err(err) => run_log.echo(&format!("\tError writing metadata: {err}")),
                }
            }
        }

        if self.options.verify_extras && !report.stopped_early {
            self.scan_extras(index, &seen, &mut report, &run_log).await;
        }

        if downloaded > 0 {
            index.save()?;
        }

        run_log.echo(&format!(
            "Successfully downloaded {downloaded} of {} images",
            report.total_seen
        ));
        let extras = report.extra_on_site() + report.not_found_on_site();
        if extras > 0 {
            run_log.echo(&format!(
                "{extras} files found in folder but not in requested search."
            ));
            if self.options.copy_extras {
                run_log.echo("Copied to /!extra.");
            }
        }
        if report.failed() > 0 {
            run_log.echo(&format!("{} items failed.", report.failed()));
        }
        run_log.echo("Done.");
        Ok(report)
    }

    /// Downloads one post, consulting the overload policy between
    /// attempts. Returns whether the file ended up on disk.
    async fn download_with_retries(&self, item: &Post, save_name: &str, run_log: &RunLog) -> bool {
        let mut attempt = 0u32;
        loop {
            run_log.echo(&format!("\tDownloading: {save_name}"));
            match item.download(self.client, &self.dest, save_name).await {
                Ok(()) => return true,
                Err(Error::SiteOverloaded) => {
                    run_log.echo("\tError downloading post: the site is under heavy load");
                    attempt += 1;
                    if self.policy.wait_for_retry(attempt).await {
                        continue;
                    }
                    return false;
                }
                Err(err) => {
                    run_log.echo(&format!("\tError, unable to download post: {err}"));
                    return false;
                }
            }
        }
    }

    /// Classifies every indexed file the scan never saw by asking the site
    /// for its checksum.
    async fn scan_extras(
        &self,
        index: &ContentIndex,
        seen: &HashSet<String>,
        report: &mut Report,
        run_log: &RunLog,
    ) {
        run_log.echo("Searching for extra images...");
        let leftovers: Vec<(String, String)> = index
            .iter()
            .filter(|(checksum, _)| !seen.contains(*checksum))
            .map(|(checksum, name)| (checksum.to_string(), name.to_string()))
            .collect();

        for (checksum, name) in leftovers {
            let mut lookup = post::search(self.client, &format!("md5:{checksum}"), 1);
            match lookup.next().await {
                Ok(Some(found)) => {
                    run_log.echo(&format!(
                        "File {name} found in folder and on site, but not in requested search."
                    ));
                    report.record(name.clone(), found.id(), Outcome::ExtraOnSite);
                    let comments = found.comments(self.client).await.ok();
                    if let Err(err) = store::write_metadata(&self.dest, &found, comments.as_deref())
                    {
                        log::debug!("metadata for extra {name} not written: {err}");
                    }
                    if self.options.copy_extras {
                        self.copy_extra(&name, EXTRA_ONSITE_DIR, run_log);
                    }
                }
                Ok(None) => {
                    run_log.echo(&format!("File {name} found in folder, but not on site."));
                    report.record(name.clone(), None, Outcome::NotFoundOnSite);
                    if self.options.copy_extras {
                        self.copy_extra(&name, EXTRA_NOTFOUND_DIR, run_log);
                    }
                }
                Err(err) => {
                    run_log.echo(&format!("Error checking file {name} against site: {err}"));
                    report.record(name, None, Outcome::Failed);
                }
            }
        }
    }

    fn copy_extra(&self, name: &str, subdir: &str, run_log: &RunLog) {
        if let Err(err) = store::copy_into(&self.dest.join(name), &self.dest.join(subdir)) {
            run_log.echo(&format!("Error copying {name} to {subdir}: {err}"));
        }
    }
}

/// Returns the pool identifier when the query takes the `pool:<id>` form.
fn pool_query(query: &str) -> Option<&str> {
    let mut parts = query.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(head), Some(ident)) if head.eq_ignore_ascii_case("pool") => Some(ident),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::pool_query;

    #[test]
    fn pool_queries_are_detected() {
        assert_eq!(pool_query("pool:3484"), Some("3484"));
        assert_eq!(pool_query("Pool:12"), Some("12"));
        assert_eq!(pool_query("rating:safe blotch"), None);
        assert_eq!(pool_query("pool"), None);
    }
}

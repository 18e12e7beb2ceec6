#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::must_use_candidate)]
//! # dote6
//!
//! dote6 is a convenient wrapper library around the e621 imageboard's JSON
//! API, plus the checksum-indexed download reconciler behind the `e6dl`
//! tool.
//!
//! This library can fetch:
//! - [`Post`]s, [`Comment`]s, [`Pool`]s, [`Tag`]s, [`User`]s
//! - forum [`Thread`]s, [`News`], [`Ticket`]s and [`Takedown`]s
//!
//! While respecting:
//! - A single process-wide one-request-per-second rate limit, shared by
//!   every GET and POST.
//! - Lazy pagination: listing endpoints are walked one page per pull, and
//!   abandoning a listing stops all further requests.
//!
//! ## Example: printing the uploaders from a search.
//!
//! ```no_run
//! use dote6::post;
//! use dote6::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Client::new();
//!
//!     // fetch up to ten matching posts, one page at a time
//!     let mut results = post::search(&client, "blotch rating:safe", 10);
//!     while let Some(post) = results.next().await? {
//!         println!("#{} by {}", post.id().unwrap_or(0), post.author().unwrap_or("?"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`Post`]:    crate::post::Post
//! [`Comment`]: crate::comment::Comment
//! [`Pool`]:    crate::pool::Pool
//! [`Tag`]:     crate::tag::Tag
//! [`User`]:    crate::user::User
//! [`Thread`]:  crate::forum::Thread
//! [`News`]:    crate::news::News
//! [`Ticket`]:  crate::ticket::Ticket
//! [`Takedown`]: crate::takedown::Takedown

/// Client module contains [`Client`] for requesting and posting data.
pub mod client;

/// Contains [`Error`]s that can be thrown by the library.
///
/// [`Error`]: crate::error::Error
pub mod error;

/// Lazy pagination over the site's listing endpoints.
pub mod listing;

/// Reconciliation of a local download directory against a remote search.
pub mod reconcile;

/// The local checksum index and metadata sidecars.
pub mod store;

pub(crate) mod models;

pub(crate) mod result;

pub use client::Client;
pub use models::*;

use reqwest::StatusCode;
use thiserror::Error;

/// The error type returned by every fallible operation in the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport layer failed before a response body could be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status code the API never uses.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(StatusCode),

    /// The response body could not be decoded as JSON.
    #[error("response from {url} is not JSON-decodable")]
    MalformedResponse {
        /// The URL the undecodable body came from.
        url: String,
    },

    /// The site reports being under heavy load.
    ///
    /// The failed call may be retried as-is once the load subsides; the
    /// library never retries on its own.
    #[error("the site is under heavy load")]
    SiteOverloaded,

    /// An identifier lookup yielded zero results.
    ///
    /// This is distinct from an empty listing: the entity named by the
    /// identifier does not exist.
    #[error("no {kind} matching `{ident}` could be found")]
    NotFound {
        /// The entity kind that was looked up.
        kind: &'static str,
        /// The identifier that failed to resolve.
        ident: String,
    },

    /// The login request was rejected or returned an incomplete reply.
    #[error("login failed: {0}")]
    Login(String),

    /// The attempted operation requires stored credentials.
    ///
    /// Raised before any network call is made; log in first with
    /// [`login`](crate::user::login).
    #[error("operation requires stored credentials")]
    Unauthorized,

    /// A local file could not be read, written, or renamed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The shared rate limiter shut down.
    #[error("{0}")]
    RateLimiter(#[from] tokio::sync::AcquireError),
}

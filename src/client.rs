use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use crate::{error::Error, result::Result};
use reqwest::{
    header::{CONTENT_TYPE, USER_AGENT},
    Client as ReqwestClient, StatusCode,
};
use serde::de::DeserializeOwned;
use tokio::{
    sync::{Semaphore, SemaphorePermit},
    task::JoinHandle,
    time::interval,
};

/// Production endpoint all requests are made against.
const BASE_URL: &str = "https://e621.net";

/// User agent sent with every request, as the site requires.
const AGENT: &str = "Dote6Client/1.0";

/// Marker text the site serves in place of JSON when it is overloaded.
const OVERLOAD_MARKER: &str = "heavy load";

/// A client for requesting data from and posting data to the site.
///
/// The client owns the process-wide request throttle: every GET and POST
/// issued through it, no matter which entity module asked, waits until the
/// minimum inter-call interval has elapsed since the previous call.
#[derive(Debug)]
pub struct Client {
    http: ReqwestClient,
    limiter: RateLimit,
    base_url: String,
    credentials: RwLock<Option<Credentials>>,
}

#[derive(Debug)]
pub(crate) struct RateLimit {
    pub(crate) permit: Arc<Semaphore>,
    pub(crate) replenisher: JoinHandle<()>,
}

impl RateLimit {
    pub async fn acquire(&self) -> Result<SemaphorePermit> {
        self.permit.acquire().await.map_err(Into::into)
    }
}

/// Stored login credentials, sent with authenticated form posts.
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub(crate) name: String,
    pub(crate) password_hash: String,
}

impl Client {
    /// Constructs a client against the live site, throttled to one request
    /// per second.
    pub fn new() -> Client {
        Self::custom(BASE_URL, Duration::from_secs(1))
    }

    /// Constructs a client against an arbitrary base URL with an explicit
    /// throttle interval.
    ///
    /// Intended for tests and self-hosted deployments; [`Client::new`] is
    /// the right constructor for the live site.
    pub fn custom(base_url: &str, min_interval: Duration) -> Client {
        let http = ReqwestClient::new();

        let permit = Arc::new(Semaphore::new(0));
        let clone = permit.clone();

        let replenisher = tokio::spawn(async move {
            let mut interval = interval(min_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if clone.available_permits() == 0 {
                    clone.add_permits(1);
                }
            }
        });

        let limiter = RateLimit {
            permit,
            replenisher,
        };

        Client {
            http,
            limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: RwLock::new(None),
        }
    }

    /// Joins an endpoint path (with its query string) onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Whether login credentials are currently stored on this client.
    pub fn is_authenticated(&self) -> bool {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the stored credentials, or [`Error::Unauthorized`] without
    /// touching the network.
    pub(crate) fn require_login(&self) -> Result<Credentials> {
        self.credentials().ok_or(Error::Unauthorized)
    }

    pub(crate) fn store_credentials(&self, name: String, password_hash: String) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Credentials {
            name,
            password_hash,
        });
    }

    pub(crate) fn clear_credentials(&self) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Fetches `url` and decodes the response body as JSON.
    ///
    /// A `503` status or a body that fails to decode while carrying the
    /// site's overload notice maps to [`Error::SiteOverloaded`]; any other
    /// undecodable body maps to [`Error::MalformedResponse`].
    pub(crate) async fn fetch_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let permit = self.limiter.acquire().await?;
        log::info!("request for {url} dispatched");
        let response = self.http.get(url).header(USER_AGENT, AGENT).send().await?;

        // reduce the permit count
        permit.forget();

        log::debug!("response status: {}", response.status());
        let body = Self::status_checked(response)?.text().await?;
        decode(&body, url)
    }

    /// Posts a form-encoded body to `url` and decodes the reply as JSON.
    ///
    /// Shares the throttle and decode path with [`Client::fetch_json`].
    pub(crate) async fn post_form<T>(&self, url: &str, form: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let permit = self.limiter.acquire().await?;
        log::info!("form post to {url} dispatched");
        let response = self
            .http
            .post(url)
            .header(USER_AGENT, AGENT)
            .form(form)
            .send()
            .await?;

        permit.forget();

        log::debug!("response status: {}", response.status());
        let body = Self::status_checked(response)?.text().await?;
        decode(&body, url)
    }

    /// Fetches `url` raw, returning the body bytes and the `Content-Type`
    /// header. Used for file downloads; shares the request throttle.
    pub(crate) async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let permit = self.limiter.acquire().await?;
        log::info!("request for {url} dispatched");
        let response = self.http.get(url).header(USER_AGENT, AGENT).send().await?;

        permit.forget();

        let response = Self::status_checked(response)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|x| x.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok((bytes, content_type))
    }

    fn status_checked(response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::SERVICE_UNAVAILABLE => Err(Error::SiteOverloaded),
            code => Err(Error::UnexpectedStatus(code)),
        }
    }
}

fn decode<T>(body: &str, url: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    match serde_json::from_str(body) {
        Ok(decoded) => Ok(decoded),
        Err(_) if body.to_ascii_lowercase().contains(OVERLOAD_MARKER) => {
            Err(Error::SiteOverloaded)
        }
        Err(_) => Err(Error::MalformedResponse {
            url: url.to_string(),
        }),
    }
}

impl Drop for RateLimit {
    fn drop(&mut self) {
        self.replenisher.abort();
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

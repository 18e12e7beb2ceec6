//! Lazy, pull-based pagination over the site's listing endpoints.
//!
//! [`PageStream`] walks an endpoint page by page, one throttled request per
//! advance, and [`Listing`] adapts it into a per-item stream of decoded
//! entities. Both are single-pass: dropping them is the only cancellation.

use std::{collections::VecDeque, marker::PhantomData};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{client::Client, error::Error, result::Result};

/// A cursor over the pages of one listing query.
///
/// Holds the page number, the count of items yielded so far and a terminal
/// flag. Pages are fetched on demand; nothing is prefetched.
pub(crate) struct PageStream<'c> {
    client: &'c Client,
    url: String,
    items_key: Option<&'static str>,
    page: u32,
    yielded: usize,
    limit: usize,
    done: bool,
}

impl<'c> PageStream<'c> {
    /// A stream over an endpoint whose pages are plain JSON arrays.
    ///
    /// `url` is the endpoint path with its query string already attached;
    /// the page parameter is appended per fetch. `limit` counts items
    /// across all pages, zero meaning unlimited.
    pub(crate) fn new(client: &'c Client, url: String, limit: usize) -> Self {
        Self::starting_at(client, url, 1, limit)
    }

    /// A stream that begins at an arbitrary page number.
    pub(crate) fn starting_at(client: &'c Client, url: String, page: u32, limit: usize) -> Self {
        PageStream {
            client,
            url,
            items_key: None,
            page,
            yielded: 0,
            limit,
            done: false,
        }
    }

    /// A stream over an endpoint whose pages are objects carrying the item
    /// array under `key` (the pool posts shape).
    pub(crate) fn keyed(client: &'c Client, url: String, key: &'static str, limit: usize) -> Self {
        PageStream {
            client,
            url,
            items_key: Some(key),
            page: 1,
            yielded: 0,
            limit,
            done: false,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Fetches and yields the next page, or `None` once terminal.
    ///
    /// An empty page ends the stream without being yielded. A page is
    /// always yielded whole; if it pushes the accumulated count to the
    /// limit the stream ends afterwards, and no further page is fetched.
    ///
    /// # Errors
    ///
    /// Transport and decode failures for the page fetch propagate directly,
    /// including [`Error::SiteOverloaded`]; the page is not skipped.
    pub(crate) async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let url = format!("{}{}page={}", self.url, separator, self.page);
        let body: Value = self.client.fetch_json(&url).await?;
        let items = match self.items_key {
            None => body,
            Some(key) => match body.get(key) {
                Some(items) => items.clone(),
                None => return Err(Error::MalformedResponse { url }),
            },
        };
        let items = match items {
            Value::Array(items) => items,
            _ => return Err(Error::MalformedResponse { url }),
        };
        if items.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.page += 1;
        self.yielded += items.len();
        if self.limit > 0 && self.yielded >= self.limit {
            self.done = true;
        }
        log::debug!("page yielded, {} items so far", self.yielded);
        Ok(Some(items))
    }
}

/// A lazy stream of entities decoded from a paginated listing.
///
/// Returned by every listing function in the crate. Items are pulled one at
/// a time; a new page is fetched only when the current one is drained, so
/// abandoning the listing stops all further requests.
///
/// The page that crosses the item limit is still yielded in full; callers
/// that need an exact cap truncate downstream.
pub struct Listing<'c, T> {
    pages: PageStream<'c>,
    buffer: VecDeque<Value>,
    kind: PhantomData<T>,
}

impl<'c, T> Listing<'c, T>
where
    T: DeserializeOwned,
{
    pub(crate) fn new(pages: PageStream<'c>) -> Self {
        Listing {
            pages,
            buffer: VecDeque::new(),
            kind: PhantomData,
        }
    }

    /// Yields the next entity, fetching the next page if needed.
    ///
    /// # Errors
    ///
    /// Page fetch failures propagate from [`PageStream::next_page`]; an
    /// item that does not decode as `T` is [`Error::MalformedResponse`].
    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.buffer.is_empty() {
            match self.pages.next_page().await? {
                Some(items) => self.buffer.extend(items),
                None => return Ok(None),
            }
        }
        match self.buffer.pop_front() {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|_| Error::MalformedResponse {
                    url: self.pages.url().to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Drains the stream into a vector.
    ///
    /// # Errors
    ///
    /// The first failed page fetch or item decode aborts the drain.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

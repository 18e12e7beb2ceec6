//! Pool class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::{macros::str_opt_ref, post::Post},
    result::Result,
};

/// Searches the site's image pools by whole or partial name.
///
/// An empty `title` lists all pools. `limit` caps the total number of pools
/// fetched across pages, zero meaning unlimited.
pub fn search<'c>(client: &'c Client, title: &str, limit: usize) -> Listing<'c, Pool> {
    let url = client.url(&format!(
        "pool/index.json?query={}",
        urlencoding::encode(title)
    ));
    Listing::new(PageStream::new(client, url, limit))
}

/// Returns a stream of the most recently updated pools.
pub fn recent(client: &Client, limit: usize) -> Listing<'_, Pool> {
    let url = client.url("pool/index.json");
    Listing::new(PageStream::new(client, url, limit))
}

/// Represents an image pool: an ordered, curated set of posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pool {
    /// The numeric pool ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// The pool's name, with underscores for spaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// ID of the user who created the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,

    /// Creation time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Value>,

    /// Last update time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<Value>,

    /// Number of posts in the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_count: Option<u64>,

    /// Whether the pool is marked public.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_public: Option<bool>,

    /// Whether the pool is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,

    /// The pool's description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Pool {
    /// Constructs a pool from a raw JSON payload. No network access.
    ///
    /// # Errors
    ///
    /// A payload that is not an object, or that carries wrongly typed
    /// known fields, is [`Error::MalformedResponse`].
    pub fn from_data(data: Value) -> Result<Self> {
        serde_json::from_value(data).map_err(|_| Error::MalformedResponse {
            url: String::from("<payload>"),
        })
    }

    /// Fetches a pool from the site by its ID number.
    ///
    /// Only the pool's own attributes are loaded; walk [`Pool::posts`] for
    /// its contents.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no pool carries that ID; fetch and decode
    /// failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        // page=999 keeps the embedded post list empty
        let url = client.url(&format!("pool/show.json?id={id}&page=999"));
        let mut data: Value = client.fetch_json(&url).await?;
        if let Some(map) = data.as_object_mut() {
            map.remove("posts");
        }
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "pool",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the pool's ID.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the pool's name.
    pub fn name(&self) -> Option<&str> {
        str_opt_ref!(self.name)
    }

    /// Returns a user-friendly formatted version of the pool's name.
    pub fn name_normal(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        let mut normal = String::with_capacity(name.len());
        for (index, word) in name.split('_').enumerate() {
            if index > 0 {
                normal.push(' ');
            }
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                normal.extend(first.to_uppercase());
                normal.push_str(chars.as_str());
            }
        }
        Some(normal)
    }

    /// Returns the ID of the user who created the pool.
    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    /// Returns the site's structured representation of the creation time.
    pub fn created_at(&self) -> Option<&Value> {
        self.created_at.as_ref()
    }

    /// Returns the site's structured representation of the last update.
    pub fn updated_at(&self) -> Option<&Value> {
        self.updated_at.as_ref()
    }

    /// Returns the number of posts in the pool.
    pub fn post_count(&self) -> Option<u64> {
        self.post_count
    }

    /// Returns whether the pool is marked public.
    pub fn is_public(&self) -> Option<bool> {
        self.is_public
    }

    /// Returns whether the pool is active.
    pub fn is_active(&self) -> Option<bool> {
        self.is_active
    }

    /// Returns the pool's description.
    pub fn description(&self) -> Option<&str> {
        str_opt_ref!(self.description)
    }

    /// Returns the site URL the pool can be found at.
    pub fn url(&self, client: &Client) -> Option<String> {
        self.id.map(|id| client.url(&format!("pool/show/{id}")))
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the pool as a JSON object.
    /// The list of posts is not included.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns a lazy stream over the posts in the pool, in pool order.
    ///
    /// # Errors
    ///
    /// Fails if the pool has no ID.
    pub fn posts<'c>(&self, client: &'c Client) -> Result<Listing<'c, Post>> {
        let id = self.id.ok_or(Error::NotFound {
            kind: "pool",
            ident: String::from("(unset id)"),
        })?;
        let url = client.url(&format!("pool/show.json?id={id}"));
        Ok(Listing::new(PageStream::keyed(client, url, "posts", 0)))
    }
}

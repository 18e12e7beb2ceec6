//! Tag class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::{lookup_first, lookup_param, macros::str_opt_ref},
    result::Result,
};

/// Returns a stream of the site's tags in name order, beginning at `page`.
///
/// `limit` caps the total number of tags fetched across pages, zero meaning
/// unlimited.
pub fn all(client: &Client, page: u32, limit: usize) -> Listing<'_, Tag> {
    let url = client.url("tag/index.json?order=name");
    Listing::new(PageStream::starting_at(client, url, page, limit))
}

/// Represents a tag and its site-wide statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tag {
    /// The numeric tag ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// The name of the tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Whether the tag is marked ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ambiguous: Option<bool>,

    /// Numeric tag category.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    tag_type: Option<i64>,

    /// Number of posts carrying this tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u64>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Tag {
    /// Constructs a tag from a raw JSON payload. No network access.
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

    /// Fetches a tag from the site by ID number or name.
    ///
    /// Identifiers that parse as integers resolve by `id`, anything else
    /// by `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the lookup yields zero results; fetch and
    /// decode failures propagate.
    pub async fn new(client: &Client, ident: &str) -> Result<Self> {
        let url = client.url(&format!(
            "tag/index.json?{}={}",
            lookup_param(ident),
            urlencoding::encode(ident)
        ));
        let data = lookup_first(client, &url, "tag", ident).await?;
        Self::from_data(data)
    }

    /// Returns the ID number of the tag.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the name of the tag.
    pub fn name(&self) -> Option<&str> {
        str_opt_ref!(self.name)
    }

    /// Returns whether the tag is marked ambiguous.
    pub fn ambiguous(&self) -> Option<bool> {
        self.ambiguous
    }

    /// Returns the numeric tag category: 0 (general), 1 (artist),
    /// 3 (copyright), 4 (character), 5 (species).
    pub fn tag_type(&self) -> Option<i64> {
        self.tag_type
    }

    /// Returns the tag category as a name: general, artist, copyright,
    /// character, species.
    pub fn type_str(&self) -> Option<&'static str> {
        match self.tag_type? {
            0 => Some("general"),
            1 => Some("artist"),
            3 => Some("copyright"),
            4 => Some("character"),
            5 => Some("species"),
            _ => None,
        }
    }

    /// Returns the number of posts carrying this tag.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the tag as a JSON object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Fetches the names of tags related to this one.
    ///
    /// # Errors
    ///
    /// Fails if the tag has no name, or if the fetch or decode fails.
    pub async fn related(&self, client: &Client) -> Result<Vec<String>> {
        let name = self.name.as_deref().ok_or(Error::NotFound {
            kind: "tag",
            ident: String::from("(unset name)"),
        })?;
        let url = client.url(&format!(
            "tag/related.json?tags={}",
            urlencoding::encode(name)
        ));
        let data: Value = client.fetch_json(&url).await?;
        let entries = match data.get(name).and_then(Value::as_array) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };
        // the first entry is the tag itself
        Ok(entries
            .iter()
            .skip(1)
            .filter_map(|entry| entry.get(0))
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect())
    }
}

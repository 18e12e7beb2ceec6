//! Ticket class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::macros::str_opt_ref,
    result::Result,
};

/// Returns a stream of recently created tickets, beginning at `page`.
///
/// `limit` caps the total number of tickets fetched across pages, zero
/// meaning unlimited.
pub fn recent(client: &Client, page: u32, limit: usize) -> Listing<'_, Ticket> {
    let url = client.url("ticket/index.json");
    Listing::new(PageStream::starting_at(client, url, page, limit))
}

/// Represents a moderation ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ticket {
    /// The numeric ticket ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// The kind of report the ticket is.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    ticket_type: Option<String>,

    /// The current status of the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,

    /// ID of the user who filed the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<u64>,

    /// Name of the user who filed the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,

    /// Creation time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Value>,

    /// Last update time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<Value>,

    /// Username requested by a name-change ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desired_username: Option<String>,

    /// Previous username on a name-change ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    oldname: Option<String>,

    /// The reason given for the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,

    /// The comment the ticket reports, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reported_comment: Option<Value>,

    /// The forum post the ticket reports, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reported_forum: Option<Value>,

    /// ID of the staff member handling the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handled_by: Option<u64>,

    /// Name of the staff member handling the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handled_by_name: Option<String>,

    /// The staff response on the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<String>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Ticket {
    /// Constructs a ticket from a raw JSON payload. No network access.
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

    /// Fetches a ticket from the site by its ID number.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no ticket carries that ID; fetch and decode
    /// failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let url = client.url(&format!("ticket/show.json?id={id}"));
        let data: Value = client.fetch_json(&url).await?;
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "ticket",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the ID number of the ticket.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the kind of report the ticket is.
    pub fn ticket_type(&self) -> Option<&str> {
        str_opt_ref!(self.ticket_type)
    }

    /// Returns the current status of the ticket.
    pub fn status(&self) -> Option<&str> {
        str_opt_ref!(self.status)
    }

    /// Returns the ID of the user who filed the ticket.
    pub fn user(&self) -> Option<u64> {
        self.user
    }

    /// Returns the name of the user who filed the ticket.
    pub fn username(&self) -> Option<&str> {
        str_opt_ref!(self.username)
    }

    /// Returns the site's structured representation of the creation time.
    pub fn created_at(&self) -> Option<&Value> {
        self.created_at.as_ref()
    }

    /// Returns the site's structured representation of the last update.
    pub fn updated_at(&self) -> Option<&Value> {
        self.updated_at.as_ref()
    }

    /// Returns the username requested by a name-change ticket.
    pub fn desired_username(&self) -> Option<&str> {
        str_opt_ref!(self.desired_username)
    }

    /// Returns the previous username on a name-change ticket.
    pub fn oldname(&self) -> Option<&str> {
        str_opt_ref!(self.oldname)
    }

    /// Returns the reason given for the ticket.
    pub fn reason(&self) -> Option<&str> {
        str_opt_ref!(self.reason)
    }

    /// Returns the comment the ticket reports.
    pub fn reported_comment(&self) -> Option<&Value> {
        self.reported_comment.as_ref()
    }

    /// Returns the forum post the ticket reports.
    pub fn reported_forum(&self) -> Option<&Value> {
        self.reported_forum.as_ref()
    }

    /// Returns the ID of the staff member handling the ticket.
    pub fn handled_by(&self) -> Option<u64> {
        self.handled_by
    }

    /// Returns the name of the staff member handling the ticket.
    pub fn handled_by_name(&self) -> Option<&str> {
        str_opt_ref!(self.handled_by_name)
    }

    /// Returns the staff response on the ticket.
    pub fn response(&self) -> Option<&str> {
        str_opt_ref!(self.response)
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the ticket as a JSON object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

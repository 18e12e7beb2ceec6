//! User class for the site's API, including login.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    models::{lookup_first, lookup_param, macros::str_opt_ref},
    result::Result,
};

/// Attempts to log in to the site, storing the returned credentials on the
/// client for later authenticated calls.
///
/// # Errors
///
/// [`Error::Login`] when the site rejects the credentials or omits the
/// password hash from its reply; fetch and decode failures propagate.
pub async fn login(client: &Client, username: &str, password: &str) -> Result<User> {
    let url = client.url("user/login.json");
    let result: Value = client
        .post_form(
            &url,
            &[
                ("name", username.to_string()),
                ("password", password.to_string()),
            ],
        )
        .await?;

    let failed = match result.get("success") {
        Some(Value::Bool(success)) => !*success,
        Some(Value::String(success)) => success.as_str() == "failed",
        _ => false,
    };
    if failed {
        let reason = result
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("incorrect username or password");
        return Err(Error::Login(reason.to_string()));
    }

    let name = result.get("name").and_then(Value::as_str);
    let password_hash = result.get("password_hash").and_then(Value::as_str);
    match (name, password_hash) {
        (Some(name), Some(password_hash)) => {
            client.store_credentials(name.to_string(), password_hash.to_string());
            User::new(client, name).await
        }
        _ => {
            client.clear_credentials();
            Err(Error::Login(String::from("password hash not retrieved")))
        }
    }
}

/// Searches for users by ID number or username.
///
/// # Errors
///
/// Fails if the listing cannot be fetched or decoded.
pub async fn search(client: &Client, ident: &str) -> Result<Vec<User>> {
    let url = client.url(&format!(
        "user/index.json?{}={}",
        lookup_param(ident),
        urlencoding::encode(ident)
    ));
    let results: Vec<Value> = client.fetch_json(&url).await?;
    results.into_iter().map(User::from_data).collect()
}

/// Represents a user account on the site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// The user's ID number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// The user's username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// The user's site level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<i64>,

    /// Formatted string of the user's join date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,

    /// The user's tag subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subscriptions: Option<Value>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl User {
    /// Constructs a user from a raw JSON payload. No network access.
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

    /// Fetches a user from the site by ID number or username.
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
            "user/index.json?{}={}",
            lookup_param(ident),
            urlencoding::encode(ident)
        ));
        let data = lookup_first(client, &url, "user", ident).await?;
        Self::from_data(data)
    }

    /// Returns the user's ID number.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the user's username.
    pub fn name(&self) -> Option<&str> {
        str_opt_ref!(self.name)
    }

    /// Returns the user's site level.
    pub fn level(&self) -> Option<i64> {
        self.level
    }

    /// Returns a formatted string of the user's join date.
    pub fn created_at(&self) -> Option<&str> {
        str_opt_ref!(self.created_at)
    }

    /// Returns the user's tag subscriptions.
    pub fn subscriptions(&self) -> Option<&Value> {
        self.subscriptions.as_ref()
    }

    /// Returns the site URL the user's profile can be found at.
    pub fn url(&self, client: &Client) -> Option<String> {
        self.id.map(|id| client.url(&format!("user/show/{id}")))
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the user as a JSON object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Fetches the tag changes made by this user, as raw records.
    ///
    /// # Errors
    ///
    /// Fails if the user has no ID, or if the fetch or decode fails.
    pub async fn tag_history(&self, client: &Client) -> Result<Vec<Value>> {
        let id = self.known_id()?;
        let url = client.url(&format!("post_tag_history/index.json?user_id={id}"));
        client.fetch_json(&url).await
    }

    /// Fetches the post flags raised by this user, as raw records.
    ///
    /// # Errors
    ///
    /// Fails if the user has no ID, or if the fetch or decode fails.
    pub async fn flag_history(&self, client: &Client) -> Result<Vec<Value>> {
        let id = self.known_id()?;
        let url = client.url(&format!("post_flag_history/index.json?user_id={id}"));
        client.fetch_json(&url).await
    }

    fn known_id(&self) -> Result<u64> {
        self.id.ok_or(Error::NotFound {
            kind: "user",
            ident: String::from("(unset id)"),
        })
    }
}

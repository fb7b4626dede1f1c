//! REST implementation of [`ItemStore`].
//!
//! [`PortalClient`] talks to a portal's sharing REST API with `reqwest`.
//! Every request asks for `f=json` and carries the pre-issued token, if
//! any, untouched. Transport failures (connect errors, timeouts and 5xx
//! responses) are retried with exponential backoff; anything else fails
//! immediately. Portals report many errors as HTTP 200 with an `error`
//! object in the body, so those are checked as well.
//!
//! # Endpoints
//!
//! | Operation | Path |
//! |-----------|------|
//! | item info | `content/items/{id}` (falls back to `community/groups/{id}`) |
//! | item body | `content/items/{id}/data` |
//! | resources | `content/items/{id}/resources` |
//! | group listing | `content/groups/{id}?start=&num=` |
//! | create | `content/users/{user}/[{folder}/]addItem`, `community/createGroup` |
//! | update | `content/users/{user}/items/{id}/update` |

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::config::{GlobalConfig, PortalConfig};
use crate::constants::{
    DEFAULT_RETRY_ATTEMPTS, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS,
    default_request_timeout,
};
use crate::core::{Item, SolkitError, kinds};
use crate::store::{ContentPage, CreatedItem, DeployTarget, ItemStore};

/// Item-level fields copied into [`Item::properties`] on fetch.
const PASSTHROUGH_PROPERTIES: [&str; 8] = [
    "snippet",
    "description",
    "tags",
    "extent",
    "accessInformation",
    "licenseInfo",
    "culture",
    "spatialReference",
];

/// Client for one portal.
#[derive(Clone)]
pub struct PortalClient {
    http: Client,
    base_url: String,
    username: String,
    token: Option<String>,
    retry_attempts: usize,
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PortalClient {
    /// Create a client for `base_url` acting as `username`.
    pub fn new(base_url: &str, username: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, username, token, default_request_timeout())
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(
        base_url: &str,
        username: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("solkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            token,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    /// Client for a configured portal.
    pub fn from_config(portal: &PortalConfig, config: &GlobalConfig) -> Result<Self> {
        Ok(Self::with_timeout(
            &portal.url,
            &portal.username,
            portal.resolve_token(),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_retry_attempts(config.retry_attempts))
    }

    /// Set how many times transport failures are retried.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// User this client acts as.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(STARTING_BACKOFF_DELAY_MS / 2)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
            .map(jitter)
            .take(self.retry_attempts)
    }

    fn base_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("f".to_string(), "json".to_string())];
        if let Some(token) = &self.token {
            params.push(("token".to_string(), token.clone()));
        }
        params
    }

    async fn get_json(&self, operation: &str, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        let mut params = self.base_params();
        params.extend(query.iter().map(|(k, v)| ((*k).to_string(), v.clone())));

        let value = RetryIf::start(
            self.strategy(),
            || async {
                tracing::debug!("GET {}", url);
                self.http.get(&url).query(&params).send().await?.error_for_status()?.json::<Value>().await
            },
            is_transient,
        )
        .await
        .map_err(|e| portal_error(operation, &e.to_string()))?;

        check_body(operation, value)
    }

    async fn post_form(&self, operation: &str, path: &str, form: &[(String, String)]) -> Result<Value> {
        let url = self.url(path);
        let mut params = self.base_params();
        params.extend(form.iter().cloned());

        let value = RetryIf::start(
            self.strategy(),
            || async {
                tracing::debug!("POST {}", url);
                self.http.post(&url).form(&params).send().await?.error_for_status()?.json::<Value>().await
            },
            is_transient,
        )
        .await
        .map_err(|e| portal_error(operation, &e.to_string()))?;

        check_body(operation, value)
    }

    async fn fetch_group(&self, id: &str) -> Result<Item> {
        let info = self.get_json(&format!("fetch group {id}"), &format!("community/groups/{id}"), &[]).await?;
        let mut item = Item::new(id, kinds::GROUP);
        item.title = info.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        item.body = Value::Object(Map::new());
        copy_properties(&info, &mut item);
        Ok(item)
    }

    async fn fetch(&self, id: &str) -> Result<Item> {
        let operation = format!("fetch item {id}");
        let info = match self.get_json(&operation, &format!("content/items/{id}"), &[]).await {
            Ok(info) => info,
            Err(err) => {
                tracing::debug!("'{}' is not an item ({}), trying groups", id, err);
                return self.fetch_group(id).await.map_err(|_| err);
            }
        };

        let kind = info.get("type").and_then(Value::as_str).unwrap_or_default();
        let mut item = Item::new(id, kind);
        item.title = info.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        item.type_keywords = info
            .get("typeKeywords")
            .and_then(Value::as_array)
            .map(|kw| kw.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        item.url = item_url(&info);
        copy_properties(&info, &mut item);

        // Items without data answer with an empty body
        let data = self
            .http
            .get(self.url(&format!("content/items/{id}/data")))
            .query(&self.base_params())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| portal_error(&format!("fetch data of {id}"), &e.to_string()))?;
        let text = data.text().await.with_context(|| format!("Failed to read data of {id}"))?;
        item.body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(item)
    }

    async fn resources(&self, id: &str) -> Result<Vec<String>> {
        let value = self
            .get_json(&format!("list resources of {id}"), &format!("content/items/{id}/resources"), &[])
            .await?;
        Ok(value
            .get("resources")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|r| r.get("resource").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn group_page(&self, group_id: &str, start: usize, num: usize) -> Result<ContentPage> {
        let value = self
            .get_json(
                &format!("list content of group {group_id}"),
                &format!("content/groups/{group_id}"),
                &[("start", start.to_string()), ("num", num.to_string())],
            )
            .await?;
        Ok(parse_content_page(&value))
    }

    async fn create(&self, item: &Item, target: &DeployTarget) -> Result<CreatedItem> {
        let owner = target.owner.as_deref().unwrap_or(&self.username);
        let operation = format!("create {} '{}'", item.kind, item.title);

        if item.kind == kinds::GROUP {
            let mut form = vec![
                ("title".to_string(), item.title.clone()),
                ("access".to_string(), "private".to_string()),
            ];
            form.extend(property_form(&item.properties));
            let value = self.post_form(&operation, "community/createGroup", &form).await?;
            let id = value
                .pointer("/group/id")
                .and_then(Value::as_str)
                .ok_or_else(|| portal_error(&operation, "response has no group id"))?;
            return Ok(CreatedItem::new(id));
        }

        let path = match &target.folder {
            Some(folder) => format!("content/users/{owner}/{folder}/addItem"),
            None => format!("content/users/{owner}/addItem"),
        };
        let mut form = vec![
            ("type".to_string(), item.kind.clone()),
            ("title".to_string(), item.title.clone()),
            ("typeKeywords".to_string(), item.type_keywords.join(",")),
        ];
        if let Some(url) = &item.url {
            form.push(("url".to_string(), url.clone()));
        }
        if !item.body.is_null() {
            form.push(("text".to_string(), item.body.to_string()));
        }
        form.extend(property_form(&item.properties));

        let value = self.post_form(&operation, &path, &form).await?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| portal_error(&operation, "response has no item id"))?;

        let url = match item.url.clone().or_else(|| item_url(&value)) {
            Some(url) => Some(url),
            None => self.created_url(id).await,
        };
        let mut created = CreatedItem::new(id);
        if let Some(url) = url {
            created = created.with_fact("url", url);
        }
        if let Some(folder) = value.get("folder").and_then(Value::as_str) {
            created = created.with_fact("folder", folder);
        }
        Ok(created)
    }

    /// Url the portal assigned to a freshly created item, if any.
    async fn created_url(&self, id: &str) -> Option<String> {
        match self.get_json(&format!("fetch item {id}"), &format!("content/items/{id}"), &[]).await {
            Ok(info) => item_url(&info),
            Err(err) => {
                tracing::warn!("Could not read the url of created item {}: {:#}", id, err);
                None
            }
        }
    }

    async fn update(&self, id: &str, patch: &Map<String, Value>) -> Result<()> {
        let path = format!("content/users/{}/items/{id}/update", self.username);
        self.post_form(&format!("update item {id}"), &path, &property_form(patch)).await?;
        Ok(())
    }
}

impl ItemStore for PortalClient {
    fn fetch_item<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Item>> {
        Box::pin(self.fetch(id))
    }

    fn fetch_item_resources<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.resources(id))
    }

    fn group_content<'a>(
        &'a self,
        group_id: &'a str,
        start: usize,
        num: usize,
    ) -> BoxFuture<'a, Result<ContentPage>> {
        Box::pin(self.group_page(group_id, start, num))
    }

    fn create_item<'a>(
        &'a self,
        item: &'a Item,
        target: &'a DeployTarget,
    ) -> BoxFuture<'a, Result<CreatedItem>> {
        Box::pin(self.create(item, target))
    }

    fn update_item<'a>(
        &'a self,
        id: &'a str,
        patch: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.update(id, patch))
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    let transient = err.is_timeout()
        || err.is_connect()
        || err.status().is_some_and(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS);
    if transient {
        tracing::warn!("Transient portal error, retrying: {}", err);
    }
    transient
}

fn item_url(info: &Value) -> Option<String> {
    info.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()).map(str::to_string)
}

fn portal_error(operation: &str, reason: &str) -> anyhow::Error {
    SolkitError::Portal {
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Turn a `{"error": {...}}` body into an error.
fn check_body(operation: &str, value: Value) -> Result<Value> {
    if let Some(error) = value.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        let details = error
            .get("details")
            .and_then(Value::as_array)
            .map(|d| d.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("; "))
            .filter(|d| !d.is_empty());
        let reason = match details {
            Some(details) => format!("{code} {message} ({details})"),
            None => format!("{code} {message}"),
        };
        return Err(portal_error(operation, &reason));
    }
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(portal_error(operation, "request reported success=false"));
    }
    Ok(value)
}

fn copy_properties(info: &Value, item: &mut Item) {
    for key in PASSTHROUGH_PROPERTIES {
        if let Some(value) = info.get(key).filter(|v| !v.is_null()) {
            item.properties.insert(key.to_string(), value.clone());
        }
    }
}

/// Encode a JSON map as form fields: strings verbatim, everything else as JSON.
fn property_form(map: &Map<String, Value>) -> Vec<(String, String)> {
    map.iter()
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) => s.clone(),
                Value::Array(list) if list.iter().all(Value::is_string) => {
                    list.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(",")
                }
                other => other.to_string(),
            };
            (key.clone(), encoded)
        })
        .collect()
}

fn parse_content_page(value: &Value) -> ContentPage {
    let ids = value
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let total = value.get("total").and_then(Value::as_u64).unwrap_or_default() as usize;
    // The listing signals the last page with nextStart = -1
    let next_start = value
        .get("nextStart")
        .and_then(Value::as_i64)
        .filter(|&n| n > 0)
        .map(|n| n as usize);
    ContentPage {
        ids,
        total,
        next_start,
    }
}

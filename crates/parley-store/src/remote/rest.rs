//! Thin table client for a PostgREST-style HTTP API.
//!
//! [`RestClient`] is the seam between [`RemoteStore`](super::RemoteStore) and
//! the network: rows travel as JSON values, filters as `column=op.value`
//! query pairs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// A row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(&'static str, String),
    In(&'static str, Vec<String>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl ToString) -> Self {
        Self::Eq(column, value.to_string())
    }

    pub fn is_in<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Self::In(column, values.into_iter().map(|v| v.to_string()).collect())
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Eq(c, _) | Self::In(c, _) => c,
        }
    }

    /// `(column, "op.value")` query pair.
    pub fn to_query(&self) -> (String, String) {
        match self {
            Self::Eq(c, v) => (c.to_string(), format!("eq.{v}")),
            Self::In(c, vs) => (c.to_string(), format!("in.({})", vs.join(","))),
        }
    }
}

/// Sort order as `column.asc` / `column.desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    pub fn to_query(&self) -> String {
        format!("{}.{}", self.column, if self.descending { "desc" } else { "asc" })
    }
}

/// CRUD over named tables.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn select(&self, table: &str, filters: &[Filter], order: Option<Order>) -> Result<Vec<Value>>;

    /// Insert one row (object) or many (array).
    async fn insert(&self, table: &str, rows: Value) -> Result<()>;

    /// Insert or replace by primary key.
    async fn upsert(&self, table: &str, rows: Value) -> Result<()>;

    /// Merge `patch` into every matching row.  Returns the number of rows
    /// updated.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<usize>;

    /// Returns the number of rows deleted.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize>;
}

/// [`RestClient`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
}

impl PostgrestClient {
    /// `base_url` is the project URL; tables live under `/rest/v1/`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|e| StoreError::Remote {
            status: 0,
            message: format!("invalid API key header: {e}"),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            StoreError::Remote {
                status: 0,
                message: format!("invalid API key header: {e}"),
            }
        })?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %message, "remote store request failed");
        Err(StoreError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

fn query_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query).collect()
}

#[async_trait]
impl RestClient for PostgrestClient {
    async fn select(&self, table: &str, filters: &[Filter], order: Option<Order>) -> Result<Vec<Value>> {
        let mut query = query_pairs(filters);
        query.push(("select".into(), "*".into()));
        if let Some(order) = order {
            query.push(("order".into(), order.to_query()));
        }

        let resp = self.http.get(self.table_url(table)).query(&query).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<()> {
        let resp = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Value) -> Result<()> {
        let resp = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<usize> {
        let resp = self
            .http
            .patch(self.table_url(table))
            .query(&query_pairs(filters))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Value> = Self::check(resp).await?.json().await?;
        Ok(rows.len())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize> {
        let resp = self
            .http
            .delete(self.table_url(table))
            .query(&query_pairs(filters))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<Value> = Self::check(resp).await?.json().await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_filter_query_pairs() {
        assert_eq!(
            Filter::eq("id", 42).to_query(),
            ("id".to_string(), "eq.42".to_string())
        );
        assert_eq!(
            Filter::is_in("message_id", ["a", "b"]).to_query(),
            ("message_id".to_string(), "in.(a,b)".to_string())
        );
        assert_eq!(Order::desc("created_at").to_query(), "created_at.desc");
    }

    #[test]
    fn test_table_url_trims_slash() {
        let client = PostgrestClient::new("https://db.example.com/", "anon-key").unwrap();
        assert_eq!(client.table_url("users"), "https://db.example.com/rest/v1/users");
    }

    #[tokio::test]
    async fn test_select_sends_keys_filters_and_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/users")
            .match_header("apikey", "anon-key")
            .match_header("Authorization", "Bearer anon-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "eq.alice".into()),
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("order".into(), "username.asc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"u1","username":"alice"}]"#)
            .create_async()
            .await;

        let client = PostgrestClient::new(&server.url(), "anon-key").unwrap();
        let rows = client
            .select("users", &[Filter::eq("username", "alice")], Some(Order::asc("username")))
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({ "id": "u1", "username": "alice" })]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_and_upsert_prefer_headers() {
        let mut server = mockito::Server::new_async().await;
        let row = json!({ "id": "c1", "name": "party" });
        let insert = server
            .mock("POST", "/rest/v1/custom_emojis")
            .match_header("Prefer", "return=minimal")
            .match_body(Matcher::Json(row.clone()))
            .with_status(201)
            .create_async()
            .await;
        let upsert = server
            .mock("POST", "/rest/v1/users")
            .match_header("Prefer", "resolution=merge-duplicates,return=minimal")
            .match_body(Matcher::Json(row.clone()))
            .with_status(201)
            .create_async()
            .await;

        let client = PostgrestClient::new(&server.url(), "anon-key").unwrap();
        client.insert("custom_emojis", row.clone()).await.unwrap();
        client.upsert("users", row).await.unwrap();

        insert.assert_async().await;
        upsert.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_and_delete_count_returned_rows() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("PATCH", "/rest/v1/conversations")
            .match_header("Prefer", "return=representation")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.c1".into()))
            .match_body(Matcher::Json(json!({ "unread_count": 0 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"c1","unread_count":0}]"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/rest/v1/reactions")
            .match_header("Prefer", "return=representation")
            .match_query(Matcher::UrlEncoded("message_id".into(), "in.(m1,m2)".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = PostgrestClient::new(&server.url(), "anon-key").unwrap();
        let updated = client
            .update("conversations", &[Filter::eq("id", "c1")], json!({ "unread_count": 0 }))
            .await
            .unwrap();
        let deleted = client
            .delete("reactions", &[Filter::is_in("message_id", ["m1", "m2"])])
            .await
            .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(deleted, 0);
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_maps_to_remote_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/stories")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("JWT expired")
            .create_async()
            .await;

        let client = PostgrestClient::new(&server.url(), "stale-key").unwrap();
        let err = client.select("stories", &[], None).await.unwrap_err();

        match err {
            StoreError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "JWT expired");
            }
            other => panic!("expected a remote error, got {other:?}"),
        }
    }
}

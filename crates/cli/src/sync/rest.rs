// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! PostgREST-style HTTP backend.
//!
//! Record tables live at `{url}/rest/v1/{table}` and are filtered with
//! `column=eq.value` query pairs. Sync bookkeeping lives in the
//! `sync_metadata` table keyed by `(user_id, table_name, local_id)`.

use chrono::{DateTime, SecondsFormat, Utc};
use ebb_core::{SyncMetadata, Table};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::remote::{
    row_timestamp_ms, Filter, RemoteBackend, RemoteError, RemoteFuture, RemoteResult, Row,
    LOCAL_ID_COLUMN, USER_ID_COLUMN,
};

const METADATA_TABLE: &str = "sync_metadata";
const TABLE_NAME_COLUMN: &str = "table_name";
const LAST_SYNCED_AT_COLUMN: &str = "last_synced_at";
const SERVER_UPDATED_AT_COLUMN: &str = "server_updated_at";

/// HTTP backend speaking PostgREST conventions.
#[derive(Clone)]
pub struct RestBackend {
    rest_url: String,
    api_key: String,
    access_token: Option<String>,
    client: Client,
}

impl RestBackend {
    /// Creates a backend for the project at `url`.
    ///
    /// Requests authenticate with `access_token` when given, otherwise with
    /// the API key itself.
    pub fn new(
        url: impl AsRef<str>,
        api_key: impl Into<String>,
        access_token: Option<String>,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration("API key must not be empty".to_string()));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            rest_url,
            api_key,
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        request.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(response)
    }

    async fn fetch_rows(
        &self,
        table: &str,
        query: Vec<(String, String)>,
    ) -> RemoteResult<Vec<Row>> {
        let request = self.client.get(self.endpoint(table)).query(&query);
        let response = self.send(request).await?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

impl RemoteBackend for RestBackend {
    fn insert(&self, table: Table, row: Row) -> RemoteFuture<'_, String> {
        Box::pin(async move {
            let request = self
                .client
                .post(self.endpoint(table.as_str()))
                .header("Prefer", "return=representation")
                .json(&row);
            let rows = self
                .send(request)
                .await?
                .json::<Vec<Row>>()
                .await
                .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
            rows.first()
                .and_then(|r| r.get("id"))
                .and_then(id_text)
                .ok_or_else(|| RemoteError::InvalidResponse("insert returned no id".to_string()))
        })
    }

    fn update_by_filter(&self, table: Table, filter: Filter, patch: Row) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let request = self
                .client
                .patch(self.endpoint(table.as_str()))
                .query(&filter_query(&filter))
                .header("Prefer", "return=minimal")
                .json(&patch);
            self.send(request).await?;
            Ok(())
        })
    }

    fn delete_by_filter(&self, table: Table, filter: Filter) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let request = self
                .client
                .delete(self.endpoint(table.as_str()))
                .query(&filter_query(&filter))
                .header("Prefer", "return=minimal");
            self.send(request).await?;
            Ok(())
        })
    }

    fn select_one(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Option<Row>> {
        Box::pin(async move {
            let mut query = select_query(&filter);
            query.push(("limit".to_string(), "1".to_string()));
            Ok(self.fetch_rows(table.as_str(), query).await?.into_iter().next())
        })
    }

    fn select_all(&self, table: Table, filter: Filter) -> RemoteFuture<'_, Vec<Row>> {
        Box::pin(async move { self.fetch_rows(table.as_str(), select_query(&filter)).await })
    }

    fn upsert_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
        metadata: SyncMetadata,
    ) -> RemoteFuture<'_, ()> {
        let body = metadata_row(user_id, table, local_id, metadata);
        Box::pin(async move {
            let request = self
                .client
                .post(self.endpoint(METADATA_TABLE))
                .query(&[("on_conflict", "user_id,table_name,local_id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&body);
            self.send(request).await?;
            Ok(())
        })
    }

    fn get_sync_metadata(
        &self,
        user_id: &str,
        table: Table,
        local_id: &str,
    ) -> RemoteFuture<'_, Option<SyncMetadata>> {
        let filter = Filter::owned(user_id, local_id).eq(TABLE_NAME_COLUMN, table.as_str());
        Box::pin(async move {
            let mut query = vec![(
                "select".to_string(),
                format!("{LAST_SYNCED_AT_COLUMN},{SERVER_UPDATED_AT_COLUMN}"),
            )];
            query.extend(filter_query(&filter));
            query.push(("limit".to_string(), "1".to_string()));

            let Some(row) = self.fetch_rows(METADATA_TABLE, query).await?.into_iter().next() else {
                return Ok(None);
            };
            let read = |column: &str| {
                row_timestamp_ms(&row, column).ok_or_else(|| {
                    RemoteError::InvalidResponse(format!("sync metadata has no valid {column}"))
                })
            };
            Ok(Some(SyncMetadata {
                last_synced_at: read(LAST_SYNCED_AT_COLUMN)?,
                server_updated_at: read(SERVER_UPDATED_AT_COLUMN)?,
            }))
        })
    }
}

/// Normalizes a project URL to its REST root (`.../rest/v1`).
pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration("remote URL must not be empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(RemoteError::InvalidConfiguration(
            "remote URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

/// Renders filter conditions as PostgREST `column=eq.value` pairs.
pub fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{value}")))
        .collect()
}

fn select_query(filter: &Filter) -> Vec<(String, String)> {
    let mut query = vec![("select".to_string(), "*".to_string())];
    query.extend(filter_query(filter));
    query
}

fn metadata_row(user_id: &str, table: Table, local_id: &str, metadata: SyncMetadata) -> Row {
    let mut row = Row::new();
    row.insert(USER_ID_COLUMN.to_string(), user_id.into());
    row.insert(TABLE_NAME_COLUMN.to_string(), table.as_str().into());
    row.insert(LOCAL_ID_COLUMN.to_string(), local_id.into());
    row.insert(LAST_SYNCED_AT_COLUMN.to_string(), timestamp_value(metadata.last_synced_at));
    row.insert(SERVER_UPDATED_AT_COLUMN.to_string(), timestamp_value(metadata.server_updated_at));
    row
}

/// Renders ms since epoch as an RFC 3339 timestamp, falling back to the raw
/// number when it is out of chrono's range.
fn timestamp_value(ms: u64) -> Value {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .unwrap_or_else(|| Value::from(ms))
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_decode() {
        RemoteError::InvalidResponse(error.to_string())
    } else {
        RemoteError::Network(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

/// Extracts a readable message from an error response body.
fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let mut text = message.trim().to_string();
            let detail = payload.details.or(payload.hint);
            if let Some(detail) = detail.filter(|d| !d.trim().is_empty()) {
                text = format!("{text}: {}", detail.trim());
            }
            return format!("{} ({})", text, status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;

//! PostgREST backend
//!
//! Talks to a hosted PostgREST gateway: procedures under `/rest/v1/rpc/` and
//! one resource per table under `/rest/v1/`.

use crate::error::{DbError, DbResult};
use crate::traits::{DataApi, RemoteDatabase, RemoteProcedure};
use async_trait::async_trait;
use pv_core::{ConnectionConfig, Filter, OnConflict, Row};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Error code PostgREST reports for an unknown RPC function
const PROCEDURE_NOT_FOUND_CODE: &str = "PGRST202";

/// Codes meaning the target table does not exist or is not exposed
const TABLE_NOT_FOUND_CODES: &[&str] = &["42P01", "PGRST205"];

/// HTTP client for a PostgREST-compatible database gateway
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    schema: String,
}

/// Error body returned by PostgREST
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl RestErrorBody {
    /// Parse an error body, keeping raw text when it is not JSON
    fn parse(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<RestErrorBody>(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                let text = body.trim();
                RestErrorBody {
                    message: Some(if text.is_empty() {
                        format!("HTTP {}", status.as_u16())
                    } else {
                        text.to_string()
                    }),
                    ..Default::default()
                }
            }
        }
    }

    /// Message with details and hint appended when present
    fn full_message(&self) -> String {
        let mut msg = self.message.clone().unwrap_or_default();
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            msg.push_str(" (");
            msg.push_str(details);
            msg.push(')');
        }
        if let Some(hint) = self.hint.as_deref().filter(|h| !h.is_empty()) {
            msg.push_str(" hint: ");
            msg.push_str(hint);
        }
        msg
    }
}

/// Map a failed RPC response to a `DbError`
fn map_rpc_error(name: &str, status: StatusCode, body: &str) -> DbError {
    let parsed = RestErrorBody::parse(status, body);
    // PostgREST also answers 404 for errors raised inside the function
    // (42P01, 42883), so a bare 404 only counts when it carries no code.
    let missing = match parsed.code.as_deref() {
        Some(code) => code == PROCEDURE_NOT_FOUND_CODE,
        None => status == StatusCode::NOT_FOUND,
    };
    if missing {
        return DbError::ProcedureNotFound {
            name: name.to_string(),
        };
    }
    DbError::Remote {
        message: parsed.full_message(),
        code: parsed.code,
    }
}

/// Map a failed table response to a `DbError`
fn map_table_error(table: &str, status: StatusCode, body: &str) -> DbError {
    let parsed = RestErrorBody::parse(status, body);
    let table_missing = parsed
        .code
        .as_deref()
        .is_some_and(|c| TABLE_NOT_FOUND_CODES.contains(&c))
        || status == StatusCode::NOT_FOUND;
    if table_missing {
        return DbError::TableNotFound(table.to_string());
    }
    DbError::Remote {
        message: parsed.full_message(),
        code: parsed.code,
    }
}

/// Render a filter as a PostgREST query pair (`col=eq.value`)
fn filter_param(filter: &Filter) -> (String, String) {
    let value = match &filter.value {
        Value::Null => return (filter.column.clone(), "is.null".to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (filter.column.clone(), format!("eq.{}", value))
}

/// Decode a JSON array response, treating an empty body as no rows
fn decode_rows(body: &str) -> DbResult<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}

impl RestBackend {
    /// Create a backend for the gateway at `url`
    pub fn new(url: &str, api_key: &str, schema: &str, timeout: Duration) -> DbResult<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DbError::NotConfigured("empty database URL".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(DbError::NotConfigured("empty API key".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            schema: schema.to_string(),
        })
    }

    /// Create a backend from a resolved connection section.
    ///
    /// The API key is read from the environment variable the section names.
    pub fn from_connection(connection: &ConnectionConfig) -> DbResult<Self> {
        let api_key = connection.resolve_api_key().ok_or_else(|| {
            DbError::NotConfigured(format!(
                "environment variable {} is not set",
                connection.api_key_env
            ))
        })?;
        Self::new(
            &connection.url,
            &api_key,
            &connection.schema,
            connection.timeout(),
        )
    }

    /// Gateway base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, name)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Request with auth and schema profile headers applied
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let profile_header = if method == Method::GET {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(profile_header, &self.schema)
    }

    /// Send a request, returning status and body text
    async fn send(&self, builder: RequestBuilder) -> DbResult<(StatusCode, String)> {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl RemoteProcedure for RestBackend {
    async fn call_procedure(&self, name: &str, args: &Value) -> DbResult<Value> {
        log::debug!("POST rpc/{}", name);
        let builder = self.request(Method::POST, &self.rpc_url(name)).json(args);
        let (status, body) = self.send(builder).await?;
        if !status.is_success() {
            return Err(map_rpc_error(name, status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DataApi for RestBackend {
    async fn select(&self, table: &str, limit: usize) -> DbResult<Vec<Row>> {
        log::debug!("GET {} limit {}", table, limit);
        let builder = self
            .request(Method::GET, &self.table_url(table))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())]);
        let (status, body) = self.send(builder).await?;
        if !status.is_success() {
            return Err(map_table_error(table, status, &body));
        }
        decode_rows(&body)
    }

    async fn insert(
        &self,
        table: &str,
        rows: &[Row],
        on_conflict: OnConflict,
        conflict_columns: &[String],
    ) -> DbResult<usize> {
        log::debug!("POST {} ({} rows)", table, rows.len());
        let mut builder = self.request(Method::POST, &self.table_url(table)).json(rows);
        builder = match on_conflict {
            OnConflict::Ignore => {
                if !conflict_columns.is_empty() {
                    builder = builder.query(&[("on_conflict", conflict_columns.join(","))]);
                }
                builder.header("Prefer", "resolution=ignore-duplicates,return=minimal")
            }
            OnConflict::Error => builder.header("Prefer", "return=minimal"),
        };
        let (status, body) = self.send(builder).await?;
        if !status.is_success() {
            return Err(map_table_error(table, status, &body));
        }
        Ok(rows.len())
    }

    async fn update(&self, table: &str, values: &Row, filters: &[Filter]) -> DbResult<usize> {
        log::debug!("PATCH {} ({} filters)", table, filters.len());
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let builder = self
            .request(Method::PATCH, &self.table_url(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(values);
        let (status, body) = self.send(builder).await?;
        if !status.is_success() {
            return Err(map_table_error(table, status, &body));
        }
        Ok(decode_rows(&body)?.len())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> DbResult<usize> {
        log::debug!("DELETE {} ({} filters)", table, filters.len());
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let builder = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&params)
            .header("Prefer", "return=representation");
        let (status, body) = self.send(builder).await?;
        if !status.is_success() {
            return Err(map_table_error(table, status, &body));
        }
        Ok(decode_rows(&body)?.len())
    }
}

impl RemoteDatabase for RestBackend {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;

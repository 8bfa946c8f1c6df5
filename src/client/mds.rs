//! HTTP client for a tabular log endpoint
//!
//! Two calls are used:
//! - `GET api/tables` lists every table name
//! - `GET api/tables/{name}/rows?from=..&to=..&query=..` returns the matching
//!   rows as a typed table (`{"columns": [...], "rows": [[...], ...]}`)

use super::{Auth, DataClient, FetchFuture, FetchRequest};
use crate::record::{FieldValue, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Context, Result, eyre};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Client for the tabular data endpoint
///
/// # Example
/// ```no_run
/// use mds_extract::client::{Auth, DataClient, FetchRequest, MdsClient};
/// use chrono::{Duration, Utc};
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("http://localhost:8080/")?;
/// let client = MdsClient::try_new(url, Auth::None)?;
///
/// let to = Utc::now();
/// let request = FetchRequest {
///     source: "WebLogs".to_string(),
///     from: to - Duration::minutes(15),
///     to,
///     query: "Sc_status = 400".to_string(),
/// };
/// let records = client.fetch(&request)?.await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MdsClient {
    client: Client,
    url: Url,
}

impl MdsClient {
    /// Create a client for `url` sending `auth` with every request
    ///
    /// # Errors
    /// Returns an error if the credentials are not a valid header value or
    /// the HTTP client cannot be built.
    pub fn try_new(url: Url, auth: Auth) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        auth.apply(&mut headers)?;
        let client = Client::builder().default_headers(headers).build()?;
        log::debug!("Created data client for {} (auth: {})", url, auth);
        Ok(Self { client, url })
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn tables_url(&self) -> Result<Url> {
        self.url
            .join("api/tables")
            .with_context(|| format!("Invalid endpoint: {}", self.url))
    }

    /// Build `api/tables/{source}/rows`, escaping the source as one path segment
    fn rows_url(&self, source: &str) -> Result<Url> {
        let mut url = self.tables_url()?;
        url.path_segments_mut()
            .map_err(|_| eyre!("Endpoint cannot be used as a base URL: {}", self.url))?
            .pop_if_empty()
            .push(source)
            .push("rows");
        Ok(url)
    }
}

impl DataClient for MdsClient {
    async fn list_sources(&self, pattern: &Regex) -> Result<Vec<String>> {
        let url = self.tables_url()?;
        log::debug!("Listing tables matching /{}/ from {}", pattern, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| eyre!("Failed to send request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to list tables ({}): {}", status, body);
        }

        let names: Vec<String> = response
            .json()
            .await
            .with_context(|| "Failed to parse table listing")?;

        Ok(filter_names(names, pattern))
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchFuture> {
        if request.source.trim().is_empty() {
            eyre::bail!("Source name is empty");
        }
        let url = self.rows_url(&request.source)?;
        let query = [
            ("from", format_timestamp(request.from)),
            ("to", format_timestamp(request.to)),
            ("query", request.query.clone()),
        ];
        let builder = self.client.get(url).query(&query);
        let source = request.source.clone();

        Ok(Box::pin(async move {
            let response = builder
                .send()
                .await
                .map_err(|e| eyre!("Failed to send request: {}", e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                eyre::bail!("Failed to fetch rows from {} ({}): {}", source, status, body);
            }

            let body = response
                .text()
                .await
                .with_context(|| format!("Failed to read rows response for {}", source))?;
            parse_table(&body).with_context(|| format!("Failed to parse rows for {}", source))
        }))
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Keep the names matching `pattern`, sorted and deduplicated
pub(crate) fn filter_names(names: Vec<String>, pattern: &Regex) -> Vec<String> {
    let mut matched: Vec<String> = names.into_iter().filter(|n| pattern.is_match(n)).collect();
    matched.sort();
    matched.dedup();
    matched
}

#[derive(Debug, Deserialize)]
struct Table {
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Decode a typed table body into records
pub(crate) fn parse_table(body: &str) -> Result<Vec<Record>> {
    let table: Table = serde_json::from_str(body)?;

    table
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() != table.columns.len() {
                eyre::bail!(
                    "Row {} has {} values, expected {}",
                    index,
                    row.len(),
                    table.columns.len()
                );
            }
            table
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| {
                    let field = to_field(&column.kind, value)
                        .with_context(|| format!("Row {}, column '{}'", index, column.name))?;
                    Ok::<_, eyre::Report>((column.name.clone(), field))
                })
                .collect::<Result<Record>>()
        })
        .collect()
}

fn to_field(kind: &str, value: Value) -> Result<FieldValue> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    let field = match kind.to_ascii_lowercase().as_str() {
        "datetime" | "timestamp" => {
            let text = value
                .as_str()
                .ok_or_else(|| eyre!("Expected a datetime string, got {}", value))?;
            let ts = DateTime::parse_from_rfc3339(text)
                .with_context(|| format!("Invalid datetime: {}", text))?;
            FieldValue::Timestamp(ts.with_timezone(&Utc))
        }
        "int" | "long" => match &value {
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| eyre!("Expected an integer, got {}", n))?,
            Value::String(s) => FieldValue::Integer(
                s.parse()
                    .with_context(|| format!("Invalid integer: {}", s))?,
            ),
            other => eyre::bail!("Expected an integer, got {}", other),
        },
        "real" | "double" => match &value {
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Real)
                .ok_or_else(|| eyre!("Expected a number, got {}", n))?,
            Value::String(s) => {
                FieldValue::Real(s.parse().with_context(|| format!("Invalid number: {}", s))?)
            }
            other => eyre::bail!("Expected a number, got {}", other),
        },
        "bool" | "boolean" => match &value {
            Value::Bool(b) => FieldValue::Boolean(*b),
            other => eyre::bail!("Expected a boolean, got {}", other),
        },
        _ => match value {
            Value::String(s) => FieldValue::String(s),
            other => FieldValue::String(other.to_string()),
        },
    };
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client() -> MdsClient {
        let url = Url::parse("http://localhost:8080/").unwrap();
        MdsClient::try_new(url, Auth::None).unwrap()
    }

    #[test]
    fn test_rows_url_escapes_source() {
        let client = client();
        assert_eq!(
            client.rows_url("WebLogs").unwrap().as_str(),
            "http://localhost:8080/api/tables/WebLogs/rows"
        );
        assert_eq!(
            client.rows_url("a/b c").unwrap().as_str(),
            "http://localhost:8080/api/tables/a%2Fb%20c/rows"
        );
    }

    #[test]
    fn test_fetch_rejects_empty_source() {
        let request = FetchRequest {
            source: " ".to_string(),
            from: Utc.with_ymd_and_hms(2015, 4, 16, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2015, 4, 16, 0, 15, 0).unwrap(),
            query: "true".to_string(),
        };
        let err = client().fetch(&request).err().unwrap();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_filter_names() {
        let pattern = Regex::new("^Web.*Ver6v0$").unwrap();
        let names = vec![
            "WebWorkerVer6v0".to_string(),
            "Other".to_string(),
            "WebFrontVer6v0".to_string(),
            "WebFrontVer6v0".to_string(),
        ];
        assert_eq!(
            filter_names(names, &pattern),
            vec!["WebFrontVer6v0".to_string(), "WebWorkerVer6v0".to_string()]
        );
    }

    #[test]
    fn test_parse_table() {
        let body = r#"{
            "columns": [
                {"name": "PreciseTimeStamp", "type": "datetime"},
                {"name": "Sc_status", "type": "long"},
                {"name": "Cs_host", "type": "string"},
                {"name": "Ratio", "type": "real"},
                {"name": "Ok", "type": "bool"}
            ],
            "rows": [
                ["2015-04-16T00:01:02.345Z", 400, "example.net", 0.5, false],
                ["2015-04-16T00:03:00Z", "404", null, 1, true]
            ]
        }"#;

        let records = parse_table(body).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(
            first.get("PreciseTimeStamp").unwrap().to_string(),
            "2015-04-16T00:01:02Z"
        );
        assert_eq!(first.get("Sc_status"), Some(&FieldValue::Integer(400)));
        assert_eq!(first.get("Cs_host"), Some(&FieldValue::from("example.net")));
        assert_eq!(first.get("Ratio"), Some(&FieldValue::Real(0.5)));
        assert_eq!(first.get("Ok"), Some(&FieldValue::Boolean(false)));

        let second = &records[1];
        assert_eq!(second.get("Sc_status"), Some(&FieldValue::Integer(404)));
        assert_eq!(second.get("Cs_host"), Some(&FieldValue::Null));

        let names: Vec<_> = first.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["PreciseTimeStamp", "Sc_status", "Cs_host", "Ratio", "Ok"]
        );
    }

    #[test]
    fn test_parse_table_without_rows() {
        let records = parse_table(r#"{"columns": [{"name": "a"}]}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_table_rejects_ragged_rows() {
        let body = r#"{"columns": [{"name": "a"}, {"name": "b"}], "rows": [["x"]]}"#;
        let err = parse_table(body).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_parse_table_rejects_bad_datetime() {
        let body = r#"{"columns": [{"name": "t", "type": "datetime"}], "rows": [["yesterday"]]}"#;
        let err = parse_table(body).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid datetime"));
    }
}

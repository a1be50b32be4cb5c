//! # Remote ERP Client
//!
//! The calls the sync engine makes against the ERP: list records of a doc
//! type, fetch one full record, and create one.
//!
//! ## REST Convention
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LIST   GET  {base}/api/resource/{DocType}                              │
//! │              ?fields=["name","modified",...]                            │
//! │              &filters=[["modified",">","2024-05-01 09:30:00.000000"]]   │
//! │              &order_by=modified asc                                     │
//! │              &limit_start=0&limit_page_length=200                       │
//! │         ◄──  {"data": [{...}, {...}]}                                   │
//! │                                                                         │
//! │  GET    GET  {base}/api/resource/{DocType}/{name}                       │
//! │         ◄──  {"data": {... header ..., "items": [...], ...}}            │
//! │                                                                         │
//! │  CREATE POST {base}/api/resource/{DocType}   body: {...}                │
//! │         ◄──  {"data": {"name": "ACC-SINV-0001", "modified": "..."}}     │
//! │                                                                         │
//! │  Authorization: token <api_key>:<api_secret>                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Datetimes travel as naive `YYYY-MM-DD HH:MM:SS.ffffff` text and are read
//! as UTC.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use caja_core::DocType;

use crate::config::RemoteSettings;
use crate::error::{RemoteError, RemoteResult};

const ERP_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// =============================================================================
// Datetime Text
// =============================================================================

/// Formats a timestamp the way the ERP stores `modified`.
pub fn format_erp_datetime(at: DateTime<Utc>) -> String {
    at.naive_utc().format(ERP_DATETIME_FORMAT).to_string()
}

/// Parses an ERP datetime, with or without fractional seconds.
///
/// RFC 3339 text is accepted too.
pub fn parse_erp_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

// =============================================================================
// List Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// One page request against a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub doc_type: DocType,
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub limit_start: usize,
    pub page_length: usize,
}

impl ListQuery {
    pub fn new(doc_type: DocType, page_length: usize) -> Self {
        ListQuery {
            doc_type,
            fields: vec!["*".to_string()],
            filters: Vec::new(),
            order_by: Some("modified asc".to_string()),
            limit_start: 0,
            page_length,
        }
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Restricts the query to records modified strictly after `since`.
    pub fn modified_since(self, since: Option<DateTime<Utc>>) -> Self {
        match since {
            Some(at) => self.filter("modified", FilterOp::Gt, format_erp_datetime(at)),
            None => self,
        }
    }

    /// The value of an equality filter on `field`, if present.
    pub fn eq_value(&self, field: &str) -> Option<&Value> {
        self.filters
            .iter()
            .find(|f| f.field == field && f.op == FilterOp::Eq)
            .map(|f| &f.value)
    }

    fn filters_json(&self) -> Value {
        Value::Array(
            self.filters
                .iter()
                .map(|f| serde_json::json!([f.field, f.op.as_str(), f.value]))
                .collect(),
        )
    }
}

/// What the ERP returns for a created record.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAck {
    pub name: String,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteAck {
    pub fn from_value(value: &Value) -> RemoteResult<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| RemoteError::Decode("created record has no name".to_string()))?;
        let modified = value
            .get("modified")
            .and_then(Value::as_str)
            .and_then(parse_erp_datetime);
        Ok(RemoteAck {
            name: name.to_string(),
            modified,
        })
    }
}

// =============================================================================
// Remote Client Trait
// =============================================================================

/// The ERP as seen by sync units.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches one page.
    async fn list(&self, query: &ListQuery) -> RemoteResult<Vec<Value>>;

    /// Fetches one full record, child tables included.
    async fn get(&self, doc_type: DocType, name: &str) -> RemoteResult<Value>;

    /// Creates one record and returns its assigned name.
    async fn create(&self, doc_type: DocType, payload: &Value) -> RemoteResult<RemoteAck>;

    /// Pages through `query` until a short page comes back.
    async fn list_all(&self, query: &ListQuery) -> RemoteResult<Vec<Value>> {
        let page_length = query.page_length.max(1);
        let mut page = query.clone();
        page.page_length = page_length;

        let mut records = Vec::new();
        loop {
            let batch = self.list(&page).await?;
            let fetched = batch.len();
            records.extend(batch);
            if fetched < page_length {
                break;
            }
            page.limit_start += fetched;
        }
        Ok(records)
    }
}

// =============================================================================
// HTTP Implementation
// =============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// [`RemoteClient`] over the ERP's REST resource API.
#[derive(Debug, Clone)]
pub struct ErpHttpClient {
    base: Url,
    client: reqwest::Client,
}

impl ErpHttpClient {
    pub fn new(settings: &RemoteSettings) -> RemoteResult<Self> {
        let base = Url::parse(&settings.base_url)?;

        let mut headers = HeaderMap::new();
        if !settings.api_key.is_empty() {
            let token = format!("token {}:{}", settings.api_key, settings.api_secret);
            let mut value = HeaderValue::from_str(&token)
                .map_err(|e| RemoteError::Transport(format!("invalid credentials: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(ErpHttpClient { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn resource_url(&self, doc_type: DocType) -> RemoteResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "resource", doc_type.as_str()]);
        Ok(url)
    }

    pub(crate) fn record_url(&self, doc_type: DocType, name: &str) -> RemoteResult<Url> {
        let mut url = self.resource_url(doc_type)?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base.to_string()))?
            .push(name);
        Ok(url)
    }

    pub(crate) fn list_url(&self, query: &ListQuery) -> RemoteResult<Url> {
        let mut url = self.resource_url(query.doc_type)?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("fields", &Value::from(query.fields.clone()).to_string());
            if !query.filters.is_empty() {
                params.append_pair("filters", &query.filters_json().to_string());
            }
            if let Some(order_by) = &query.order_by {
                params.append_pair("order_by", order_by);
            }
            params.append_pair("limit_start", &query.limit_start.to_string());
            params.append_pair("limit_page_length", &query.page_length.to_string());
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl RemoteClient for ErpHttpClient {
    async fn list(&self, query: &ListQuery) -> RemoteResult<Vec<Value>> {
        let url = self.list_url(query)?;
        debug!(doc_type = %query.doc_type, start = query.limit_start, "GET list");

        let response = Self::check(self.client.get(url).send().await?).await?;
        let envelope: Envelope<Vec<Value>> = response.json().await?;
        Ok(envelope.data)
    }

    async fn get(&self, doc_type: DocType, name: &str) -> RemoteResult<Value> {
        let url = self.record_url(doc_type, name)?;
        debug!(doc_type = %doc_type, name = %name, "GET record");

        let response = Self::check(self.client.get(url).send().await?).await?;
        let envelope: Envelope<Value> = response.json().await?;
        Ok(envelope.data)
    }

    async fn create(&self, doc_type: DocType, payload: &Value) -> RemoteResult<RemoteAck> {
        let url = self.resource_url(doc_type)?;
        debug!(doc_type = %doc_type, "POST create");

        let response = Self::check(self.client.post(url).json(payload).send().await?).await?;
        let envelope: Envelope<Value> = response.json().await?;
        RemoteAck::from_value(&envelope.data)
    }
}

/// Pulls the useful part out of an ERP error body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("exception")
            .or_else(|| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match message {
        Some(message) => message,
        None => body.chars().take(200).collect(),
    }
}

// =============================================================================
// Scripted Fake (tests)
// =============================================================================

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// In-memory ERP: list answers come from `records`, creates are recorded.
    #[derive(Default)]
    pub struct FakeRemote {
        pub records: Mutex<HashMap<DocType, Vec<Value>>>,
        pub created: Mutex<Vec<(DocType, Value)>>,
        pub list_calls: Mutex<Vec<ListQuery>>,
        /// Errors returned by the next `create` calls, in order.
        pub create_failures: Mutex<VecDeque<RemoteError>>,
        /// Doc types whose list calls fail.
        pub failing_lists: Mutex<HashMap<DocType, RemoteError>>,
        /// Doc types whose list calls panic.
        pub panicking_lists: Mutex<Vec<DocType>>,
        counter: Mutex<u32>,
    }

    impl FakeRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_records(self, doc_type: DocType, records: Vec<Value>) -> Self {
            self.records.lock().unwrap().insert(doc_type, records);
            self
        }

        pub fn fail_next_create(&self, err: RemoteError) {
            self.create_failures.lock().unwrap().push_back(err);
        }

        pub fn fail_list(&self, doc_type: DocType, err: RemoteError) {
            self.failing_lists.lock().unwrap().insert(doc_type, err);
        }

        pub fn created_of(&self, doc_type: DocType) -> Vec<Value> {
            self.created
                .lock()
                .unwrap()
                .iter()
                .filter(|(d, _)| *d == doc_type)
                .map(|(_, v)| v.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RemoteClient for FakeRemote {
        async fn list(&self, query: &ListQuery) -> RemoteResult<Vec<Value>> {
            self.list_calls.lock().unwrap().push(query.clone());
            if self.panicking_lists.lock().unwrap().contains(&query.doc_type) {
                panic!("scripted panic for {}", query.doc_type);
            }
            if let Some(err) = self.failing_lists.lock().unwrap().get(&query.doc_type) {
                return Err(err.clone());
            }

            let records = self.records.lock().unwrap();
            let all = records.get(&query.doc_type).cloned().unwrap_or_default();
            let matching: Vec<Value> = all
                .into_iter()
                .filter(|record| {
                    query.filters.iter().all(|f| match f.op {
                        FilterOp::Eq => record.get(&f.field) == Some(&f.value),
                        FilterOp::Gt | FilterOp::Gte => {
                            let (Some(have), Some(want)) = (
                                record.get(&f.field).and_then(Value::as_str),
                                f.value.as_str(),
                            ) else {
                                return false;
                            };
                            if f.op == FilterOp::Gt {
                                have > want
                            } else {
                                have >= want
                            }
                        }
                    })
                })
                .collect();
            Ok(matching
                .into_iter()
                .skip(query.limit_start)
                .take(query.page_length)
                .collect())
        }

        async fn get(&self, doc_type: DocType, name: &str) -> RemoteResult<Value> {
            self.records
                .lock()
                .unwrap()
                .get(&doc_type)
                .and_then(|records| {
                    records
                        .iter()
                        .find(|r| r.get("name").and_then(Value::as_str) == Some(name))
                        .cloned()
                })
                .ok_or_else(|| RemoteError::Status {
                    status: 404,
                    message: format!("{} {} not found", doc_type, name),
                })
        }

        async fn create(&self, doc_type: DocType, payload: &Value) -> RemoteResult<RemoteAck> {
            if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
                return Err(err);
            }

            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            let name = format!("{}-{:04}", doc_type.local_prefix().unwrap_or("DOC"), *counter);
            let modified = "2024-05-01 12:00:00.000000";

            let mut stored = payload.clone();
            if let Some(obj) = stored.as_object_mut() {
                obj.insert("name".into(), Value::from(name.clone()));
                obj.insert("modified".into(), Value::from(modified));
            }
            self.records
                .lock()
                .unwrap()
                .entry(doc_type)
                .or_default()
                .push(stored);
            self.created.lock().unwrap().push((doc_type, payload.clone()));

            Ok(RemoteAck {
                name,
                modified: parse_erp_datetime(modified),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::fake::FakeRemote;
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn client() -> ErpHttpClient {
        ErpHttpClient::new(&RemoteSettings {
            base_url: "https://erp.example.com/".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_erp_datetime_text() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(format_erp_datetime(at), "2024-05-01 09:30:00.000000");
        assert_eq!(parse_erp_datetime("2024-05-01 09:30:00.000000"), Some(at));
        assert_eq!(parse_erp_datetime("2024-05-01 09:30:00"), Some(at));
        assert_eq!(parse_erp_datetime("2024-05-01T09:30:00Z"), Some(at));
        assert_eq!(parse_erp_datetime("yesterday"), None);
    }

    #[test]
    fn test_list_url_encodes_doctype_and_filters() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let query = ListQuery::new(DocType::SalesInvoice, 50)
            .fields(&["name", "modified"])
            .modified_since(Some(since));

        let url = client().list_url(&query).unwrap();
        assert_eq!(url.path(), "/api/resource/Sales%20Invoice");

        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["fields"], r#"["name","modified"]"#);
        assert_eq!(
            pairs["filters"],
            r#"[["modified",">","2024-05-01 09:30:00.000000"]]"#
        );
        assert_eq!(pairs["order_by"], "modified asc");
        assert_eq!(pairs["limit_page_length"], "50");
    }

    #[test]
    fn test_record_url_escapes_name() {
        let url = client().record_url(DocType::Customer, "Ana / Hija").unwrap();
        assert_eq!(url.path(), "/api/resource/Customer/Ana%20%2F%20Hija");
    }

    #[test]
    fn test_full_pull_has_no_filters() {
        let query = ListQuery::new(DocType::Item, 10).modified_since(None);
        let url = client().list_url(&query).unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "filters"));
    }

    #[test]
    fn test_ack_requires_name() {
        let ack = RemoteAck::from_value(&json!({"name": "ACC-SINV-0001", "modified": "2024-05-01 10:00:00.5"}))
            .unwrap();
        assert_eq!(ack.name, "ACC-SINV-0001");
        assert!(ack.modified.is_some());

        assert!(matches!(
            RemoteAck::from_value(&json!({"modified": "2024-05-01 10:00:00"})),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn test_error_message_prefers_exception() {
        let body = r#"{"exception": "frappe.exceptions.ValidationError: Customer is disabled"}"#;
        assert_eq!(
            error_message(body),
            "frappe.exceptions.ValidationError: Customer is disabled"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_list_all_pages_until_short_page() {
        let records: Vec<Value> = (0..5)
            .map(|i| json!({"name": format!("ITEM-{}", i), "modified": "2024-05-01 10:00:00"}))
            .collect();
        let remote = FakeRemote::new().with_records(DocType::Item, records);

        let all = remote
            .list_all(&ListQuery::new(DocType::Item, 2))
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        // 2 + 2 + 1
        assert_eq!(remote.list_calls.lock().unwrap().len(), 3);
    }
}

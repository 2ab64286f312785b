use crate::adapters::service_account::ServiceAccountKey;
use crate::domain::model::CustomerRecord;
use crate::domain::ports::RecordSource;
use crate::utils::error::{transport_detail, NotifierError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";
const SOURCE_NAME: &str = "firestore";

/// Firestore 請求的身分；模擬器不需要
#[derive(Debug, Clone, Default)]
pub enum FirestoreAuth {
    #[default]
    None,
    AccessToken(String),
    ServiceAccount(ServiceAccountKey),
}

#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub collection: String,
    pub endpoint: String,
    pub auth: FirestoreAuth,
    pub page_size: usize,
    pub timeout: Duration,
}

impl FirestoreSettings {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: "customers".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: FirestoreAuth::None,
            page_size: 300,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// 透過 Firestore REST API 讀取整個 collection（自動翻頁）
pub struct FirestoreSource {
    settings: FirestoreSettings,
    client: Client,
}

impl FirestoreSource {
    pub fn new(settings: FirestoreSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.project_id,
            self.settings.collection
        )
    }

    /// 每次讀取只換一次 token，翻頁時共用
    async fn bearer_token(&self) -> Result<Option<String>> {
        match &self.settings.auth {
            FirestoreAuth::None => Ok(None),
            FirestoreAuth::AccessToken(token) => Ok(Some(token.clone())),
            FirestoreAuth::ServiceAccount(key) => key.exchange(&self.client).await.map(Some),
        }
    }

    async fn fetch_page(
        &self,
        page_size: usize,
        page_token: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<ListDocumentsResponse> {
        let mut request = self
            .client
            .get(self.collection_url())
            .query(&[("pageSize", page_size.to_string())]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifierError::source_unavailable(SOURCE_NAME, transport_detail(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::source_unavailable(
                SOURCE_NAME,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        response
            .json::<ListDocumentsResponse>()
            .await
            .map_err(|e| NotifierError::source_unavailable(SOURCE_NAME, format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl RecordSource for FirestoreSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
        let bearer = self.bearer_token().await?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page = self
                .fetch_page(self.settings.page_size, page_token.as_deref(), bearer.as_deref())
                .await?;
            tracing::debug!("Fetched {} documents from Firestore", page.documents.len());
            records.extend(page.documents.into_iter().map(decode_document));

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    // 同一個 token 再出現代表翻頁沒有前進
                    if !seen_tokens.insert(token.clone()) {
                        return Err(NotifierError::source_unavailable(
                            SOURCE_NAME,
                            format!("pagination did not advance (page token '{}' repeated)", token),
                        ));
                    }
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(records)
    }

    async fn sample(&self) -> Result<usize> {
        let bearer = self.bearer_token().await?;
        let page = self.fetch_page(1, None, bearer.as_deref()).await?;
        Ok(page.documents.len())
    }
}

/// Firestore 的型別化欄位值轉成字串；map/array 等不支援的型別視為沒有值
fn field_as_string(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get("stringValue").and_then(Value::as_str) {
        return Some(v.to_string());
    }
    if let Some(v) = obj.get("timestampValue").and_then(Value::as_str) {
        return Some(v.to_string());
    }
    if let Some(v) = obj.get("integerValue") {
        return v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string()));
    }
    if let Some(v) = obj.get("doubleValue").and_then(Value::as_f64) {
        return Some(v.to_string());
    }
    None
}

fn decode_document(doc: Document) -> CustomerRecord {
    let field = |key: &str| doc.fields.get(key).and_then(field_as_string);
    let id = doc
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    CustomerRecord {
        id,
        full_name: field("fullName").unwrap_or_default(),
        handle: field("instagramHandle").or_else(|| field("handle")),
        birthday: field("birthday"),
        phone: field("phone"),
        email: field("email"),
    }
}

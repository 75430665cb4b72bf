use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Document, DocumentStore};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const TOKEN_LIFETIME_SECONDS: i64 = 3600;
const TOKEN_EXPIRY_LEEWAY_SECONDS: i64 = 60;
const LIST_PAGE_SIZE: u32 = 300;

/// Credentials loaded from a Google service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
    pub project_id: String,
}

impl ServiceAccountKey {
    pub async fn from_file(path: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read service account key '{path}'"))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed service account key '{path}'"))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Firestore REST backend. Authenticates with a service-account JWT
/// assertion exchanged for a cached OAuth bearer token.
pub struct FirestoreStore {
    http: Client,
    key: ServiceAccountKey,
    project_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl FirestoreStore {
    pub fn new(key: ServiceAccountKey) -> Self {
        let project_id = key.project_id.clone();
        Self {
            http: Client::new(),
            key,
            project_id,
            token: Mutex::new(None),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{FIRESTORE_BASE_URL}/projects/{}/databases/(default)/documents/{collection}",
            self.project_id
        )
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_EXPIRY_LEEWAY_SECONDS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = mint_assertion(&self.key, now)?;
        let response: TokenResponse = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("token endpoint unreachable")?
            .error_for_status()
            .context("token exchange rejected")?
            .json()
            .await
            .context("malformed token response")?;

        debug!(expires_in = response.expires_in, "firestore token refreshed");
        let token = CachedToken {
            access_token: response.access_token.clone(),
            expires_at: now + Duration::seconds(response.expires_in),
        };
        *cached = Some(token);
        Ok(response.access_token)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<String> {
        let token = self.bearer_token().await?;
        let created: FirestoreDocument = self
            .http
            .post(self.collection_url(collection))
            .bearer_auth(token)
            .json(&json!({ "fields": encode_fields(&document)? }))
            .send()
            .await
            .context("document store unreachable")?
            .error_for_status()
            .context("document create rejected")?
            .json()
            .await
            .context("malformed create response")?;
        id_from_document_name(&created.name)
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(format!("{}/{id}", self.collection_url(collection)))
            .bearer_auth(token)
            .send()
            .await
            .context("document store unreachable")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: FirestoreDocument = response
            .error_for_status()
            .context("document read rejected")?
            .json()
            .await
            .context("malformed document response")?;
        let fields = document.fields.unwrap_or_else(|| json!({}));
        Ok(Some(decode_fields(&fields)?))
    }

    async fn apply(&self, collection: &str, id: &str, fields: Document) -> Result<bool> {
        let token = self.bearer_token().await?;
        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.clone()))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let response = self
            .http
            .patch(format!("{}/{id}", self.collection_url(collection)))
            .bearer_auth(token)
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields)? }))
            .send()
            .await
            .context("document store unreachable")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response
            .error_for_status()
            .context("document update rejected")?;
        Ok(true)
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let token = self.bearer_token().await?;
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(page) = page_token.as_ref() {
                query.push(("pageToken", page.clone()));
            }
            let page: ListDocumentsResponse = self
                .http
                .get(self.collection_url(collection))
                .bearer_auth(token)
                .query(&query)
                .send()
                .await
                .context("document store unreachable")?
                .error_for_status()
                .context("document list rejected")?
                .json()
                .await
                .context("malformed list response")?;

            for document in page.documents {
                let id = id_from_document_name(&document.name)?;
                let fields = document.fields.unwrap_or_else(|| json!({}));
                documents.push((id, decode_fields(&fields)?));
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(documents)
    }

    async fn ping(&self) -> Result<()> {
        let token = self.bearer_token().await?;
        self.http
            .get(self.collection_url(crate::GRIEVANCE_COLLECTION))
            .bearer_auth(token)
            .query(&[("pageSize", "1")])
            .send()
            .await
            .context("document store unreachable")?
            .error_for_status()
            .context("document store rejected ping")?;
        Ok(())
    }
}

fn mint_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let issued_at = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FIRESTORE_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + TOKEN_LIFETIME_SECONDS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("service account private key is not valid RSA PEM")?;
    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .context("failed to sign token assertion")
}

fn id_from_document_name(name: &str) -> Result<String> {
    name.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("document name '{name}' carries no id segment"))
}

/// Wraps each flat document value in Firestore's typed value envelope.
fn encode_fields(document: &Document) -> Result<Value> {
    let mut fields = serde_json::Map::new();
    for (key, value) in document {
        fields.insert(key.clone(), encode_value(key, value)?);
    }
    Ok(Value::Object(fields))
}

fn encode_value(key: &str, value: &Value) -> Result<Value> {
    let wrapped = match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                // Firestore carries 64-bit integers as decimal strings.
                json!({ "integerValue": int.to_string() })
            } else {
                json!({ "doubleValue": number.as_f64() })
            }
        }
        Value::Array(_) | Value::Object(_) => {
            bail!("field '{key}' is not a scalar; documents are flat maps")
        }
    };
    Ok(wrapped)
}

fn decode_fields(fields: &Value) -> Result<Document> {
    let Value::Object(entries) = fields else {
        bail!("document fields payload is not an object");
    };
    let mut document = Document::new();
    for (key, wrapped) in entries {
        document.insert(key.clone(), decode_value(key, wrapped)?);
    }
    Ok(document)
}

fn decode_value(key: &str, wrapped: &Value) -> Result<Value> {
    let Value::Object(envelope) = wrapped else {
        bail!("field '{key}' is not a typed value envelope");
    };
    let (kind, inner) = envelope
        .iter()
        .next()
        .ok_or_else(|| anyhow!("field '{key}' has an empty value envelope"))?;
    let value = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.clone(),
        "stringValue" | "timestampValue" => inner.clone(),
        "integerValue" => {
            let text = inner
                .as_str()
                .ok_or_else(|| anyhow!("field '{key}' integerValue is not a string"))?;
            let parsed: i64 = text
                .parse()
                .with_context(|| format!("field '{key}' integerValue '{text}' is not an i64"))?;
            Value::from(parsed)
        }
        "doubleValue" => inner.clone(),
        other => bail!("field '{key}' has unsupported value kind '{other}'"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_into_typed_envelopes() {
        let mut document = Document::new();
        document.insert("name".into(), Value::from("A"));
        document.insert("anonymous".into(), Value::from(false));
        document.insert("attempts".into(), Value::from(3));

        let fields = encode_fields(&document).expect("encode");
        assert_eq!(fields["name"]["stringValue"], "A");
        assert_eq!(fields["anonymous"]["booleanValue"], false);
        assert_eq!(fields["attempts"]["integerValue"], "3");
    }

    #[test]
    fn decode_round_trips_encoded_document() {
        let mut document = Document::new();
        document.insert("status".into(), Value::from("Pending"));
        document.insert("anonymous".into(), Value::from(true));
        document.insert("weight".into(), Value::from(1.5));

        let fields = encode_fields(&document).expect("encode");
        let decoded = decode_fields(&fields).expect("decode");
        assert_eq!(decoded, document);
    }

    #[test]
    fn rejects_nested_values() {
        let mut document = Document::new();
        document.insert("nested".into(), json!({ "inner": 1 }));
        let err = encode_fields(&document).expect_err("nested must fail");
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn rejects_unknown_envelope_kind() {
        let fields = json!({ "blob": { "bytesValue": "AAAA" } });
        assert!(decode_fields(&fields).is_err());
    }

    #[test]
    fn extracts_id_from_full_document_name() {
        let name = "projects/p/databases/(default)/documents/grievances/abc123";
        assert_eq!(id_from_document_name(name).expect("id"), "abc123");
    }

    #[test]
    fn decodes_timestamp_values_as_strings() {
        let fields = json!({ "submitted_at": { "timestampValue": "2024-05-01T10:00:00Z" } });
        let decoded = decode_fields(&fields).expect("decode");
        assert_eq!(decoded["submitted_at"], "2024-05-01T10:00:00Z");
    }
}

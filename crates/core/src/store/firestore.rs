//! Firestore REST client and the stores built on it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use super::value::{decode_fields, encode_fields};
use super::{PermissionStore, UserStore};
use crate::credentials::{AdminHandle, Service};
use crate::errors::StoreError;
use crate::http::{check_response, decode_json};
use crate::models::{AppUser, NewAppUser, RawDocument};

const SERVICE: &str = "firestore";

/// Page size for collection listings.
const LIST_PAGE_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn into_raw(self) -> Result<RawDocument, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let fields = decode_fields(&self.fields).map_err(|detail| StoreError::Decode {
            service: SERVICE,
            detail: format!("document {}: {detail}", self.name),
        })?;
        Ok(RawDocument { id, fields })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin Firestore REST client bound to one project and database.
#[derive(Clone)]
pub struct FirestoreDocuments {
    handle: Arc<AdminHandle>,
}

impl FirestoreDocuments {
    pub fn new(handle: Arc<AdminHandle>) -> Self {
        Self { handle }
    }

    fn documents_url(&self) -> String {
        let endpoints = self.handle.endpoints();
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            endpoints.firestore_url,
            self.handle.project_id(),
            endpoints.database
        )
    }

    async fn token(&self) -> Result<String, StoreError> {
        Ok(self.handle.bearer_token(Service::Firestore).await?)
    }

    /// Documents in `collection` whose string field `field` equals `value`,
    /// at most `limit` of them.
    #[instrument(skip(self))]
    pub async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: u32,
    ) -> Result<Vec<RawDocument>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": { "stringValue": value }
                    }
                },
                "limit": limit
            }
        });
        let resp = self
            .handle
            .http()
            .post(format!("{}:runQuery", self.documents_url()))
            .bearer_auth(self.token().await?)
            .json(&body)
            .send()
            .await?;
        let items: Vec<RunQueryItem> =
            decode_json(SERVICE, check_response(SERVICE, resp).await?).await?;
        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(Document::into_raw)
            .collect()
    }

    /// Overwrite only the listed fields of an existing document.
    #[instrument(skip(self, fields))]
    pub async fn patch_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let resp = self
            .handle
            .http()
            .patch(format!("{}/{}/{}", self.documents_url(), collection, id))
            .bearer_auth(self.token().await?)
            .query(&query)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        check_response(SERVICE, resp).await?;
        Ok(())
    }

    /// Create a document with a generated id.
    #[instrument(skip(self, fields))]
    pub async fn create(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<RawDocument, StoreError> {
        let resp = self
            .handle
            .http()
            .post(format!("{}/{}", self.documents_url(), collection))
            .bearer_auth(self.token().await?)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        let doc: Document = decode_json(SERVICE, check_response(SERVICE, resp).await?).await?;
        doc.into_raw()
    }
}

#[async_trait]
impl PermissionStore for FirestoreDocuments {
    #[instrument(skip(self))]
    async fn list_documents(&self, collection: &str) -> Result<Vec<RawDocument>, StoreError> {
        let url = format!("{}/{}", self.documents_url(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .handle
                .http()
                .get(&url)
                .bearer_auth(self.token().await?)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let page: ListDocumentsResponse =
                decode_json(SERVICE, check_response(SERVICE, req.send().await?).await?).await?;

            for doc in page.documents {
                documents.push(doc.into_raw()?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = documents.len(), "listed documents");
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError> {
        let resp = self
            .handle
            .http()
            .get(format!("{}/{}/{}", self.documents_url(), collection, id))
            .bearer_auth(self.token().await?)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("document not found");
            return Ok(None);
        }
        let doc: Document = decode_json(SERVICE, check_response(SERVICE, resp).await?).await?;
        Ok(Some(doc.into_raw()?))
    }
}

// ---------------------------------------------------------------------------
// User store
// ---------------------------------------------------------------------------

/// Application users kept in a Firestore collection.
#[derive(Clone)]
pub struct FirestoreUserStore {
    documents: FirestoreDocuments,
    collection: String,
}

impl FirestoreUserStore {
    pub fn new(handle: Arc<AdminHandle>, collection: impl Into<String>) -> Self {
        Self {
            documents: FirestoreDocuments::new(handle),
            collection: collection.into(),
        }
    }
}

fn decode_user(doc: RawDocument) -> Result<AppUser, StoreError> {
    let id = doc.id;
    let mut user: AppUser =
        serde_json::from_value(Value::Object(doc.fields)).map_err(|e| StoreError::Decode {
            service: SERVICE,
            detail: format!("user {id}: {e}"),
        })?;
    user.id = id;
    Ok(user)
}

#[async_trait]
impl UserStore for FirestoreUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError> {
        // Two is enough to tell "unique" from "ambiguous".
        let mut matches = self
            .documents
            .query_equal(&self.collection, "email", email, 2)
            .await?;
        match matches.len() {
            0 => Ok(None),
            1 => decode_user(matches.remove(0)).map(Some),
            count => Err(StoreError::AmbiguousEmail {
                email: email.to_string(),
                count,
            }),
        }
    }

    async fn update_google_id(&self, user_id: &str, google_id: &str) -> Result<(), StoreError> {
        let mut fields = Map::new();
        fields.insert("googleId".into(), Value::String(google_id.to_string()));
        self.documents
            .patch_fields(&self.collection, user_id, &fields)
            .await?;
        info!(user_id, google_id, "updated user link");
        Ok(())
    }

    async fn upsert(&self, user: NewAppUser) -> Result<AppUser, StoreError> {
        let fields = match serde_json::to_value(&user) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                return Err(StoreError::Decode {
                    service: SERVICE,
                    detail: format!("user did not serialize to an object: {other}"),
                })
            }
            Err(e) => {
                return Err(StoreError::Decode {
                    service: SERVICE,
                    detail: e.to_string(),
                })
            }
        };
        let doc = self.documents.create(&self.collection, &fields).await?;
        info!(user_id = %doc.id, email = %user.email, "created user");
        Ok(user.into_app_user(doc.id))
    }
}

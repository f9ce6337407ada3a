//! Firebase Auth user listing through the Identity Toolkit REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::IdentitySource;
use crate::credentials::{AdminHandle, Service};
use crate::errors::StoreError;
use crate::http::{check_response, decode_json};
use crate::models::{IdentityPage, IdentityRecord};

const SERVICE: &str = "identitytoolkit";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    users: Vec<UserInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

impl From<UserInfo> for IdentityRecord {
    fn from(user: UserInfo) -> Self {
        Self {
            id: user.local_id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
        }
    }
}

/// The project's Firebase Auth user directory.
#[derive(Clone)]
pub struct FirebaseAuthDirectory {
    handle: Arc<AdminHandle>,
}

impl FirebaseAuthDirectory {
    pub fn new(handle: Arc<AdminHandle>) -> Self {
        Self { handle }
    }

    fn batch_get_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/accounts:batchGet",
            self.handle.endpoints().identity_toolkit_url,
            self.handle.project_id()
        )
    }
}

#[async_trait]
impl IdentitySource for FirebaseAuthDirectory {
    #[instrument(skip(self))]
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<IdentityPage, StoreError> {
        let token = self.handle.bearer_token(Service::IdentityToolkit).await?;
        let mut req = self
            .handle
            .http()
            .get(self.batch_get_url())
            .bearer_auth(token)
            .query(&[("maxResults", page_size.to_string())]);
        if let Some(page_token) = page_token {
            req = req.query(&[("nextPageToken", page_token)]);
        }

        let resp = check_response(SERVICE, req.send().await?).await?;
        let body: BatchGetResponse = decode_json(SERVICE, resp).await?;

        let page = IdentityPage {
            records: body.users.into_iter().map(IdentityRecord::from).collect(),
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        };
        debug!(
            count = page.records.len(),
            has_more = page.next_page_token.is_some(),
            "fetched identity page"
        );
        Ok(page)
    }
}

//! Read-only inspection of sidebar permission documents.
//!
//! Documents come in two shapes and are classified once, when they are read:
//!
//! - collection mode: each document holds one user's `email` and a flat
//!   `sidebar` capability map ([`PermissionRecord::SingleUserSidebar`]);
//! - document mode: one document maps email addresses to capability maps
//!   ([`PermissionRecord::MultiUserSidebarMap`]).
//!
//! Capabilities render in [`CANONICAL_CAPABILITIES`] order followed by any
//! other keys in ascending order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::models::RawDocument;
use crate::store::PermissionStore;

/// Known sidebar capabilities, in display order.
pub const CANONICAL_CAPABILITIES: [&str; 8] = [
    "settings",
    "projects-summary",
    "dashboard",
    "financial-dashboard",
    "document-search",
    "n8n-vector-search",
    "ai-search",
    "projects/info-center",
];

/// Shown for a single-user document with no `email` field.
pub const NO_EMAIL_PLACEHOLDER: &str = "(no email)";

// ---------------------------------------------------------------------------
// Capability maps
// ---------------------------------------------------------------------------

/// Capability name -> enabled flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap(BTreeMap<String, bool>);

impl CapabilityMap {
    /// Keep the boolean members of a JSON object; others are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self(
            object
                .iter()
                .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                .collect(),
        )
    }

    pub fn get(&self, capability: &str) -> Option<bool> {
        self.0.get(capability).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every canonical capability (absent ones as `None`), then the remaining
    /// keys in ascending order.
    pub fn ordered(&self) -> Vec<(&str, Option<bool>)> {
        let mut out: Vec<(&str, Option<bool>)> = CANONICAL_CAPABILITIES
            .iter()
            .map(|&key| (key, self.get(key)))
            .collect();
        // BTreeMap iteration is already ascending.
        out.extend(
            self.0
                .iter()
                .filter(|(k, _)| !CANONICAL_CAPABILITIES.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), Some(*v))),
        );
        out
    }
}

impl FromIterator<(String, bool)> for CapabilityMap {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A permission document after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRecord {
    SingleUserSidebar {
        doc_id: String,
        email: String,
        capabilities: CapabilityMap,
    },
    MultiUserSidebarMap {
        doc_id: String,
        entries: BTreeMap<String, CapabilityMap>,
    },
}

impl PermissionRecord {
    /// Classify a document holding one user's `email` and `sidebar` map.
    pub fn single_user(doc: RawDocument) -> Self {
        let email = doc
            .fields
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .unwrap_or(NO_EMAIL_PLACEHOLDER)
            .to_string();
        let capabilities = doc
            .fields
            .get("sidebar")
            .and_then(Value::as_object)
            .map(CapabilityMap::from_object)
            .unwrap_or_default();
        Self::SingleUserSidebar {
            doc_id: doc.id,
            email,
            capabilities,
        }
    }

    /// Classify a document mapping emails to capability maps. Only top-level
    /// fields whose value is an object with at least one boolean member count.
    pub fn multi_user(doc: RawDocument) -> Self {
        let entries = doc
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let object = value.as_object()?;
                let capabilities = CapabilityMap::from_object(object);
                (!capabilities.is_empty()).then(|| (key.clone(), capabilities))
            })
            .collect();
        Self::MultiUserSidebarMap {
            doc_id: doc.id,
            entries,
        }
    }

    pub fn doc_id(&self) -> &str {
        match self {
            Self::SingleUserSidebar { doc_id, .. } | Self::MultiUserSidebarMap { doc_id, .. } => {
                doc_id
            }
        }
    }
}

fn write_capabilities(f: &mut fmt::Formatter<'_>, map: &CapabilityMap) -> fmt::Result {
    for (key, value) in map.ordered() {
        match value {
            Some(enabled) => writeln!(f, "    {key}: {enabled}")?,
            None => writeln!(f, "    {key}: unset")?,
        }
    }
    Ok(())
}

impl fmt::Display for PermissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleUserSidebar {
                doc_id,
                email,
                capabilities,
            } => {
                writeln!(f, "Document: {doc_id}")?;
                writeln!(f, "  Email: {email}")?;
                write_capabilities(f, capabilities)
            }
            Self::MultiUserSidebarMap { doc_id, entries } => {
                writeln!(f, "Document: {doc_id}")?;
                if entries.is_empty() {
                    return writeln!(f, "  (no capability maps found)");
                }
                for (email, capabilities) in entries {
                    writeln!(f, "  Email: {email}")?;
                    write_capabilities(f, capabilities)?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inspector
// ---------------------------------------------------------------------------

/// Result of an inspection. A missing document is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectOutcome {
    Collection {
        collection: String,
        records: Vec<PermissionRecord>,
    },
    Document {
        collection: String,
        record: PermissionRecord,
    },
    NotFound {
        collection: String,
        doc_id: String,
    },
}

impl fmt::Display for InspectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection {
                collection,
                records,
            } => {
                writeln!(f, "Collection: {collection} ({} document(s))", records.len())?;
                for record in records {
                    writeln!(f)?;
                    write!(f, "{record}")?;
                }
                Ok(())
            }
            Self::Document { collection, record } => {
                writeln!(f, "Collection: {collection}")?;
                writeln!(f)?;
                write!(f, "{record}")
            }
            Self::NotFound { collection, doc_id } => {
                writeln!(f, "Document '{doc_id}' not found in collection '{collection}'")
            }
        }
    }
}

/// Read-only walker over a permission collection.
pub struct PermissionInspector {
    store: Arc<dyn PermissionStore>,
}

impl PermissionInspector {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Inspect one document when `doc_id` is given, otherwise the whole
    /// collection.
    pub async fn inspect(
        &self,
        collection: &str,
        doc_id: Option<&str>,
    ) -> Result<InspectOutcome, StoreError> {
        match doc_id {
            Some(id) => self.inspect_document(collection, id).await,
            None => self.inspect_collection(collection).await,
        }
    }

    pub async fn inspect_collection(&self, collection: &str) -> Result<InspectOutcome, StoreError> {
        info!(collection, "inspecting permission collection");
        let records: Vec<PermissionRecord> = self
            .store
            .list_documents(collection)
            .await?
            .into_iter()
            .map(PermissionRecord::single_user)
            .collect();
        debug!(count = records.len(), "classified permission documents");
        Ok(InspectOutcome::Collection {
            collection: collection.to_string(),
            records,
        })
    }

    pub async fn inspect_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<InspectOutcome, StoreError> {
        info!(collection, doc_id, "inspecting permission document");
        match self.store.get_document(collection, doc_id).await? {
            Some(doc) => Ok(InspectOutcome::Document {
                collection: collection.to_string(),
                record: PermissionRecord::multi_user(doc),
            }),
            None => {
                info!(collection, doc_id, "permission document not found");
                Ok(InspectOutcome::NotFound {
                    collection: collection.to_string(),
                    doc_id: doc_id.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPermissionStore;
    use serde_json::json;

    fn raw(id: &str, fields: Value) -> RawDocument {
        RawDocument {
            id: id.into(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_canonical_keys_first_then_sorted_extras() {
        let map: CapabilityMap = [
            ("zeta".to_string(), true),
            ("ai-search".to_string(), false),
            ("alpha".to_string(), true),
            ("settings".to_string(), true),
        ]
        .into_iter()
        .collect();

        let keys: Vec<&str> = map.ordered().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "settings",
                "projects-summary",
                "dashboard",
                "financial-dashboard",
                "document-search",
                "n8n-vector-search",
                "ai-search",
                "projects/info-center",
                "alpha",
                "zeta",
            ]
        );
        let ordered = map.ordered();
        assert_eq!(ordered[0], ("settings", Some(true)));
        assert_eq!(ordered[1], ("projects-summary", None));
        assert_eq!(ordered[6], ("ai-search", Some(false)));
    }

    #[test]
    fn test_single_user_classification() {
        let record = PermissionRecord::single_user(raw(
            "p1",
            json!({
                "email": "a@x.com",
                "sidebar": { "dashboard": true, "label": "ignored" }
            }),
        ));
        match record {
            PermissionRecord::SingleUserSidebar {
                email,
                capabilities,
                ..
            } => {
                assert_eq!(email, "a@x.com");
                assert_eq!(capabilities.len(), 1);
                assert_eq!(capabilities.get("dashboard"), Some(true));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_single_user_without_email_uses_placeholder() {
        let record = PermissionRecord::single_user(raw("p2", json!({ "sidebar": {} })));
        assert!(matches!(
            record,
            PermissionRecord::SingleUserSidebar { ref email, .. } if email == NO_EMAIL_PLACEHOLDER
        ));
    }

    #[test]
    fn test_multi_user_keeps_only_boolean_maps() {
        let record = PermissionRecord::multi_user(raw(
            "all",
            json!({
                "a@x.com": { "settings": true, "note": "x" },
                "b@x.com": { "note": "no flags" },
                "updatedBy": "admin",
                "c@x.com": { "dashboard": false }
            }),
        ));
        match record {
            PermissionRecord::MultiUserSidebarMap { entries, .. } => {
                let emails: Vec<&String> = entries.keys().collect();
                assert_eq!(emails, vec!["a@x.com", "c@x.com"]);
                assert_eq!(entries["c@x.com"].get("dashboard"), Some(false));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_render_single_user() {
        let record = PermissionRecord::single_user(raw(
            "p1",
            json!({ "email": "a@x.com", "sidebar": { "custom": true, "settings": false } }),
        ));
        let rendered = record.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Document: p1");
        assert_eq!(lines[1], "  Email: a@x.com");
        assert_eq!(lines[2], "    settings: false");
        assert_eq!(lines[3], "    projects-summary: unset");
        assert_eq!(lines.last().copied(), Some("    custom: true"));
    }

    #[tokio::test]
    async fn test_document_mode_not_found() {
        let inspector = PermissionInspector::new(Arc::new(MemoryPermissionStore::new()));
        let outcome = inspector
            .inspect("userPermissions", Some("missing"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InspectOutcome::NotFound {
                collection: "userPermissions".into(),
                doc_id: "missing".into(),
            }
        );
        assert!(outcome.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_collection_mode_reads_every_document() {
        let store = MemoryPermissionStore::new()
            .with_document(
                "userPermissions",
                "p1",
                json!({ "email": "a@x.com", "sidebar": { "dashboard": true } }),
            )
            .with_document("userPermissions", "p2", json!({ "sidebar": { "settings": true } }))
            .with_document("other", "o1", json!({ "email": "z@x.com" }));
        let inspector = PermissionInspector::new(Arc::new(store));

        let outcome = inspector.inspect("userPermissions", None).await.unwrap();
        match outcome {
            InspectOutcome::Collection { records, .. } => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].doc_id(), "p1");
                match &records[1] {
                    PermissionRecord::SingleUserSidebar { email, .. } => {
                        assert_eq!(email, NO_EMAIL_PLACEHOLDER)
                    }
                    other => panic!("unexpected record {other:?}"),
                }
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_document_mode_classifies_email_map() {
        let store = MemoryPermissionStore::new().with_document(
            "userPermissions",
            "sidebar",
            json!({ "a@x.com": { "ai-search": true } }),
        );
        let inspector = PermissionInspector::new(Arc::new(store));

        let outcome = inspector
            .inspect("userPermissions", Some("sidebar"))
            .await
            .unwrap();
        let rendered = outcome.to_string();
        assert!(rendered.contains("Email: a@x.com"));
        assert!(rendered.contains("ai-search: true"));
    }
}

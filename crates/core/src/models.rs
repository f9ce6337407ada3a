//! Domain model types shared by the identity source, the user store, the
//! reconciliation engine, and the permission inspector.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity source
// ---------------------------------------------------------------------------

/// One user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl IdentityRecord {
    /// The email, if present and non-blank.
    pub fn usable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// One page of a paginated identity listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPage {
    pub records: Vec<IdentityRecord>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Application users
// ---------------------------------------------------------------------------

/// Application role of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    /// Any role this tool does not model. Existing roles are never rewritten.
    #[serde(other)]
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A stored application user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    /// Store-assigned id (not part of the stored fields).
    #[serde(skip)]
    pub id: String,
    pub email: String,
    /// Identity provider id this profile is linked to.
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields for a user about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppUser {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
}

impl NewAppUser {
    /// Build the profile for an identity that has no application user yet.
    pub fn from_identity(identity: &IdentityRecord, email: &str) -> Self {
        Self {
            google_id: identity.id.clone(),
            email: email.to_string(),
            name: identity.display_name.clone().unwrap_or_default(),
            picture: identity.photo_url.clone(),
            role: Role::User,
        }
    }

    /// The stored form, once the store has assigned an id.
    pub fn into_app_user(self, id: String) -> AppUser {
        AppUser {
            id,
            email: self.email,
            google_id: Some(self.google_id),
            name: self.name,
            picture: self.picture,
            role: self.role,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw documents
// ---------------------------------------------------------------------------

/// A document from a document store, with its fields decoded to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

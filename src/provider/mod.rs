//! Paginated read access to an identity provider pool.

use thiserror::Error;

pub mod snapshot;

pub use self::snapshot::SnapshotProvider;

/// Username prefix of the placeholder users that carry a group's gid.
pub const GROUP_OWNER_PREFIX: &str = "g:";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("user pool {0} not found")]
    UnknownPool(String),

    #[error("group {group} not found in user pool {pool}")]
    UnknownGroup { pool: String, group: String },

    #[error("invalid pagination token {0:?}")]
    InvalidToken(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Group {
    #[serde(rename = "GroupName")]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Attribute {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "Attributes", default)]
    pub attributes: Vec<Attribute>,
}

impl User {
    pub fn new(username: impl Into<String>, enabled: bool) -> Self {
        User {
            username: username.into(),
            enabled,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the first attribute called `name`, if any.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Placeholder accounts named `g:<group>` are not real users.
    pub fn is_group_owner(&self) -> bool {
        self.username.starts_with(GROUP_OWNER_PREFIX)
    }
}

/// One page of a paginated query. The query is complete once `next_token`
/// is `None`.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

pub trait Provider {
    fn list_groups(&self, pool: &str, next_token: Option<&str>)
        -> Result<Page<Group>, ProviderError>;

    /// Members of `group`, disabled users included.
    fn list_users_in_group(
        &self,
        pool: &str,
        group: &str,
        next_token: Option<&str>,
    ) -> Result<Page<User>, ProviderError>;
}

impl<P: Provider + ?Sized> Provider for &P {
    fn list_groups(
        &self,
        pool: &str,
        next_token: Option<&str>,
    ) -> Result<Page<Group>, ProviderError> {
        (**self).list_groups(pool, next_token)
    }

    fn list_users_in_group(
        &self,
        pool: &str,
        group: &str,
        next_token: Option<&str>,
    ) -> Result<Page<User>, ProviderError> {
        (**self).list_users_in_group(pool, group, next_token)
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{Group, Page, Provider, ProviderError, User};

/// Largest page the managed provider hands out for either query.
pub const DEFAULT_PAGE_SIZE: usize = 60;

/// Exported state of one user pool, in the provider's response shape.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PoolSnapshot {
    #[serde(rename = "UserPoolId")]
    pub user_pool_id: String,
    #[serde(rename = "Groups", default)]
    pub groups: Vec<Group>,
    #[serde(rename = "Members", default)]
    pub members: BTreeMap<String, Vec<User>>,
}

/// Serves a [`PoolSnapshot`] through the paginated [`Provider`] queries.
///
/// Pagination tokens are item offsets rendered as strings.
#[derive(Clone, Debug)]
pub struct SnapshotProvider {
    snapshot: PoolSnapshot,
    page_size: usize,
}

impl SnapshotProvider {
    pub fn new(snapshot: PoolSnapshot, page_size: usize) -> Self {
        SnapshotProvider {
            snapshot,
            page_size: page_size.max(1),
        }
    }

    pub fn from_file(path: &Path, page_size: usize) -> Result<Self, ProviderError> {
        let data = fs::read_to_string(path).map_err(|source| ProviderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot = serde_json::from_str(&data).map_err(|source| ProviderError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(snapshot, page_size))
    }

    fn check_pool(&self, pool: &str) -> Result<(), ProviderError> {
        if self.snapshot.user_pool_id == pool {
            Ok(())
        } else {
            Err(ProviderError::UnknownPool(pool.to_string()))
        }
    }

    fn page<T: Clone>(&self, items: &[T], next_token: Option<&str>) -> Result<Page<T>, ProviderError> {
        let start = match next_token {
            None => 0,
            Some(token) => match token.parse::<usize>() {
                Ok(offset) if offset < items.len() => offset,
                _ => return Err(ProviderError::InvalidToken(token.to_string())),
            },
        };
        let end = (start + self.page_size).min(items.len());
        Ok(Page {
            items: items[start..end].to_vec(),
            next_token: if end < items.len() {
                Some(end.to_string())
            } else {
                None
            },
        })
    }
}

impl Provider for SnapshotProvider {
    fn list_groups(
        &self,
        pool: &str,
        next_token: Option<&str>,
    ) -> Result<Page<Group>, ProviderError> {
        self.check_pool(pool)?;
        self.page(&self.snapshot.groups, next_token)
    }

    fn list_users_in_group(
        &self,
        pool: &str,
        group: &str,
        next_token: Option<&str>,
    ) -> Result<Page<User>, ProviderError> {
        self.check_pool(pool)?;
        if !self.snapshot.groups.iter().any(|g| g.name == group) {
            return Err(ProviderError::UnknownGroup {
                pool: pool.to_string(),
                group: group.to_string(),
            });
        }
        let members = self
            .snapshot
            .members
            .get(group)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.page(members, next_token)
    }
}

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub user_pool: Option<String>,
    /// Exported pool to query.
    pub snapshot: Option<PathBuf>,
    pub page_size: Option<usize>,
}

impl ProviderConfig {
    pub(super) fn merge(&mut self, other: ProviderConfig) {
        self.user_pool = other.user_pool.or(self.user_pool.take());
        self.snapshot = other.snapshot.or(self.snapshot.take());
        self.page_size = other.page_size.or(self.page_size.take());
    }

    pub(super) fn resolve_paths(&mut self, dir: &Path) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            *snapshot = dir.join(&*snapshot);
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Membership in any of these groups grants a passwd and shadow entry.
    pub groups: Option<Vec<String>>,
}

impl AccessConfig {
    pub(super) fn merge(&mut self, other: AccessConfig) {
        self.groups = other.groups.or(self.groups.take());
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Login shell of every exported user.
    pub shell: Option<String>,
    /// Prepended to the username to form the home directory.
    pub home_dir_prefix: Option<String>,
}

impl GeneralConfig {
    pub(super) fn merge(&mut self, other: GeneralConfig) {
        self.shell = other.shell.or(self.shell.take());
        self.home_dir_prefix = other.home_dir_prefix.or(self.home_dir_prefix.take());
    }
}

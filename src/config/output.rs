use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub group_file: Option<PathBuf>,
    pub passwd_file: Option<PathBuf>,
    pub shadow_file: Option<PathBuf>,
}

impl OutputConfig {
    pub(super) fn merge(&mut self, other: OutputConfig) {
        self.group_file = other.group_file.or(self.group_file.take());
        self.passwd_file = other.passwd_file.or(self.passwd_file.take());
        self.shadow_file = other.shadow_file.or(self.shadow_file.take());
    }

    pub(super) fn resolve_paths(&mut self, dir: &Path) {
        for file in [&mut self.group_file, &mut self.passwd_file, &mut self.shadow_file] {
            if let Some(file) = file.as_mut() {
                *file = dir.join(&*file);
            }
        }
    }
}

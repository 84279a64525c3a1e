use std::collections::BTreeSet;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Result;

pub mod access;
pub mod general;
pub mod output;
pub mod provider;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub include: Vec<PathBuf>,
    #[serde(default)]
    pub provider: provider::ProviderConfig,
    #[serde(default)]
    pub access: access::AccessConfig,
    #[serde(default)]
    pub general: general::GeneralConfig,
    #[serde(default)]
    pub output: output::OutputConfig,
}

/// Fully validated configuration for one run.
#[derive(Clone, Debug)]
pub struct Settings {
    pub user_pool: String,
    pub snapshot: PathBuf,
    pub page_size: usize,
    pub groups_with_access: BTreeSet<String>,
    pub shell: String,
    pub home_dir_prefix: String,
    pub group_file: PathBuf,
    pub passwd_file: PathBuf,
    pub shadow_file: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config: Config = match fs::read_to_string(path) {
            Ok(config_data) => match toml::from_str(&config_data) {
                Ok(config) => config,
                Err(err) => {
                    bail!("{}: failed to decode: {}", path.display(), err);
                }
            },
            Err(err) => {
                bail!("{}: failed to read: {}", path.display(), err);
            }
        };

        let config_dir = path.parent().unwrap_or_else(|| Path::new(""));
        // Relative paths belong to the file that names them, not to its includer.
        config.provider.resolve_paths(config_dir);
        config.output.resolve_paths(config_dir);

        let mut configs = mem::take(&mut config.include)
            .into_iter()
            .map(|path| Config::from_file(&config_dir.join(path)))
            .collect::<Result<Vec<Config>>>()?;
        configs.push(config); // Put ourself last to ensure that it overwrites anything else.

        config = configs.remove(0);

        for other_config in configs {
            config.merge(other_config);
        }

        Ok(config)
    }

    pub fn merge(&mut self, other: Config) {
        assert!(self.include.is_empty());
        assert!(other.include.is_empty());

        let Config {
            include: _,
            provider: other_provider,
            access: other_access,
            general: other_general,
            output: other_output,
        } = other;

        self.provider.merge(other_provider);
        self.access.merge(other_access);
        self.general.merge(other_general);
        self.output.merge(other_output);
    }

    /// Check that every required key is present. Must succeed before any
    /// provider query is made.
    pub fn settings(&self) -> Result<Settings> {
        macro_rules! required {
            ($value:expr, $key:literal) => {
                match $value.clone() {
                    Some(value) => value,
                    None => bail!("missing required key {}", $key),
                }
            };
        }

        let groups_with_access = required!(self.access.groups, "access.groups");
        if groups_with_access.is_empty() {
            bail!("access.groups must name at least one group");
        }

        Ok(Settings {
            user_pool: required!(self.provider.user_pool, "provider.user_pool"),
            snapshot: required!(self.provider.snapshot, "provider.snapshot"),
            page_size: self
                .provider
                .page_size
                .unwrap_or(crate::provider::snapshot::DEFAULT_PAGE_SIZE),
            groups_with_access: groups_with_access.into_iter().collect(),
            shell: required!(self.general.shell, "general.shell"),
            home_dir_prefix: required!(self.general.home_dir_prefix, "general.home_dir_prefix"),
            group_file: required!(self.output.group_file, "output.group_file"),
            passwd_file: required!(self.output.passwd_file, "output.passwd_file"),
            shadow_file: required!(self.output.shadow_file, "output.shadow_file"),
        })
    }
}

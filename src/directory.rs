//! In-memory snapshot of a provider pool: groups, their enabled members, and
//! the reverse membership index.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::{debug, info};

use crate::provider::{Provider, ProviderError, User, GROUP_OWNER_PREFIX};

pub const UID_ATTRIBUTE: &str = "custom:uid";
pub const NAME_ATTRIBUTE: &str = "name";

#[derive(Debug)]
pub struct Directory<P> {
    provider: P,
    pool: String,
    groups: BTreeMap<String, Vec<Rc<User>>>,
    users: BTreeMap<String, Rc<User>>,
    users_groups: BTreeMap<String, BTreeSet<String>>,
}

impl<P: Provider> Directory<P> {
    pub fn new(provider: P, pool: impl Into<String>) -> Self {
        Directory {
            provider,
            pool: pool.into(),
            groups: BTreeMap::new(),
            users: BTreeMap::new(),
            users_groups: BTreeMap::new(),
        }
    }

    /// Fetch every group and then the members of every group, including
    /// groups that grant no access, so that each user's full membership is
    /// known.
    pub fn load(provider: P, pool: impl Into<String>) -> Result<Self, ProviderError> {
        let mut directory = Self::new(provider, pool);
        let groups = directory.fetch_all_groups()?;
        info!("Found {} groups in pool {}", groups.len(), directory.pool);
        for group in groups {
            directory.fetch_group_members(&group)?;
        }
        info!(
            "Loaded {} enabled users from pool {}",
            directory.users.len(),
            directory.pool
        );
        Ok(directory)
    }

    pub fn fetch_all_groups(&mut self) -> Result<BTreeSet<String>, ProviderError> {
        let mut names = BTreeSet::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.provider.list_groups(&self.pool, token.as_deref())?;
            debug!("Group page with {} entries", page.items.len());
            for group in page.items {
                self.groups.entry(group.name.clone()).or_default();
                names.insert(group.name);
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(names)
    }

    /// Enabled members of `group`, in page order. Each member is registered
    /// in the user map and gains `group` in its membership set.
    pub fn fetch_group_members(&mut self, group: &str) -> Result<Vec<Rc<User>>, ProviderError> {
        let mut members = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .provider
                .list_users_in_group(&self.pool, group, token.as_deref())?;
            debug!("Member page of {} with {} entries", group, page.items.len());
            for user in page.items {
                if !user.enabled {
                    continue;
                }
                let user = self
                    .users
                    .entry(user.username.clone())
                    .or_insert_with(|| Rc::new(user))
                    .clone();
                self.users_groups
                    .entry(user.username.clone())
                    .or_default()
                    .insert(group.to_string());
                members.push(user);
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        self.groups.insert(group.to_string(), members.clone());
        Ok(members)
    }
}

impl<P> Directory<P> {
    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn groups(&self) -> &BTreeMap<String, Vec<Rc<User>>> {
        &self.groups
    }

    pub fn users(&self) -> &BTreeMap<String, Rc<User>> {
        &self.users
    }

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username).map(|user| &**user)
    }

    /// Users other than the `g:` group owners, sorted by username.
    pub fn regular_users(&self) -> impl Iterator<Item = &User> {
        self.users
            .values()
            .filter(|user| !user.is_group_owner())
            .map(|user| &**user)
    }

    pub fn groups_of(&self, username: &str) -> Option<&BTreeSet<String>> {
        self.users_groups.get(username)
    }

    /// Whether `username` belongs to at least one of `groups`.
    pub fn is_member_of_any(&self, username: &str, groups: &BTreeSet<String>) -> bool {
        self.groups_of(username)
            .is_some_and(|own| !own.is_disjoint(groups))
    }

    /// The `g:<group>` placeholder user carrying the group's gid.
    pub fn group_owner(&self, group: &str) -> Option<&User> {
        self.user(&format!("{}{}", GROUP_OWNER_PREFIX, group))
    }
}

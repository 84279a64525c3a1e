//! Selects the records of each account database and writes them out.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::Settings;
use crate::directory::{Directory, NAME_ATTRIBUTE, UID_ATTRIBUTE};
use crate::provider::{SnapshotProvider, User, GROUP_OWNER_PREFIX};
use crate::render::{Record, Renderer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingAttribute(&'static str),
    InvalidUid(String),
    MissingGroupOwner(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped {
    /// Username, or group name for group records.
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of writing one database.
#[derive(Clone, Debug, Default)]
pub struct FileReport {
    pub written: usize,
    pub skipped: Vec<Skipped>,
}

impl FileReport {
    fn skip(&mut self, name: &str, reason: SkipReason) {
        self.skipped.push(Skipped {
            name: name.to_string(),
            reason,
        });
    }
}

#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub group: FileReport,
    pub passwd: FileReport,
    pub shadow: FileReport,
}

/// Parsed `custom:uid` of `user`. Warns and records the skip when it is
/// missing or not a valid id.
fn uid_of(user: &User, report: &mut FileReport) -> Option<u32> {
    let Some(value) = user.attribute(UID_ATTRIBUTE) else {
        warn!("No {} attribute found for {}", UID_ATTRIBUTE, user.username);
        report.skip(&user.username, SkipReason::MissingAttribute(UID_ATTRIBUTE));
        return None;
    };
    match value.trim().parse::<u32>() {
        Ok(uid) => Some(uid),
        Err(err) => {
            warn!(
                "Invalid {} attribute {:?} for {}: {}",
                UID_ATTRIBUTE, value, user.username, err
            );
            report.skip(&user.username, SkipReason::InvalidUid(value.to_string()));
            None
        }
    }
}

/// Personal groups for every regular user with a uid, then one record per
/// provider group with the gid carried by its `g:<group>` user.
pub fn write_group_db<P, W: Write>(directory: &Directory<P>, out: &mut W) -> Result<FileReport> {
    let mut renderer = Renderer::new();
    let mut report = FileReport::default();

    for user in directory.regular_users() {
        let Some(uid) = uid_of(user, &mut report) else {
            continue;
        };
        out.write_all(
            renderer
                .render(&Record::Group {
                    gid: uid,
                    name: &user.username,
                })
                .as_bytes(),
        )?;
    }

    for groupname in directory.groups().keys() {
        let Some(owner) = directory.group_owner(groupname) else {
            let owner = format!("{}{}", GROUP_OWNER_PREFIX, groupname);
            warn!("No user `{}' found: could not look up group gid", owner);
            report.skip(groupname, SkipReason::MissingGroupOwner(owner));
            continue;
        };
        let Some(gid) = uid_of(owner, &mut report) else {
            continue;
        };
        out.write_all(
            renderer
                .render(&Record::Group {
                    gid,
                    name: groupname,
                })
                .as_bytes(),
        )?;
    }

    report.written = renderer.count();
    Ok(report)
}

pub fn write_passwd_db<P, W: Write>(
    directory: &Directory<P>,
    groups_with_access: &BTreeSet<String>,
    shell: &str,
    home_dir_prefix: &str,
    out: &mut W,
) -> Result<FileReport> {
    let mut renderer = Renderer::new();
    let mut report = FileReport::default();

    for user in directory.regular_users() {
        let Some(uid) = uid_of(user, &mut report) else {
            continue;
        };
        if !directory.is_member_of_any(&user.username, groups_with_access) {
            continue;
        }
        let Some(name) = user.attribute(NAME_ATTRIBUTE) else {
            warn!("No {} attribute found for {}", NAME_ATTRIBUTE, user.username);
            report.skip(&user.username, SkipReason::MissingAttribute(NAME_ATTRIBUTE));
            continue;
        };
        let home = format!("{}{}", home_dir_prefix, user.username);
        out.write_all(
            renderer
                .render(&Record::User {
                    uid,
                    username: &user.username,
                    name,
                    home: &home,
                    shell,
                })
                .as_bytes(),
        )?;
    }

    report.written = renderer.count();
    Ok(report)
}

pub fn write_shadow_db<P, W: Write>(
    directory: &Directory<P>,
    groups_with_access: &BTreeSet<String>,
    out: &mut W,
) -> Result<FileReport> {
    let mut renderer = Renderer::new();
    let mut report = FileReport::default();

    for user in directory.regular_users() {
        let Some(uid) = uid_of(user, &mut report) else {
            continue;
        };
        if !directory.is_member_of_any(&user.username, groups_with_access) {
            continue;
        }
        out.write_all(
            renderer
                .render(&Record::Shadow {
                    uid,
                    username: &user.username,
                })
                .as_bytes(),
        )?;
    }

    report.written = renderer.count();
    Ok(report)
}

/// Mode of a newly created group or passwd database.
pub const PUBLIC_DB_MODE: u32 = 0o644;
/// Mode of a newly created shadow database.
pub const SHADOW_DB_MODE: u32 = 0o600;

/// Write `path` through a temporary file in the same directory, replacing the
/// target only once `f` has succeeded. An existing target keeps its
/// permissions, a new one gets `mode`.
fn write_atomic<F>(path: &Path, mode: u32, f: F) -> Result<FileReport>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<FileReport>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;

    let report = {
        let mut writer = BufWriter::new(&mut tmp);
        let report = f(&mut writer).with_context(|| format!("failed to write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        report
    };

    let permissions = match fs::metadata(path) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => fs::Permissions::from_mode(mode),
    };
    tmp.as_file()
        .set_permissions(permissions)
        .with_context(|| format!("failed to set permissions for {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    info!(
        "Wrote {} records to {} ({} skipped)",
        report.written,
        path.display(),
        report.skipped.len()
    );
    Ok(report)
}

/// Write the group, passwd and shadow databases for an already loaded
/// directory.
pub fn write_databases<P>(directory: &Directory<P>, settings: &Settings) -> Result<SyncReport> {
    let group = write_atomic(&settings.group_file, PUBLIC_DB_MODE, |out| write_group_db(directory, out))?;
    let passwd = write_atomic(&settings.passwd_file, PUBLIC_DB_MODE, |out| {
        write_passwd_db(
            directory,
            &settings.groups_with_access,
            &settings.shell,
            &settings.home_dir_prefix,
            out,
        )
    })?;
    let shadow = write_atomic(&settings.shadow_file, SHADOW_DB_MODE, |out| {
        write_shadow_db(directory, &settings.groups_with_access, out)
    })?;
    Ok(SyncReport {
        group,
        passwd,
        shadow,
    })
}

/// Load the configured pool and export it.
pub fn sync(settings: &Settings) -> Result<SyncReport> {
    let provider = SnapshotProvider::from_file(&settings.snapshot, settings.page_size)?;
    let directory = Directory::load(provider, settings.user_pool.as_str())?;
    write_databases(&directory, settings)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;
    use std::fs;
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::{write_databases, write_group_db, write_passwd_db, write_shadow_db, SkipReason};
    use crate::config::Settings;
    use crate::directory::test::{disabled, user, MockProvider};
    use crate::directory::Directory;

    fn access(groups: &[&str]) -> BTreeSet<String> {
        groups.iter().map(|g| g.to_string()).collect()
    }

    fn fixture() -> MockProvider {
        MockProvider::new(60)
            .group("A", vec![user("u1", Some("100")), user("g:A", Some("5000"))])
            .group(
                "B",
                vec![
                    user("u2", Some("101")),
                    disabled("u3", "102"),
                    user("g:B", Some("5001")),
                ],
            )
    }

    fn render<F>(f: F) -> (String, super::FileReport)
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<super::FileReport>,
    {
        let mut out = Vec::new();
        let report = f(&mut out).unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    #[test]
    fn passwd_contains_only_access_group_members() {
        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        let (text, report) = render(|out| {
            write_passwd_db(&directory, &access(&["A"]), "/bin/bash", "/home/", out)
        });

        assert_eq!(
            text,
            "=100 u1:x:100:100:U1:/home/u1:/bin/bash\n\
             00 u1:x:100:100:U1:/home/u1:/bin/bash\n\
             .u1 u1:x:100:100:U1:/home/u1:/bin/bash\n"
        );
        assert_eq!(report.written, 1);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn shadow_contains_only_access_group_members() {
        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        let (text, report) = render(|out| write_shadow_db(&directory, &access(&["A"]), out));

        assert_eq!(
            text,
            "=100 u1:*::::7:::\n00 u1:*::::7:::\n.u1 u1:*::::7:::\n"
        );
        assert_eq!(report.written, 1);
    }

    #[test]
    fn group_db_has_personal_and_provider_groups() {
        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        let (text, report) = render(|out| write_group_db(&directory, out));

        let keys: Vec<&str> = text.lines().filter(|l| l.starts_with('.')).collect();
        assert_eq!(
            keys,
            vec![
                ".u1 u1:x:100:",
                ".u2 u2:x:101:",
                ".A A:x:5000:",
                ".B B:x:5001:",
            ]
        );
        let ordinals: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with('0'))
            .map(|l| l.split(' ').next().unwrap())
            .collect();
        assert_eq!(ordinals, vec!["00", "01", "02", "03"]);
        assert_eq!(report.written, 4);
    }

    #[test]
    fn group_owners_never_get_accounts() {
        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        let all = access(&["A", "B"]);
        let (passwd, _) = render(|out| write_passwd_db(&directory, &all, "/bin/sh", "/home/", out));
        let (shadow, _) = render(|out| write_shadow_db(&directory, &all, out));

        assert!(!passwd.contains("g:"));
        assert!(!shadow.contains("g:"));
        assert_eq!(passwd.lines().count(), 6);
    }

    #[test]
    fn missing_group_owner_is_skipped() {
        let provider = MockProvider::new(60)
            .group("A", vec![user("u1", Some("100"))])
            .group("B", vec![user("g:B", None)]);
        let directory = Directory::load(&provider, "pool").unwrap();
        let (text, report) = render(|out| write_group_db(&directory, out));

        assert_eq!(report.written, 1);
        assert!(text.contains(".u1 u1:x:100:"));
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].name, "A");
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::MissingGroupOwner("g:A".to_string())
        );
        assert_eq!(report.skipped[1].name, "g:B");
        assert_eq!(
            report.skipped[1].reason,
            SkipReason::MissingAttribute("custom:uid")
        );
    }

    #[test]
    fn user_without_uid_is_reported() {
        let provider = MockProvider::new(60)
            .group("A", vec![user("u1", Some("100")), user("nouid", None)]);
        let directory = Directory::load(&provider, "pool").unwrap();
        let access = access(&["A"]);

        for (text, report) in [
            render(|out| write_group_db(&directory, out)),
            render(|out| write_passwd_db(&directory, &access, "/bin/sh", "/home/", out)),
            render(|out| write_shadow_db(&directory, &access, out)),
        ] {
            assert!(!text.contains("nouid"));
            assert!(report.skipped.iter().any(|s| s.name == "nouid"
                && s.reason == SkipReason::MissingAttribute("custom:uid")));
        }
    }

    #[test]
    fn invalid_uid_is_reported() {
        let provider =
            MockProvider::new(60).group("A", vec![user("u1", Some("-4")), user("u2", Some("x"))]);
        let directory = Directory::load(&provider, "pool").unwrap();
        let (text, report) = render(|out| write_shadow_db(&directory, &access(&["A"]), out));

        assert!(text.is_empty());
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InvalidUid("-4".to_string())
        );
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn passwd_requires_display_name_but_shadow_does_not() {
        let mut nameless = user("u1", Some("100"));
        nameless.attributes.retain(|attr| attr.name != "name");
        let provider = MockProvider::new(60).group("A", vec![nameless]);
        let directory = Directory::load(&provider, "pool").unwrap();
        let access = access(&["A"]);

        let (passwd, report) =
            render(|out| write_passwd_db(&directory, &access, "/bin/sh", "/home/", out));
        assert!(passwd.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::MissingAttribute("name"));

        let (shadow, _) = render(|out| write_shadow_db(&directory, &access, out));
        assert!(shadow.starts_with("=100 u1:*::::7:::\n"));
    }

    #[test]
    fn writes_all_databases_reproducibly() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            user_pool: "pool".to_string(),
            snapshot: dir.path().join("unused.json"),
            page_size: 60,
            groups_with_access: access(&["A"]),
            shell: "/bin/bash".to_string(),
            home_dir_prefix: "/home/".to_string(),
            group_file: dir.path().join("db/group"),
            passwd_file: dir.path().join("db/passwd"),
            shadow_file: dir.path().join("db/shadow"),
        };

        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        let report = write_databases(&directory, &settings).unwrap();
        assert_eq!(report.group.written, 4);
        assert_eq!(report.passwd.written, 1);
        assert_eq!(report.shadow.written, 1);

        let first: Vec<String> = [&settings.group_file, &settings.passwd_file, &settings.shadow_file]
            .iter()
            .map(|path| fs::read_to_string(path).unwrap())
            .collect();

        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        write_databases(&directory, &settings).unwrap();
        let second: Vec<String> = [&settings.group_file, &settings.passwd_file, &settings.shadow_file]
            .iter()
            .map(|path| fs::read_to_string(path).unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path().join("db")).unwrap().count(), 3);
    }

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            user_pool: "pool".to_string(),
            snapshot: dir.join("unused.json"),
            page_size: 60,
            groups_with_access: access(&["A"]),
            shell: "/bin/bash".to_string(),
            home_dir_prefix: "/home/".to_string(),
            group_file: dir.join("group"),
            passwd_file: dir.join("passwd"),
            shadow_file: dir.join("shadow"),
        }
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn new_databases_get_default_modes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        write_databases(&directory, &settings).unwrap();

        assert_eq!(mode(&settings.group_file), 0o644);
        assert_eq!(mode(&settings.passwd_file), 0o644);
        assert_eq!(mode(&settings.shadow_file), 0o600);
    }

    #[test]
    fn rewrite_keeps_existing_modes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        fs::write(&settings.passwd_file, "stale").unwrap();
        fs::set_permissions(&settings.passwd_file, fs::Permissions::from_mode(0o644)).unwrap();
        fs::write(&settings.shadow_file, "stale").unwrap();
        fs::set_permissions(&settings.shadow_file, fs::Permissions::from_mode(0o640)).unwrap();

        let provider = fixture();
        let directory = Directory::load(&provider, "pool").unwrap();
        write_databases(&directory, &settings).unwrap();

        assert_eq!(mode(&settings.passwd_file), 0o644);
        assert_eq!(mode(&settings.shadow_file), 0o640);
        assert!(fs::read_to_string(&settings.passwd_file)
            .unwrap()
            .starts_with("=100 u1:x:100:100:"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_uid_logs_warning_naming_user() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let provider = MockProvider::new(60)
            .group("A", vec![user("u1", Some("100")), user("nouid", None)]);
        let directory = Directory::load(&provider, "pool").unwrap();
        tracing::subscriber::with_default(subscriber, || {
            render(|out| write_shadow_db(&directory, &access(&["A"]), out));
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let warning = logs
            .lines()
            .find(|line| line.contains("WARN"))
            .expect("a warning is logged");
        assert!(warning.contains("No custom:uid attribute found for nouid"));
        assert!(!logs.contains("for u1"));
    }
}

//! Loader-format record blocks.
//!
//! Every record is three lines sharing one payload: an `=<id>` line, a
//! `0<seq>` ordinal line and a `.<name>` key line.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record<'a> {
    Group {
        gid: u32,
        name: &'a str,
    },
    User {
        uid: u32,
        username: &'a str,
        name: &'a str,
        home: &'a str,
        shell: &'a str,
    },
    Shadow {
        uid: u32,
        username: &'a str,
    },
}

impl Record<'_> {
    pub fn id(&self) -> u32 {
        match *self {
            Record::Group { gid, .. } => gid,
            Record::User { uid, .. } | Record::Shadow { uid, .. } => uid,
        }
    }

    pub fn key(&self) -> &str {
        match *self {
            Record::Group { name, .. } => name,
            Record::User { username, .. } | Record::Shadow { username, .. } => username,
        }
    }

    pub fn payload(&self) -> String {
        match *self {
            Record::Group { gid, name } => format!("{}:x:{}:", name, gid),
            Record::User {
                uid,
                username,
                name,
                home,
                shell,
            } => format!("{}:x:{}:{}:{}:{}:{}", username, uid, uid, name, home, shell),
            Record::Shadow { username, .. } => format!("{}:*::::7:::", username),
        }
    }
}

/// Renders the records of one output file, numbering them from zero.
#[derive(Debug, Default)]
pub struct Renderer {
    seq: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records rendered so far.
    pub fn count(&self) -> usize {
        self.seq
    }

    pub fn render(&mut self, record: &Record) -> String {
        let payload = record.payload();
        let text = format!(
            "={} {}\n0{} {}\n.{} {}\n",
            record.id(),
            payload,
            self.seq,
            payload,
            record.key(),
            payload
        );
        self.seq += 1;
        text
    }
}

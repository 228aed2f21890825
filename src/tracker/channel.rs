//! Channel state: topic, modes, and the member map.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::cimap::CiMap;

/// One channel member: just the rank-ordered prefix string (`"@+"`-style,
/// highest rank first), keyed externally by folded nick in
/// `Channel::members`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Member {
    /// Mode-prefix symbols this member currently holds, highest rank
    /// first, e.g. `"@"` for an op, `""` for a plain member.
    pub modepfx: String,
}

impl Member {
    /// Adds `symbol` at its rank position within `order` (the 005
    /// prefix symbol alphabet, highest rank first). A no-op if already
    /// present.
    pub fn add_prefix(&mut self, symbol: char, order: &[char]) {
        if self.modepfx.contains(symbol) {
            return;
        }
        let rank = order.iter().position(|&s| s == symbol).unwrap_or(order.len());
        let insert_at = self
            .modepfx
            .chars()
            .position(|c| order.iter().position(|&s| s == c).unwrap_or(order.len()) > rank)
            .unwrap_or(self.modepfx.len());
        self.modepfx.insert(insert_at, symbol);
    }

    /// Removes `symbol`. A no-op if absent.
    pub fn remove_prefix(&mut self, symbol: char) {
        if let Some(pos) = self.modepfx.find(symbol) {
            self.modepfx.remove(pos);
        }
    }
}

/// A joined channel and everything the tracker knows about it.
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub topic_setter: String,
    pub topic_set_at: u64,
    pub created_at: u64,
    pub members: CiMap<Member>,
    /// Set when the tracker suspects this channel's state has drifted
    /// from the server's (e.g. a MODE referencing an unknown letter was
    /// skipped); never cleared automatically.
    pub desync: bool,
    /// Channel modes that are not per-member prefixes, letter → optional
    /// argument (class A modes, like bans, are not tracked individually
    /// here — only class B/C/D single-value modes are; see
    /// `tracker::modes`).
    pub modes: HashMap<char, Option<String>>,
    /// Observed class-A (list) mode entries, e.g. the ban list.
    pub lists: HashMap<char, Vec<String>>,
    pub synced: bool,
    pub tag: Option<Box<dyn Any + Send + Sync>>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Channel {
            name: name.into(),
            topic: String::new(),
            topic_setter: String::new(),
            topic_set_at: 0,
            created_at: 0,
            members: CiMap::new(),
            desync: false,
            modes: HashMap::new(),
            lists: HashMap::new(),
            synced: false,
            tag: None,
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("topic_setter", &self.topic_setter)
            .field("topic_set_at", &self.topic_set_at)
            .field("created_at", &self.created_at)
            .field("members", &self.members)
            .field("desync", &self.desync)
            .field("modes", &self.modes)
            .field("lists", &self.lists)
            .field("synced", &self.synced)
            .field("tag", &self.tag.is_some())
            .finish()
    }
}

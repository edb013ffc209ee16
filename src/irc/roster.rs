//! Channel membership tracking.
//!
//! Keeps track of who is in the channels we are in, so `nick` events can
//! report the channels a renamed user shares with us. Channel and nickname
//! comparisons are ASCII case-insensitive.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

// ============================================================================
// Constants
// ============================================================================

/// Membership prefixes that may precede a nickname in `353` replies.
const MODE_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

// ============================================================================
// Channel
// ============================================================================

#[derive(Debug, Default)]
struct Channel {
    /// Channel name as the server spelled it.
    name: String,
    /// Lowercased nickname -> (nickname, mode prefix).
    users: FxHashMap<String, (String, String)>,
}

// ============================================================================
// Roster
// ============================================================================

/// Users of every channel we are in.
#[derive(Debug, Default)]
pub struct Roster {
    channels: FxHashMap<String, Channel>,
    /// Pending `353` entries keyed by lowercased channel, flushed on `366`.
    pending_names: FxHashMap<String, Vec<(String, String)>>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a user joining a channel.
    pub fn join(&mut self, channel: &str, nick: &str) {
        let entry = self
            .channels
            .entry(channel.to_ascii_lowercase())
            .or_insert_with(|| Channel {
                name: channel.to_owned(),
                ..Channel::default()
            });
        entry
            .users
            .insert(nick.to_ascii_lowercase(), (nick.to_owned(), String::new()));
    }

    /// Records a user leaving a channel. When `me` leaves, the channel is dropped.
    pub fn part(&mut self, channel: &str, nick: &str, me: &str) {
        let key = channel.to_ascii_lowercase();
        if nick.eq_ignore_ascii_case(me) {
            self.channels.remove(&key);
        } else if let Some(entry) = self.channels.get_mut(&key) {
            entry.users.remove(&nick.to_ascii_lowercase());
        }
    }

    /// Records a user quitting, returning the channels they were in.
    pub fn quit(&mut self, nick: &str) -> Vec<String> {
        let key = nick.to_ascii_lowercase();
        let mut left: Vec<String> = self
            .channels
            .values_mut()
            .filter_map(|c| c.users.remove(&key).map(|_| c.name.clone()))
            .collect();
        left.sort();
        left
    }

    /// Renames a user, returning the channels they are in.
    pub fn rename(&mut self, old: &str, new: &str) -> Vec<String> {
        let old_key = old.to_ascii_lowercase();
        let new_key = new.to_ascii_lowercase();
        let mut shared: Vec<String> = self
            .channels
            .values_mut()
            .filter_map(|c| {
                let (_, mode) = c.users.remove(&old_key)?;
                c.users.insert(new_key.clone(), (new.to_owned(), mode));
                Some(c.name.clone())
            })
            .collect();
        shared.sort();
        shared
    }

    /// Buffers one `353` (names) reply.
    pub fn add_names(&mut self, channel: &str, names: &str) {
        let pending = self
            .pending_names
            .entry(channel.to_ascii_lowercase())
            .or_default();
        for name in names.split_whitespace() {
            let nick = name.trim_start_matches(MODE_PREFIXES);
            let mode = &name[..name.len() - nick.len()];
            if !nick.is_empty() {
                pending.push((nick.to_owned(), mode.to_owned()));
            }
        }
    }

    /// Completes a names listing on `366`.
    ///
    /// Replaces the channel's users with the buffered entries and returns
    /// them as a `nick -> mode` object.
    pub fn finish_names(&mut self, channel: &str) -> Map<String, Value> {
        let key = channel.to_ascii_lowercase();
        let pending = self.pending_names.remove(&key).unwrap_or_default();

        let entry = self.channels.entry(key).or_insert_with(|| Channel {
            name: channel.to_owned(),
            ..Channel::default()
        });
        entry.users.clear();

        let mut users = Map::new();
        for (nick, mode) in pending {
            users.insert(nick.clone(), Value::String(mode.clone()));
            entry.users.insert(nick.to_ascii_lowercase(), (nick, mode));
        }
        users
    }

    /// Returns `true` if the nickname is in the channel.
    #[must_use]
    pub fn contains(&self, channel: &str, nick: &str) -> bool {
        self.channels
            .get(&channel.to_ascii_lowercase())
            .is_some_and(|c| c.users.contains_key(&nick.to_ascii_lowercase()))
    }

    /// Returns the number of channels tracked.
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

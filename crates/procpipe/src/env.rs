//! Environment lists for child processes
//!
//! An [`Env`] is an ordered list of `KEY=VALUE` strings. Keys may repeat.
//! Lookups and [`Env::set`] act on the first match, [`Env::unset`] removes
//! every match, and [`Env::dedup`] keeps the last occurrence of each key.

use std::fmt;
use std::path::Path;

/// Search path used by [`Env::with_home`]
pub const DEFAULT_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";

/// Ordered list of `KEY=VALUE` entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env(Vec<String>);

impl Env {
    /// Create an empty environment
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Snapshot of the current process environment
    pub fn system() -> Self {
        std::env::vars_os()
            .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
            .collect()
    }

    /// Minimal environment for a user whose home directory is `home`.
    ///
    /// `USER` is `root` when `home` is `/`, otherwise the last path component.
    pub fn with_home(home: &str) -> Self {
        let user = if home == "/" {
            "root".to_string()
        } else {
            Path::new(home)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| home.to_string())
        };

        Self(vec![
            format!("USER={user}"),
            "PWD=/".to_string(),
            format!("HOME={home}"),
            format!("PATH={DEFAULT_PATH}"),
        ])
    }

    /// Like [`Env::with_home`], followed by `vars`, deduplicated so later
    /// entries win.
    pub fn with_home_vars<I, S>(home: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra: Env = vars.into_iter().map(Into::into).collect();
        Self::with_home(home).join(&[extra]).dedup()
    }

    /// Value of the first entry for `key`, or an empty string
    pub fn get(&self, key: &str) -> &str {
        self.0
            .iter()
            .find_map(|entry| value_of(entry, key))
            .unwrap_or("")
    }

    /// Whether any entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|entry| value_of(entry, key).is_some())
    }

    /// Overwrite the first entry for `key`, or append one.
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = format!("{key}={value}");
        match self.0.iter_mut().find(|e| value_of(e, key).is_some()) {
            Some(slot) => *slot = entry,
            None => self.0.push(entry),
        }
    }

    /// Remove every entry for `key`
    pub fn unset(&mut self, key: &str) {
        self.0.retain(|entry| value_of(entry, key).is_none());
    }

    /// Concatenate `others` after `self` without removing anything
    pub fn join(&self, others: &[Env]) -> Env {
        let mut joined = self.0.clone();
        for other in others {
            joined.extend(other.0.iter().cloned());
        }
        Self(joined)
    }

    /// Keep only the last entry of each key, preserving the order of the
    /// surviving entries.
    pub fn dedup(&self) -> Env {
        let mut kept: Vec<&String> = Vec::with_capacity(self.0.len());
        for (n, entry) in self.0.iter().enumerate() {
            let key = key_of(entry);
            let later = self.0[n + 1..].iter().any(|e| key_of(e) == key);
            if !later {
                kept.push(entry);
            }
        }
        Self(kept.into_iter().cloned().collect())
    }

    /// `(key, value)` pairs, skipping malformed entries without `=`
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|entry| entry.split_once('='))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

fn key_of(entry: &str) -> &str {
    entry.split_once('=').map(|(k, _)| k).unwrap_or(entry)
}

fn value_of<'a>(entry: &'a str, key: &str) -> Option<&'a str> {
    entry.strip_prefix(key)?.strip_prefix('=')
}

impl From<Vec<String>> for Env {
    fn from(entries: Vec<String>) -> Self {
        Self(entries)
    }
}

impl FromIterator<String> for Env {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Env {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

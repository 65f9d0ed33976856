//! Reader for Ceph's INI-style config and keyring files.
//!
//! Handles `[section]` headers, `key = value` pairs, and `#`/`;` comment
//! lines. Keys compare the way Ceph compares option names: case-insensitive,
//! with spaces, underscores and dashes interchangeable. Values are split at
//! the first `=` only, since keyring secrets end in base64 padding.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CephConf {
    sections: HashMap<String, HashMap<String, String>>,
}

impl CephConf {
    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = header.trim().to_string();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(normalize_key(key), value.trim().to_string());
            }
        }

        Self { sections }
    }

    /// Value of `key` in `section`, if present and non-empty.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(&normalize_key(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

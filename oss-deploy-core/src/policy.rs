//! Cache policy resolution.
//!
//! Every uploaded object gets a `Cache-Control` baseline chosen by extension:
//! stable assets (content-hashed bundles, images) are cached for three years,
//! everything else for two minutes. The first user rule whose pattern matches
//! the relative path is then overlaid header by header.

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;

pub const CACHE_CONTROL: &str = "Cache-Control";

/// 3 years.
pub const STABLE_MAX_AGE: u64 = 3 * 365 * 24 * 60 * 60;
/// 2 minutes.
pub const UNSTABLE_MAX_AGE: u64 = 2 * 60;

/// Ordered header map. Names keep the spelling they were first set with and
/// compare ASCII case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    headers: Vec<(String, String)>,
}

impl CachePolicy {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name`, replacing an existing value for the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A header override rule, compiled once when the configuration is validated.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    headers: Vec<(String, String)>,
}

impl Rule {
    /// Compiles `pattern` and parses every `"Name: Value"` entry.
    ///
    /// `index` is the rule's position in the config and only used for errors.
    pub fn compile(index: usize, pattern: &str, headers: &[String]) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidRulePattern {
            index,
            pattern: pattern.to_string(),
            source,
        })?;

        let headers = headers
            .iter()
            .map(|entry| {
                parse_header(entry).ok_or_else(|| ConfigError::InvalidRuleHeader {
                    index,
                    header: entry.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Rule {
            pattern: compiled,
            headers,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Unanchored: the pattern may match anywhere in the path.
    pub fn matches(&self, relative_path: &str) -> bool {
        self.pattern.is_match(relative_path)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Splits on the first colon and trims both sides. The name must not be empty.
fn parse_header(entry: &str) -> Option<(String, String)> {
    let (name, value) = entry.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// The extension of `relative_path` without its leading dot, if it has one.
pub fn extension_of(relative_path: &str) -> Option<&str> {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    match file_name.rfind('.') {
        // dotfiles such as `.htaccess` have no extension
        Some(0) | None => None,
        Some(i) => Some(&file_name[i + 1..]),
    }
}

pub fn is_stable_asset(extension: Option<&str>, stable_asset_exts: &[String]) -> bool {
    match extension {
        Some(ext) => stable_asset_exts
            .iter()
            .any(|stable| stable.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Derives the headers to attach when uploading `relative_path`.
pub fn resolve_policy(
    relative_path: &str,
    extension: Option<&str>,
    stable_asset_exts: &[String],
    rules: &[Rule],
) -> CachePolicy {
    let max_age = if is_stable_asset(extension, stable_asset_exts) {
        STABLE_MAX_AGE
    } else {
        UNSTABLE_MAX_AGE
    };

    let mut policy = CachePolicy::default();
    policy.set(CACHE_CONTROL, format!("max-age={max_age}"));

    if let Some(rule) = rules.iter().find(|r| r.matches(relative_path)) {
        debug!(path = relative_path, pattern = rule.pattern(), "rule matched");
        for (name, value) in rule.headers() {
            policy.set(name.as_str(), value.as_str());
        }
    }

    policy
}

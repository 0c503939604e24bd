//! Search engine model and built-in defaults

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A search engine entry; `url` contains a `%s` placeholder that the
/// search box substitutes with the encoded query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEngine {
    pub name: String,
    pub url: String,
}

impl SearchEngine {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Engine keys shipped with the extension; protected from deletion.
pub const BUILTIN_ENGINE_KEYS: &[&str] = &["google", "baidu", "bing", "duckduckgo"];

/// Whether `key` names a built-in engine.
pub fn is_builtin(key: &str) -> bool {
    BUILTIN_ENGINE_KEYS.contains(&key)
}

/// The engine map shipped with a fresh installation.
pub fn builtin_engines() -> BTreeMap<String, SearchEngine> {
    BTreeMap::from([
        (
            "google".to_string(),
            SearchEngine::new("Google", "https://www.google.com/search?q=%s"),
        ),
        (
            "baidu".to_string(),
            SearchEngine::new("百度", "https://www.baidu.com/s?wd=%s"),
        ),
        (
            "bing".to_string(),
            SearchEngine::new("Bing", "https://cn.bing.com/search?q=%s"),
        ),
        (
            "duckduckgo".to_string(),
            SearchEngine::new("DuckDuckGo", "https://duckduckgo.com/?q=%s"),
        ),
    ])
}

/// Ensure every built-in engine is present, keeping user entries and
/// user overrides of built-in entries intact.
pub fn with_builtin_defaults(
    mut engines: BTreeMap<String, SearchEngine>,
) -> BTreeMap<String, SearchEngine> {
    for (key, engine) in builtin_engines() {
        engines.entry(key).or_insert(engine);
    }
    engines
}

/// Remove a user-defined engine. Built-ins are protected; removing one
/// is a no-op and returns `false`.
pub fn remove_engine(engines: &mut BTreeMap<String, SearchEngine>, key: &str) -> bool {
    if is_builtin(key) {
        return false;
    }
    engines.remove(key).is_some()
}

//! Locale-prefixed routing.

use serde::{Deserialize, Serialize};

use crate::config::LocaleConfig;

/// Whether the default locale carries a path prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMode {
    /// Every path starts with `/{locale}`.
    #[default]
    Always,
    /// The default locale is served without a prefix.
    AsNeeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRouting {
    pub locales: Vec<String>,
    pub default_locale: String,
    pub prefix: PrefixMode,
}

impl Default for LocaleRouting {
    fn default() -> Self {
        Self {
            locales: vec!["en".to_string()],
            default_locale: "en".to_string(),
            prefix: PrefixMode::Always,
        }
    }
}

impl From<&LocaleConfig> for LocaleRouting {
    fn from(config: &LocaleConfig) -> Self {
        Self {
            locales: config.locales.clone(),
            default_locale: config.default_locale.clone(),
            prefix: config.prefix,
        }
    }
}

impl LocaleRouting {
    pub fn new<I, S>(locales: I, default_locale: impl Into<String>, prefix: PrefixMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locales: locales.into_iter().map(Into::into).collect(),
            default_locale: default_locale.into(),
            prefix,
        }
    }

    pub fn supports(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l.eq_ignore_ascii_case(locale))
    }

    /// Map a raw preference onto a supported locale: exact match first,
    /// then by primary subtag (`fr-FR` becomes `fr`).
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let wanted = raw.trim().replace('_', "-").to_ascii_lowercase();
        if wanted.is_empty() {
            return None;
        }
        if let Some(exact) = self.locales.iter().find(|l| l.eq_ignore_ascii_case(&wanted)) {
            return Some(exact.clone());
        }
        let primary = wanted.split('-').next().unwrap_or_default();
        self.locales
            .iter()
            .find(|l| l.eq_ignore_ascii_case(primary))
            .cloned()
    }

    /// Supported locale named by the first path segment.
    pub fn locale_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        let first = path.trim_start_matches('/').split('/').next()?;
        self.supports(first).then_some(first)
    }
}

/// Rewrite `path` for the `preferred` locale, replacing any existing locale
/// prefix. The query string and fragment are kept as they are.
pub fn localized_path(path: &str, preferred: &str, routing: &LocaleRouting) -> String {
    let split = path.find(|c| c == '?' || c == '#').unwrap_or(path.len());
    let (pathname, suffix) = path.split_at(split);

    let trimmed = pathname.trim_start_matches('/');
    let rest = match routing.locale_of(pathname) {
        Some(current) => trimmed[current.len()..].to_string(),
        None if trimmed.is_empty() => String::new(),
        None => format!("/{trimmed}"),
    };

    let unprefixed = routing.prefix == PrefixMode::AsNeeded
        && preferred.eq_ignore_ascii_case(&routing.default_locale);
    let base = if unprefixed {
        if rest.is_empty() {
            "/".to_string()
        } else {
            rest
        }
    } else {
        format!("/{preferred}{rest}")
    };
    format!("{base}{suffix}")
}

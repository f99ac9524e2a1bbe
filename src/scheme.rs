//! Dark/light preference kept in sync with storage and the root element's classes.
//!
//! The preference stays unresolved until the host calls
//! [`ColorScheme::load_initial`], which reads the stored choice or falls back
//! to the ambient hint. From then on every change re-applies the marker and
//! rewrites storage before the mutating call returns.

use crate::storage::{read_or_absent, write_or_log, Storage};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const COLOR_SCHEME_KEY: &str = "color-scheme";
pub const DARK_CLASS: &str = "dark";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Dark,
    Light,
}

impl Scheme {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Scheme::Dark
        } else {
            Scheme::Light
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Dark => "dark",
            Scheme::Light => "light",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color scheme '{0}' (expected dark or light)")]
pub struct InvalidScheme(pub String);

impl FromStr for Scheme {
    type Err = InvalidScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Scheme::Dark),
            "light" => Ok(Scheme::Light),
            other => Err(InvalidScheme(other.to_string())),
        }
    }
}

/// Environment hint for the default scheme. `None` when unknown.
pub trait AmbientSignal {
    fn prefers_dark(&self) -> Option<bool>;
}

impl<F> AmbientSignal for F
where
    F: Fn() -> Option<bool>,
{
    fn prefers_dark(&self) -> Option<bool> {
        self()
    }
}

/// No ambient hint available.
pub struct NoAmbient;

impl AmbientSignal for NoAmbient {
    fn prefers_dark(&self) -> Option<bool> {
        None
    }
}

/// Presentational flag that styling keys off of.
pub trait SchemeMarker: Send + Sync {
    fn apply(&self, dark: bool);
}

/// Class list of the root element.
#[derive(Debug, Default, Clone)]
pub struct RootClassList {
    classes: Arc<Mutex<BTreeSet<String>>>,
}

impl RootClassList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.lock().map(|c| c.contains(class)).unwrap_or(false)
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.lock().map(|c| c.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn add(&self, class: &str) {
        if let Ok(mut c) = self.classes.lock() {
            c.insert(class.to_string());
        }
    }

    pub fn remove(&self, class: &str) {
        if let Ok(mut c) = self.classes.lock() {
            c.remove(class);
        }
    }
}

impl SchemeMarker for RootClassList {
    fn apply(&self, dark: bool) {
        if dark {
            self.add(DARK_CLASS)
        } else {
            self.remove(DARK_CLASS)
        }
    }
}

pub struct ColorScheme {
    storage: Arc<dyn Storage>,
    marker: Arc<dyn SchemeMarker>,
    dark: Option<bool>,
    loaded: bool,
}

impl ColorScheme {
    pub fn new(storage: Arc<dyn Storage>, marker: Arc<dyn SchemeMarker>) -> Self {
        Self { storage, marker, dark: None, loaded: false }
    }

    /// Resolves the preference: stored choice first, then `ambient`, then light.
    /// Only the first call has any effect.
    pub fn load_initial(&mut self, ambient: &dyn AmbientSignal) {
        if self.loaded {
            log::debug!("color scheme already loaded");
            return;
        }
        self.loaded = true;

        let stored = read_or_absent(self.storage.as_ref(), COLOR_SCHEME_KEY);
        let dark = match stored.as_deref().map(Scheme::from_str) {
            Some(Ok(scheme)) => scheme == Scheme::Dark,
            other => {
                if let Some(Err(e)) = other {
                    log::warn!("ignoring stored preference: {}", e);
                }
                ambient.prefers_dark().unwrap_or(false)
            }
        };
        log::debug!("initial color scheme: {}", Scheme::from_dark(dark));
        self.dark = Some(dark);
        self.sync();
    }

    pub fn toggle(&mut self) {
        self.dark = Some(!self.is_dark());
        self.sync();
    }

    pub fn set_dark(&mut self, dark: bool) {
        if self.dark == Some(dark) {
            return;
        }
        self.dark = Some(dark);
        self.sync();
    }

    pub fn is_dark(&self) -> bool {
        self.dark.unwrap_or(false)
    }

    pub fn is_resolved(&self) -> bool {
        self.dark.is_some()
    }

    pub fn scheme(&self) -> Scheme {
        Scheme::from_dark(self.is_dark())
    }

    fn sync(&self) {
        let dark = self.is_dark();
        self.marker.apply(dark);
        write_or_log(self.storage.as_ref(), COLOR_SCHEME_KEY, Scheme::from_dark(dark).as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn scheme_with(storage: Arc<MemoryStorage>) -> (ColorScheme, RootClassList) {
        let classes = RootClassList::new();
        (ColorScheme::new(storage, Arc::new(classes.clone())), classes)
    }

    #[test]
    fn unresolved_until_loaded() {
        let storage = Arc::new(MemoryStorage::new());
        let (scheme, classes) = scheme_with(storage.clone());
        assert!(!scheme.is_resolved());
        assert!(!classes.contains(DARK_CLASS));
        assert_eq!(storage.get(COLOR_SCHEME_KEY).unwrap(), None);
    }

    #[test]
    fn unknown_stored_value_falls_back_to_ambient() {
        let storage = Arc::new(MemoryStorage::with_entries([(COLOR_SCHEME_KEY, "sepia")]));
        let (mut scheme, classes) = scheme_with(storage.clone());
        scheme.load_initial(&|| Some(true));
        assert!(scheme.is_dark());
        assert!(classes.contains(DARK_CLASS));
        assert_eq!(storage.get(COLOR_SCHEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn second_load_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        let (mut scheme, _) = scheme_with(storage);
        scheme.load_initial(&|| Some(true));
        scheme.toggle();
        scheme.load_initial(&|| Some(true));
        assert!(!scheme.is_dark());
    }

    #[test]
    fn set_dark_same_value_skips_sync() {
        let storage = Arc::new(MemoryStorage::new());
        let (mut scheme, classes) = scheme_with(storage.clone());
        scheme.load_initial(&NoAmbient);
        classes.add(DARK_CLASS);
        scheme.set_dark(false);
        assert!(classes.contains(DARK_CLASS));
        scheme.set_dark(true);
        assert_eq!(storage.get(COLOR_SCHEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn scheme_names_parse() {
        assert_eq!("dark".parse::<Scheme>(), Ok(Scheme::Dark));
        assert_eq!("Dark".parse::<Scheme>(), Err(InvalidScheme("Dark".into())));
        assert_eq!(
            InvalidScheme("sepia".into()).to_string(),
            "unknown color scheme 'sepia' (expected dark or light)"
        );
        assert_eq!(Scheme::from_dark(false).to_string(), "light");
    }
}

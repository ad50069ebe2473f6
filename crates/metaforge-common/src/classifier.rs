//! Boundary-anchored pattern classification of free text.
//!
//! A [`PatternClassifier`] is compiled from the patterned members of a
//! [`DynaEnum`]. Each pattern is wrapped so that it only matches when it is
//! flanked by a boundary character (or the start/end of the input): `dvd`
//! matches `Movie.DVD.avi` and `[DVD]` but never `xdvdx` or `dvdbox`.
//!
//! Categories are tried in a fixed priority order, not in registration
//! order. When nothing matches, the file extension is consulted, and failing
//! that the classifier returns its `unknown` sentinel.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::dyna_enum::{DynaEnum, DynaEnumValue};
use crate::paths::extension_lowercase;

/// Characters that may delimit a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundaries {
    /// Allowed immediately before a token.
    pub leading: String,
    /// Allowed immediately after a token.
    pub trailing: String,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            leading: " .-_/\\[(".to_string(),
            trailing: " .-_/\\])".to_string(),
        }
    }
}

impl Boundaries {
    fn class(chars: &str) -> String {
        chars.chars().map(|c| regex::escape(&c.to_string())).collect()
    }

    /// Wrap `pattern` so it only matches between boundaries.
    fn anchor(&self, pattern: &str) -> String {
        format!(
            "(?:^|[{}])(?:{})(?:[{}]|$)",
            Self::class(&self.leading),
            pattern,
            Self::class(&self.trailing)
        )
    }
}

/// Builder for [`PatternClassifier`].
pub struct ClassifierBuilder<'a> {
    registry: &'a DynaEnum,
    priority: Vec<String>,
    boundaries: Boundaries,
    extensions: Vec<(String, String)>,
    unknown: String,
}

impl<'a> ClassifierBuilder<'a> {
    /// Names tried first, in this order. Patterned values not listed here
    /// are tried afterwards by ordinal.
    pub fn priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn boundaries(mut self, boundaries: Boundaries) -> Self {
        self.boundaries = boundaries;
        self
    }

    /// Map a file extension to a category when no pattern matched.
    pub fn extension(mut self, ext: &str, name: &str) -> Self {
        self.extensions
            .push((ext.trim_start_matches('.').to_lowercase(), name.to_string()));
        self
    }

    /// Name of the sentinel returned when nothing matches.
    pub fn unknown(mut self, name: &str) -> Self {
        self.unknown = name.to_string();
        self
    }

    /// Compile every patterned value of the registry.
    ///
    /// Fails if a pattern is not a valid regular expression.
    pub fn build(self) -> Result<PatternClassifier, regex::Error> {
        let mut ordered: Vec<Arc<DynaEnumValue>> = self
            .priority
            .iter()
            .filter_map(|name| self.registry.get(name))
            .collect();
        for value in self.registry.values_by_ordinal() {
            if !ordered.contains(&value) {
                ordered.push(value);
            }
        }

        let mut rules = Vec::new();
        for value in ordered {
            let Some(pattern) = value.pattern() else {
                continue;
            };
            let regex = RegexBuilder::new(&self.boundaries.anchor(pattern))
                .case_insensitive(true)
                .build()?;
            rules.push((value, regex));
        }

        let extensions = self
            .extensions
            .iter()
            .map(|(ext, name)| (ext.clone(), self.registry.resolve(name)))
            .collect();

        Ok(PatternClassifier {
            rules,
            extensions,
            unknown: self.registry.resolve(&self.unknown),
        })
    }
}

/// Compiled classifier over a registry snapshot.
#[derive(Debug)]
pub struct PatternClassifier {
    rules: Vec<(Arc<DynaEnumValue>, Regex)>,
    extensions: Vec<(String, Arc<DynaEnumValue>)>,
    unknown: Arc<DynaEnumValue>,
}

impl PatternClassifier {
    pub fn builder(registry: &DynaEnum) -> ClassifierBuilder<'_> {
        ClassifierBuilder {
            registry,
            priority: Vec::new(),
            boundaries: Boundaries::default(),
            extensions: Vec::new(),
            unknown: "UNKNOWN".to_string(),
        }
    }

    /// Classify `text`. Pure; never fails.
    pub fn classify(&self, text: &str) -> Arc<DynaEnumValue> {
        if let Some((value, _)) = self.rules.iter().find(|(_, regex)| regex.is_match(text)) {
            return value.clone();
        }

        if let Some(ext) = extension_lowercase(text) {
            if let Some((_, value)) = self.extensions.iter().find(|(e, _)| *e == ext) {
                return value.clone();
            }
        }

        self.unknown.clone()
    }

    /// Names in the order they are tried.
    pub fn order(&self) -> Vec<&str> {
        self.rules.iter().map(|(value, _)| value.name()).collect()
    }
}

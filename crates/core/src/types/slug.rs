//! URL slugs for categories and products.
//!
//! Slugs are derived from a name or title when the admin leaves the field
//! blank: ASCII letters and digits are lowercased, every other run of
//! characters collapses to a single hyphen, and leading/trailing hyphens are
//! dropped.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Maximum slug length (matches the `VARCHAR(255)` column).
const MAX_LENGTH: usize = 255;

/// Errors raised when building a slug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    /// The source text contains nothing sluggable.
    #[error("cannot derive a slug from {0:?}")]
    Empty(String),
    /// An explicitly provided slug contains forbidden characters.
    #[error("invalid slug {0:?}: use lowercase letters, digits and hyphens")]
    Invalid(String),
}

/// A URL-safe identifier such as `a3-fox-print`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from free text.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the text has no ASCII alphanumerics.
    ///
    /// ```
    /// use piffy_core::Slug;
    ///
    /// assert_eq!(Slug::from_title("Framed A3 Print!").unwrap().as_str(), "framed-a3-print");
    /// ```
    pub fn from_title(text: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(text.len());
        let mut pending_hyphen = false;

        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        if slug.is_empty() {
            return Err(SlugError::Empty(text.to_owned()));
        }

        slug.truncate(MAX_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }

        Ok(Self(slug))
    }

    /// Validate an explicitly provided slug.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Invalid`] unless the input is already in slug form.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_LENGTH
            && !s.starts_with('-')
            && !s.ends_with('-')
            && !s.contains("--")
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(SlugError::Invalid(s.to_owned()))
        }
    }

    /// Use the explicit slug if one was given, otherwise derive it from `title`.
    ///
    /// # Errors
    ///
    /// Propagates [`Slug::parse`] or [`Slug::from_title`] errors.
    pub fn explicit_or_derived(explicit: Option<&str>, title: &str) -> Result<Self, SlugError> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => Self::parse(slug),
            None => Self::from_title(title),
        }
    }

    /// Slug used for a duplicated product (`original-copy`).
    #[must_use]
    pub fn copy_of(&self) -> Self {
        let mut base = self.0.clone();
        base.truncate(MAX_LENGTH - "-copy".len());
        Self(format!("{}-copy", base.trim_end_matches('-')))
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

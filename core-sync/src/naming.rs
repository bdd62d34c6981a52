//! # Naming Conventions
//!
//! Volume-number extraction and the storage key layout.
//!
//! ## Layout
//!
//! ```text
//! series/{slug}/volume-{NNN}/{NNN}.{ext}
//! ```
//!
//! Numeric segments are left-zero-padded to three digits. Wider numbers are
//! written in full, never truncated.
//!
//! ## Volume numbers
//!
//! [`VolumeNameParser`] holds an ordered list of patterns; the first pattern
//! that matches a name wins. Local source folders use loose, human naming
//! (`Vol 3`, `volume_03`, `v12`, `7`); bucket folders use the fixed
//! `volume-{digits}` form. A loose pattern can match digits that are not the
//! volume number (`Vol 2 (2019 v3 reprint)` parses as 2, `v3 - Chapter 12`
//! parses as 3); callers that need stricter parsing supply their own patterns.
//! Volume 0 never parses.

use regex::{Regex, RegexBuilder};

/// Top-level storage prefix under which every series lives
pub const SERIES_ROOT: &str = "series";

/// Local folder naming, tried in order
pub const LOCAL_VOLUME_PATTERNS: &[&str] = &[
    r"v(?:ol)?(?:ume)?\s*(\d+)",
    r"volume[_\s-]*(\d+)",
    r"vol[_\s-]*(\d+)",
    r"^\s*(\d+)\s*$",
];

/// Bucket folder naming
pub const BUCKET_VOLUME_PATTERNS: &[&str] = &[r"volume-(\d+)"];

/// Ordered, case-insensitive volume-number patterns
#[derive(Debug, Clone)]
pub struct VolumeNameParser {
    patterns: Vec<Regex>,
}

impl VolumeNameParser {
    /// Compile `patterns`; each must have one capture group for the digits.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Parser for local source folder names
    pub fn local() -> Self {
        Self::builtin(LOCAL_VOLUME_PATTERNS)
    }

    /// Parser for `volume-{digits}` bucket folders
    pub fn bucket() -> Self {
        Self::builtin(BUCKET_VOLUME_PATTERNS)
    }

    fn builtin(patterns: &[&str]) -> Self {
        // Built-in patterns are literals covered by tests.
        Self {
            patterns: patterns
                .iter()
                .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
                .collect(),
        }
    }

    /// Extract a volume number; `None` when nothing matches or the number is 0
    pub fn parse(&self, name: &str) -> Option<u32> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(name))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|n| *n > 0)
    }
}

/// Left-pad to three digits
pub fn pad_number(n: u32) -> String {
    format!("{:03}", n)
}

/// `volume-NNN`
pub fn volume_folder_name(volume: u32) -> String {
    format!("volume-{}", pad_number(volume))
}

/// `NNN.ext` for the 1-based `position` within a volume
pub fn page_file_name(position: u32, extension: &str) -> String {
    format!("{}.{}", pad_number(position), extension)
}

/// `series/{slug}/`
pub fn series_prefix(slug: &str) -> String {
    format!("{}/{}/", SERIES_ROOT, slug)
}

/// `series/{slug}/volume-NNN/`
pub fn volume_prefix(slug: &str, volume: u32) -> String {
    format!("{}{}/", series_prefix(slug), volume_folder_name(volume))
}

/// `series/{slug}/volume-NNN/{file_name}`
pub fn object_key(slug: &str, volume: u32, file_name: &str) -> String {
    format!("{}{}", volume_prefix(slug, volume), file_name)
}

/// Public URL of a series cover: the first page of volume 1
///
/// Without a CDN base the bare object key is returned.
pub fn cover_url(cdn_base: Option<&str>, slug: &str) -> String {
    let key = object_key(slug, 1, &page_file_name(1, "webp"));
    match cdn_base {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => key,
    }
}

/// Lowercase, collapse runs of non-alphanumerics into `-`, trim dashes
///
/// ```
/// use core_sync::naming::generate_slug;
///
/// assert_eq!(generate_slug("  One Piece: Vol. 1! "), "one-piece-vol-1");
/// ```
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Last non-empty path segment of a key or prefix
pub fn last_segment(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

//! Persisted reading state: which image was open last and which page each
//! image was left on.

use std::fmt;
use std::path::Path;

use crate::store::KeyValueStore;

pub const KEY_LAST_PAGE_PREFIX: &str = "last_page_";
pub const KEY_LAST_IMAGE_URI: &str = "last_image_uri";
pub const KEY_PAGE_OVERLAP: &str = "page_overlap";

/// Stable identity of a source image, derived from where it was loaded from
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageIdentity(String);

impl ImageIdentity {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Identity of a file on disk. Uses the canonical path when it resolves so
    /// that relative and absolute spellings share a position.
    pub fn from_path(path: &Path) -> Self {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self(resolved.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key for this image's page index. md5 keeps the key stable across
    /// runs and platforms, unlike `std::hash`.
    pub fn position_key(&self) -> String {
        let digest = md5::compute(self.0.as_bytes());
        format!("{KEY_LAST_PAGE_PREFIX}{digest:x}")
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn saved_page<S: KeyValueStore + ?Sized>(store: &S, identity: &ImageIdentity) -> usize {
    usize::try_from(store.get_int(&identity.position_key(), 0)).unwrap_or(0)
}

pub fn save_page<S: KeyValueStore + ?Sized>(
    store: &mut S,
    identity: &ImageIdentity,
    page_index: usize,
) -> anyhow::Result<()> {
    let value = i64::try_from(page_index).unwrap_or(i64::MAX);
    store.put_int(&identity.position_key(), value)
}

pub fn last_opened<S: KeyValueStore + ?Sized>(store: &S) -> Option<ImageIdentity> {
    store
        .get_string(KEY_LAST_IMAGE_URI)
        .filter(|s| !s.is_empty())
        .map(ImageIdentity)
}

pub fn save_last_opened<S: KeyValueStore + ?Sized>(
    store: &mut S,
    identity: &ImageIdentity,
) -> anyhow::Result<()> {
    store.put_string(KEY_LAST_IMAGE_URI, identity.as_str())
}

pub fn saved_overlap<S: KeyValueStore + ?Sized>(store: &S) -> u8 {
    store.get_int(KEY_PAGE_OVERLAP, 0).clamp(0, 100) as u8
}

pub fn save_overlap<S: KeyValueStore + ?Sized>(store: &mut S, percent: u8) -> anyhow::Result<()> {
    store.put_int(KEY_PAGE_OVERLAP, i64::from(percent))
}

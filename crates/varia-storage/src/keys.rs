//! Shared key generation for storage backends.
//!
//! Cached files: `{cache_dir}/{cache_id}/{full_filename}`.
//! Stored files: `{store_dir}/{full_filename}`.
//! `full_filename` is the original filename prefixed by the qualified version
//! name, e.g. `thumb_small_photo.jpg` for version `thumb_small`.

/// Join path segments with `/`, trimming stray slashes and skipping empty parts.
pub fn join_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Prefix `filename` with the qualified version name, if there is one.
pub fn full_filename(version_name: Option<&str>, separator: &str, filename: &str) -> String {
    match version_name {
        Some(name) if !name.is_empty() => format!("{}{}{}", name, separator, filename),
        _ => filename.to_string(),
    }
}

/// Key of a cached file.
pub fn cache_key(cache_dir: &str, cache_id: &str, full_filename: &str) -> String {
    join_key([cache_dir, cache_id, full_filename])
}

/// Key of a stored file.
pub fn store_key(store_dir: &str, full_filename: &str) -> String {
    join_key([store_dir, full_filename])
}

/// Cache name handed to hosts so they can re-attach to a caching session:
/// `{cache_id}/{original_filename}`.
pub fn cache_name(cache_id: &str, original_filename: &str) -> String {
    format!("{}/{}", cache_id, original_filename)
}

/// Split a cache name into `(cache_id, original_filename)`.
pub fn split_cache_name(cache_name: &str) -> Option<(&str, &str)> {
    let (cache_id, filename) = cache_name.split_once('/')?;
    if cache_id.is_empty() || filename.is_empty() || filename.contains('/') {
        return None;
    }
    Some((cache_id, filename))
}

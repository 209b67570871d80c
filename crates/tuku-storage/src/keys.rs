//! Storage areas and key helpers.

/// Files received but not yet judged
pub const TMP_AREA: &str = "tmp";
/// Publicly served images
pub const UPLOADS_AREA: &str = "uploads";
/// Rejected content kept for audit; never routed
pub const QUARANTINE_AREA: &str = "quarantine";

pub const ALL_AREAS: [&str; 3] = [TMP_AREA, UPLOADS_AREA, QUARANTINE_AREA];

pub fn key(area: &str, name: &str) -> String {
    format!("{}/{}", area, name)
}

pub fn tmp_key(name: &str) -> String {
    key(TMP_AREA, name)
}

pub fn upload_key(name: &str) -> String {
    key(UPLOADS_AREA, name)
}

pub fn quarantine_key(name: &str) -> String {
    key(QUARANTINE_AREA, name)
}

/// Last path segment of a key
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

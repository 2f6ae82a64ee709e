//! Default values shared by configuration and the key layout.

pub const DEFAULT_CACHE_DIR: &str = "uploads/tmp";
pub const DEFAULT_STORE_DIR: &str = "uploads";
pub const DEFAULT_VERSION_SEPARATOR: &str = "_";
pub const DEFAULT_LOCAL_STORAGE_PATH: &str = "./storage";
pub const DEFAULT_LOCAL_STORAGE_BASE_URL: &str = "http://localhost:3000/files";

/// Longest filename kept after sanitization.
pub const MAX_FILENAME_LEN: usize = 255;

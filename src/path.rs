use std::path::PathBuf;

use anyhow::anyhow;

/// Per-user cache directory for offpack.
pub fn offpack_cache_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::cache_dir()
        .ok_or(anyhow!("missing cache directory"))?
        .join("offpack");
    Ok(dir)
}

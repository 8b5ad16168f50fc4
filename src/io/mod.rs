mod local;

pub use local::LocalFileReader;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for random access reading from an archive source.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Fill `buf` completely with data starting at `offset`.
    ///
    /// Fails if the source ends before the buffer is full; zip structures
    /// have exact sizes, so a short read always means a truncated archive.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size of the archive in bytes.
    fn size(&self) -> u64;
}

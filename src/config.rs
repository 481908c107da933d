//! Configuration for the AtlasKV resource layer
//!
//! Centralized configuration with sensible defaults.

/// Size of the write-combining buffer inside every writable file
pub const WRITABLE_FILE_BUFFER_SIZE: usize = 65536;

/// Number of mmap regions allowed by default (none on 32-bit targets,
/// where address space is the scarcer resource)
pub const DEFAULT_MMAP_LIMIT: usize = if std::mem::size_of::<usize>() >= 8 { 1000 } else { 0 };

/// Main configuration for the file and cache layer
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Budget Configuration
    // -------------------------------------------------------------------------
    /// Max descriptors kept permanently open by random-access files.
    /// `None` derives the budget from RLIMIT_NOFILE (a fifth of the soft limit).
    pub read_only_file_limit: Option<usize>,

    /// Max concurrently mapped random-access files
    pub mmap_limit: usize,

    // -------------------------------------------------------------------------
    // Writable File Configuration
    // -------------------------------------------------------------------------
    /// Write-combining buffer size (in bytes)
    pub writable_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Block Cache Configuration
    // -------------------------------------------------------------------------
    /// Total charge the block cache may hold (in caller units, usually bytes)
    pub block_cache_capacity: usize,

    /// log2 of the shard count
    pub cache_shard_bits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_only_file_limit: None,
            mmap_limit: DEFAULT_MMAP_LIMIT,
            writable_buffer_size: WRITABLE_FILE_BUFFER_SIZE,
            block_cache_capacity: 8 * 1024 * 1024, // 8 MB
            cache_shard_bits: 4,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set an explicit permanent-descriptor budget
    pub fn read_only_file_limit(mut self, limit: usize) -> Self {
        self.config.read_only_file_limit = Some(limit);
        self
    }

    /// Set the mmap budget (0 disables mmap reads)
    pub fn mmap_limit(mut self, limit: usize) -> Self {
        self.config.mmap_limit = limit;
        self
    }

    /// Set the writable file buffer size (in bytes)
    pub fn writable_buffer_size(mut self, size: usize) -> Self {
        self.config.writable_buffer_size = size.max(1);
        self
    }

    /// Set the block cache capacity
    pub fn block_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.block_cache_capacity = capacity;
        self
    }

    /// Set log2 of the cache shard count
    pub fn cache_shard_bits(mut self, bits: u32) -> Self {
        self.config.cache_shard_bits = bits.min(crate::cache::MAX_SHARD_BITS);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

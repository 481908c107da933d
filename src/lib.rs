//! # AtlasKV Env
//!
//! Resource-management layer of the AtlasKV storage engine:
//! - Reference-counted, sharded LRU block cache with charge accounting
//! - Sequential, random-access (pread or mmap) and writable files
//! - Admission gates bounding descriptors and mmaps held at once
//! - Manifest-aware durability on sync
//! - Best-effort info logging
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Storage engine (memtable, tables, WAL)            │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!   ┌─────────────────────────┐     ┌─────────────────────────┐
//!   │       Block Cache       │     │           Env           │
//!   │ ShardedLruCache (16×)   │     │  PosixEnv               │
//!   │  ┌───────┐ ┌───────┐    │     │   ├─ SequentialFile     │
//!   │  │LruCache│ │LruCache│ … │     │   ├─ RandomAccessFile   │
//!   │  └───────┘ └───────┘    │     │   │   (mmap │ pread)    │
//!   └─────────────────────────┘     │   ├─ WritableFile       │
//!                                   │   └─ Logger             │
//!                                   │  AdmissionGate ×2       │
//!                                   └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod slice;

pub mod env;
pub mod cache;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cache::{Cache, Handle, HandleGuard, LruCache, ShardedLruCache};
pub use config::Config;
pub use env::{AdmissionGate, Env, PosixEnv};
pub use error::{Result, Status};
pub use slice::ByteView;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of atlaskv-env
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

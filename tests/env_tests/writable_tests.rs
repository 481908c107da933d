//! Writable file tests

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use atlaskv_env::env::{Env, PosixWritableFile, WritableFile};

use super::{pattern, setup_env};

fn open(path: &Path) -> File {
    OpenOptions::new().create(true).write(true).open(path).unwrap()
}

// =============================================================================
// Buffering
// =============================================================================

#[test]
fn test_append_stays_buffered_until_flush() {
    let (temp, _env) = setup_env(10, 0);
    let path = temp.path().join("000001.log");
    let file = open(&path);

    let mut writable = PosixWritableFile::new(&path, file);
    writable.append(b"pending").unwrap();

    assert_eq!(writable.buffered_len(), 7);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    writable.flush().unwrap();
    assert_eq!(writable.buffered_len(), 0);
    assert_eq!(fs::read(&path).unwrap(), b"pending");
}

#[test]
fn test_large_append_round_trips() {
    let (temp, env) = setup_env(10, 0);
    let data = pattern(70000);

    let single = temp.path().join("single.log");
    let mut writable = env.new_writable_file(&single).unwrap();
    writable.append(&data).unwrap();
    writable.sync().unwrap();
    writable.close().unwrap();

    let split = temp.path().join("split.log");
    let mut writable = env.new_writable_file(&split).unwrap();
    writable.append(&data[..40000]).unwrap();
    writable.append(&data[40000..]).unwrap();
    writable.sync().unwrap();
    writable.close().unwrap();

    for path in [&single, &split] {
        let reader = env.new_random_access_file(path).unwrap();
        let mut scratch = vec![0u8; data.len()];
        let view = reader.read(0, data.len(), &mut scratch).unwrap();
        assert_eq!(view.as_bytes(), &data[..]);
    }
}

#[test]
fn test_small_buffer_writes_through() {
    let (temp, _env) = setup_env(10, 0);
    let path = temp.path().join("000002.log");
    let file = open(&path);

    let mut writable = PosixWritableFile::with_buffer_size(&path, file, 8);
    writable.append(b"0123").unwrap();
    writable.append(b"456789abcdefghij").unwrap();

    // 4 more bytes fill the buffer; the 12 left over exceed it and are
    // written straight through.
    assert_eq!(writable.buffered_len(), 0);
    assert_eq!(fs::read(&path).unwrap(), b"0123456789abcdefghij");
}

#[test]
fn test_writable_truncates_existing_file() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("000003.log");
    fs::write(&path, b"stale contents").unwrap();

    let mut writable = env.new_writable_file(&path).unwrap();
    writable.append(b"new").unwrap();
    writable.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"new");
}

// =============================================================================
// Durability
// =============================================================================

#[test]
fn test_manifest_detection() {
    let (temp, _env) = setup_env(10, 0);
    let manifest = temp.path().join("MANIFEST-000001");
    let table = temp.path().join("000001.ldb");
    let nested = temp.path().join("MANIFEST-dir").join("CURRENT");
    fs::create_dir(temp.path().join("MANIFEST-dir")).unwrap();

    assert!(PosixWritableFile::new(&manifest, open(&manifest)).is_manifest());
    assert!(!PosixWritableFile::new(&table, open(&table)).is_manifest());
    assert!(!PosixWritableFile::new(&nested, open(&nested)).is_manifest());
}

#[test]
fn test_manifest_sync_persists_contents() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("MANIFEST-000002");

    let mut writable = env.new_writable_file(&path).unwrap();
    writable.append(b"edit record").unwrap();
    writable.sync().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"edit record");
    writable.close().unwrap();
}

#[test]
fn test_manifest_sync_requires_parent_directory() {
    let (temp, env) = setup_env(10, 0);
    let db = temp.path().join("db");
    fs::create_dir(&db).unwrap();
    let manifest_path = db.join("MANIFEST-000001");
    let log_path = db.join("000001.log");

    let mut manifest = env.new_writable_file(&manifest_path).unwrap();
    let mut log = env.new_writable_file(&log_path).unwrap();

    // With the directory gone only the manifest has something to fsync
    // beyond its own descriptor.
    fs::remove_file(&manifest_path).unwrap();
    fs::remove_file(&log_path).unwrap();
    fs::remove_dir(&db).unwrap();

    manifest.append(b"edit record").unwrap();
    log.append(b"log record").unwrap();

    let err = manifest.sync().unwrap_err();
    assert!(err.is_not_found(), "unexpected status: {}", err);
    assert!(err.message().contains("db"));
    log.sync().unwrap();
}

#[test]
fn test_sync_flushes_buffer() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("000004.log");

    let mut writable = env.new_writable_file(&path).unwrap();
    writable.append(b"durable").unwrap();
    writable.sync().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"durable");
}

// =============================================================================
// Close / Drop
// =============================================================================

#[test]
fn test_close_flushes_buffer() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("000005.log");

    let mut writable = env.new_writable_file(&path).unwrap();
    writable.append(b"closing").unwrap();
    writable.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"closing");
}

#[test]
fn test_drop_flushes_buffer() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("000006.log");

    {
        let mut writable = env.new_writable_file(&path).unwrap();
        writable.append(b"dropped").unwrap();
    }

    assert_eq!(fs::read(&path).unwrap(), b"dropped");
}

#[test]
fn test_close_reports_flush_error() {
    let (temp, _env) = setup_env(10, 0);
    let path = temp.path().join("000008.log");
    fs::write(&path, b"").unwrap();

    // Read-only descriptor: the buffered bytes cannot be written out.
    let mut writable = PosixWritableFile::new(&path, File::open(&path).unwrap());
    writable.append(b"abc").unwrap();

    let err = writable.close().unwrap_err();
    assert!(err.is_io_error(), "unexpected status: {}", err);
    assert!(err.message().contains("000008.log"));
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_failed_write_through_is_io_error() {
    let (temp, _env) = setup_env(10, 0);
    let path = temp.path().join("000009.log");
    fs::write(&path, b"").unwrap();

    let mut writable = PosixWritableFile::with_buffer_size(&path, File::open(&path).unwrap(), 4);
    let err = writable.append(b"larger than the buffer").unwrap_err();

    assert!(err.is_io_error(), "unexpected status: {}", err);
    assert_eq!(writable.buffered_len(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_close_twice_is_ok() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("000007.log");

    let mut writable = env.new_writable_file(&path).unwrap();
    writable.close().unwrap();
    writable.close().unwrap();
}

#[test]
fn test_appendable_file_keeps_existing_data() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("LOG");
    fs::write(&path, b"first|").unwrap();

    let mut writable = env.new_appendable_file(&path).unwrap();
    writable.append(b"second").unwrap();
    writable.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"first|second");
}

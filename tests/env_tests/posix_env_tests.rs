//! PosixEnv filesystem operation tests

use std::fs;
use std::path::Path;

use atlaskv_env::env::{
    read_file_to_vec, write_to_file, write_to_file_sync, Env, Logger, RandomAccessFile,
    SequentialFile, WritableFile,
};
use atlaskv_env::{PosixEnv, Result};

use super::{setup_env, write_fixture};

// =============================================================================
// Whole-file Helpers
// =============================================================================

#[test]
fn test_write_then_read_whole_file() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("CURRENT");

    write_to_file(&env, b"MANIFEST-000005\n", &path).unwrap();
    assert_eq!(read_file_to_vec(&env, &path).unwrap(), b"MANIFEST-000005\n");

    let big: Vec<u8> = (0..20000u32).map(|i| (i % 97) as u8).collect();
    write_to_file_sync(&env, &big, &path).unwrap();
    assert_eq!(read_file_to_vec(&env, &path).unwrap(), big);
}

#[test]
fn test_write_to_missing_dir_fails_cleanly() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("no-such-dir").join("CURRENT");

    let err = write_to_file(&env, b"data", &path).unwrap_err();

    assert!(err.is_not_found());
    assert!(!path.exists());
}

#[test]
fn test_read_missing_file_is_not_found() {
    let (temp, env) = setup_env(10, 0);

    let err = read_file_to_vec(&env, &temp.path().join("CURRENT")).unwrap_err();

    assert!(err.is_not_found());
}

// =============================================================================
// Filesystem Operations
// =============================================================================

#[test]
fn test_children_exists_and_size() {
    let (temp, env) = setup_env(10, 0);
    write_fixture(&temp, "000001.ldb", b"12345");
    write_fixture(&temp, "000002.log", b"");

    let mut children = env.get_children(temp.path()).unwrap();
    children.sort();

    assert_eq!(children, vec!["000001.ldb".to_string(), "000002.log".to_string()]);
    assert!(env.file_exists(&temp.path().join("000001.ldb")));
    assert!(!env.file_exists(&temp.path().join("000003.ldb")));
    assert_eq!(env.get_file_size(&temp.path().join("000001.ldb")).unwrap(), 5);
    assert_eq!(env.get_file_size(&temp.path().join("000002.log")).unwrap(), 0);
}

#[test]
fn test_rename_and_remove() {
    let (temp, env) = setup_env(10, 0);
    let from = write_fixture(&temp, "CURRENT.tmp", b"MANIFEST-000001\n");
    let to = temp.path().join("CURRENT");

    env.rename_file(&from, &to).unwrap();
    assert!(!env.file_exists(&from));
    assert_eq!(fs::read(&to).unwrap(), b"MANIFEST-000001\n");

    env.remove_file(&to).unwrap();
    assert!(!env.file_exists(&to));
    assert!(env.remove_file(&to).unwrap_err().is_not_found());
}

#[test]
fn test_create_and_remove_dir() {
    let (temp, env) = setup_env(10, 0);
    let dir = temp.path().join("db");

    env.create_dir(&dir).unwrap();
    assert!(env.file_exists(&dir));
    assert!(env.create_dir(&dir).unwrap_err().is_io_error());

    env.remove_dir(&dir).unwrap();
    assert!(!env.file_exists(&dir));
}

#[test]
fn test_missing_paths_map_to_not_found() {
    let (temp, env) = setup_env(10, 0);
    let missing = temp.path().join("missing");

    assert!(env.get_children(&missing).unwrap_err().is_not_found());
    assert!(env.get_file_size(&missing).unwrap_err().is_not_found());
    assert!(env
        .rename_file(&missing, &temp.path().join("other"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_new_logger_appends_to_file() {
    let (temp, env) = setup_env(10, 0);
    let path = temp.path().join("LOG");

    {
        let logger = env.new_logger(&path).unwrap();
        logger.logv(format_args!("opened"));
    }
    {
        let logger = env.new_logger(&path).unwrap();
        logger.logv(format_args!("reopened"));
    }

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" opened"));
    assert!(lines[1].ends_with(" reopened"));
}

#[test]
fn test_default_env_opens_files() {
    let (temp, _env) = setup_env(10, 0);
    let env = PosixEnv::default();
    let path = write_fixture(&temp, "000001.ldb", b"default");

    assert!(env.fd_limiter().budget() > 0);
    assert!(env.fd_limiter().budget() <= i32::MAX as usize);
    let file = env.new_random_access_file(&path).unwrap();
    let mut scratch = [0u8; 7];
    assert_eq!(file.read(0, 7, &mut scratch).unwrap().as_bytes(), b"default");
}

// =============================================================================
// Trait Defaults
// =============================================================================

/// Env that only overrides the required methods, delegating to PosixEnv
struct MinimalEnv(PosixEnv);

impl Env for MinimalEnv {
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>> {
        self.0.new_sequential_file(path)
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>> {
        self.0.new_random_access_file(path)
    }

    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        self.0.new_writable_file(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.0.file_exists(path)
    }

    fn get_children(&self, dir: &Path) -> Result<Vec<String>> {
        self.0.get_children(dir)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.0.remove_file(path)
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        self.0.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.0.remove_dir(path)
    }

    fn get_file_size(&self, path: &Path) -> Result<u64> {
        self.0.get_file_size(path)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.0.rename_file(from, to)
    }

    fn new_logger(&self, path: &Path) -> Result<Box<dyn Logger>> {
        self.0.new_logger(path)
    }
}

#[test]
fn test_default_appendable_is_not_supported() {
    let (temp, env) = setup_env(10, 0);
    let env = MinimalEnv(env);
    let path = temp.path().join("LOG");

    let err = env.new_appendable_file(&path).err().unwrap();

    assert!(err.is_not_supported());
    assert!(err.to_string().starts_with("Not implemented: NewAppendableFile"));

    // Helpers work through any Env.
    write_to_file(&env, b"via trait object", &path).unwrap();
    assert_eq!(read_file_to_vec(&env, &path).unwrap(), b"via trait object");
}

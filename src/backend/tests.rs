//! Contract tests run against every backend variant.

use super::*;
use tempfile::TempDir;

/// One instance of every backend, each in its own temp location.
fn all_backends(tmp: &TempDir) -> Vec<Box<dyn Backend>> {
    let dir = tmp.path();
    vec![
        Box::new(MemoryBackend::new()),
        Box::new(RedbBackend::open(dir.join("kv.redb")).unwrap()),
        Box::new(SqliteBackend::open(dir.join("kv.sqlite")).unwrap()),
        Box::new(FileBackend::open(dir.join("kv.json")).unwrap()),
        Box::new(PreferencesBackend::open(dir.join("KVSP.toml")).unwrap()),
        Box::new(PackedStore::open(dir.join("packed.redb")).unwrap()),
    ]
}

#[test]
fn test_put_and_get() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("key1", "value1").unwrap();
        assert_eq!(
            backend.get("key1").unwrap().as_deref(),
            Some("value1"),
            "{}",
            backend.name()
        );
    }
}

#[test]
fn test_overwrite() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("key1", "old").unwrap();
        backend.put("key1", "new").unwrap();
        assert_eq!(backend.get("key1").unwrap().as_deref(), Some("new"));
        assert_eq!(backend.count().unwrap(), 1, "{}", backend.name());
    }
}

#[test]
fn test_absent_is_not_empty() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("empty", "").unwrap();
        assert_eq!(
            backend.get("empty").unwrap(),
            Some(String::new()),
            "{}",
            backend.name()
        );
        assert_eq!(backend.get("missing").unwrap(), None, "{}", backend.name());
        assert!(backend.contains("empty").unwrap());
        assert!(!backend.contains("missing").unwrap());
    }
}

#[test]
fn test_delete() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("key1", "value1").unwrap();
        assert!(backend.delete("key1").unwrap(), "{}", backend.name());
        assert!(!backend.delete("key1").unwrap(), "{}", backend.name());
        assert_eq!(backend.get("key1").unwrap(), None);
    }
}

#[test]
fn test_delete_all_twice() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("a", "1").unwrap();
        backend.put("b", "2").unwrap();
        backend.delete_all().unwrap();
        backend.delete_all().unwrap();
        assert_eq!(backend.count().unwrap(), 0, "{}", backend.name());
        assert!(backend.get_all().unwrap().is_empty());
    }
}

#[test]
fn test_get_all_snapshot() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("a", "1").unwrap();
        backend.put("b", "{\"x\": [1, 2]}").unwrap();
        let all = backend.get_all().unwrap();
        backend.put("c", "3").unwrap();

        assert_eq!(all.len(), 2, "{}", backend.name());
        assert_eq!(all.get("b").map(String::as_str), Some("{\"x\": [1, 2]}"));
    }
}

#[test]
fn test_unicode_keys_and_values() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        backend.put("ключ 🔑", "значение\n\"quoted\"").unwrap();
        assert_eq!(
            backend.get("ключ 🔑").unwrap().as_deref(),
            Some("значение\n\"quoted\""),
            "{}",
            backend.name()
        );
    }
}

#[test]
fn test_persistent_backends_reopen() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    {
        let redb = RedbBackend::open(dir.join("kv.redb")).unwrap();
        let sqlite = SqliteBackend::open(dir.join("kv.sqlite")).unwrap();
        let file = FileBackend::open(dir.join("kv.json")).unwrap();
        let prefs = PreferencesBackend::open(dir.join("KVSP.toml")).unwrap();
        for backend in [&redb as &dyn Backend, &sqlite, &file, &prefs] {
            backend.put("persist", "yes").unwrap();
        }
    }

    let reopened: Vec<Box<dyn Backend>> = vec![
        Box::new(RedbBackend::open(dir.join("kv.redb")).unwrap()),
        Box::new(SqliteBackend::open(dir.join("kv.sqlite")).unwrap()),
        Box::new(FileBackend::open(dir.join("kv.json")).unwrap()),
        Box::new(PreferencesBackend::open(dir.join("KVSP.toml")).unwrap()),
    ];
    for backend in reopened {
        assert_eq!(
            backend.get("persist").unwrap().as_deref(),
            Some("yes"),
            "{}",
            backend.name()
        );
    }
}

#[test]
fn test_arc_backend_shares_state() {
    let shared = Arc::new(MemoryBackend::new());
    let handle: Box<dyn Backend> = Box::new(Arc::clone(&shared));
    handle.put("a", "1").unwrap();
    assert_eq!(shared.get("a").unwrap().as_deref(), Some("1"));
}

#[test]
fn test_only_packed_store_probes() {
    let tmp = TempDir::new().unwrap();
    for backend in all_backends(&tmp) {
        assert_eq!(backend.as_probe().is_some(), backend.name() == "packed");
    }
}

//! Saga Session Store (C8) persistence tests covering scenario S6: a
//! corrupt on-disk transcript must fail loudly and must never be
//! silently overwritten by the loader.

use clood::{Error, Saga};
use std::fs;

#[test]
fn load_or_create_rejects_corrupt_saga_file_scenario_s6() {
    let dir = tempfile::tempdir().unwrap();
    let saga_dir = dir.path().join(".clood");
    fs::create_dir_all(&saga_dir).unwrap();
    let saga_path = saga_dir.join("saga.json");
    fs::write(&saga_path, b"not valid json{{{").unwrap();

    let before = fs::read_to_string(&saga_path).unwrap();

    let err = Saga::load_or_create(dir.path()).unwrap_err();
    assert!(matches!(err, Error::CorruptSaga(_)));
    assert_eq!(err.kind(), "corrupt_saga");

    let after = fs::read_to_string(&saga_path).unwrap();
    assert_eq!(before, after, "a failed load must not touch the corrupt file on disk");
}

#[test]
fn load_or_create_returns_none_when_cloodignore_present() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".cloodignore"), b"").unwrap();

    let saga = Saga::load_or_create(dir.path()).unwrap();
    assert!(saga.is_none());
    assert!(!dir.path().join(".clood").exists());
}

#[test]
fn save_then_load_round_trips_and_is_atomic() {
    let dir = tempfile::tempdir().unwrap();

    let mut saga = Saga::load_or_create(dir.path()).unwrap().unwrap();
    saga.append_user("hello");
    saga.append_assistant("hi there");
    saga.save().unwrap();

    let tmp_path = dir.path().join(".clood").join("saga.json.tmp");
    assert!(!tmp_path.exists(), "save must rename the temp file away, not leave it behind");

    let reloaded = Saga::load_or_create(dir.path()).unwrap().unwrap();
    assert_eq!(reloaded.messages.len(), 2);
}

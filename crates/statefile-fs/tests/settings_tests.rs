use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use statefile_fs::{ErrorKind, LockConfig, SettingsStore};
use statefile_test_utils::StateDir;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct AgentSettings {
    #[serde(default)]
    runs: u64,
    #[serde(default)]
    modulepath: Option<String>,
}

#[rstest]
#[case("agent.toml")]
#[case("agent.json")]
#[case("agent.yaml")]
#[case("agent.yml")]
fn save_then_load(#[case] name: &str) {
    let dir = StateDir::new();
    let path = dir.path(name);
    let store = SettingsStore::new();
    let settings = AgentSettings {
        runs: 3,
        modulepath: Some("/etc/agent/modules".into()),
    };

    store.save(&path, &settings).unwrap();
    let loaded: AgentSettings = store.load(&path).unwrap();

    assert_eq!(loaded, settings);
}

#[test]
fn save_creates_parent_directories() {
    let dir = StateDir::new();
    let path = dir.path("nested/conf/agent.toml");

    SettingsStore::new()
        .save(&path, &AgentSettings::default())
        .unwrap();

    assert!(path.exists());
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = StateDir::new();
    let err = SettingsStore::new()
        .load::<AgentSettings>(dir.path("absent.toml"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn load_reports_parse_errors_with_format() {
    let dir = StateDir::new();
    let path = dir.file_containing("broken.json", "{ not json");

    let err = SettingsStore::new().load::<AgentSettings>(&path).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Settings);
    assert!(err.to_string().starts_with("Failed to parse JSON settings"), "{err}");
}

#[test]
fn update_starts_from_default_when_missing() {
    let dir = StateDir::new();
    let path = dir.path("counter.toml");

    let updated = SettingsStore::new()
        .update(&path, |s: &mut AgentSettings| s.runs += 1)
        .unwrap();

    assert_eq!(updated.runs, 1);
    dir.assert_file_contains("counter.toml", "runs = 1\n");
}

#[test]
fn update_without_change_does_not_rewrite() {
    let dir = StateDir::new();
    // not in canonical rendering, so a rewrite would be visible
    let path = dir.file_containing("agent.json", "{\"runs\": 7}");

    let value = SettingsStore::new()
        .update(&path, |_: &mut AgentSettings| {})
        .unwrap_or_else(|e| panic!("update failed: {e}"));

    assert_eq!(value.runs, 7);
    dir.assert_file_contains("agent.json", "{\"runs\": 7}");
}

#[test]
fn concurrent_updates_lose_nothing() {
    let dir = StateDir::new();
    let path = Arc::new(dir.path("shared.yaml"));
    let num_threads = 6;
    let updates_per_thread = 5;
    let barrier = Arc::new(Barrier::new(num_threads));
    let store = SettingsStore::with_config(
        LockConfig::default().with_timeout(Some(Duration::from_secs(30))),
    );

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            let store = store.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..updates_per_thread {
                    store
                        .update(&*path, |s: &mut AgentSettings| s.runs += 1)
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let settings: AgentSettings = store.load(&*path).unwrap();
    assert_eq!(settings.runs, (num_threads * updates_per_thread) as u64);
}

#[test]
fn lock_config_can_live_in_settings() {
    #[derive(Debug, Deserialize)]
    struct Outer {
        lock: LockConfig,
    }

    let dir = StateDir::new();
    let path = dir.file_containing(
        "agent.yaml",
        "lock:\n  mode: truncate-create\n  timeout_ms: 1500\n  sync_on_release: true\n",
    );

    let outer: Outer = SettingsStore::new().load(&path).unwrap();

    assert_eq!(outer.lock.timeout, Some(Duration::from_millis(1500)));
    assert!(outer.lock.sync_on_release);
    assert_eq!(outer.lock.mode, statefile_fs::OpenMode::TruncateCreate);
}

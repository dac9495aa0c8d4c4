// lifecycle.rs — End-to-end workspace lifecycle against the real process.
//
// These tests patch real environment variables, so each one uses its own
// variable name to stay independent of the others running in parallel.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use scratch_tree::search_path::{prepend_entry, SEPARATOR};
use scratch_tree::{
    MemorySearchPath, ProcessSearchPath, ScaffoldConfig, SearchPath, SourceFile, Workspace,
    WorkspaceError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("scratch_tree=debug")
        .with_test_writer()
        .try_init();
}

/// Temp directory entries whose name starts with `prefix`.
fn temp_entries(prefix: &str) -> Vec<PathBuf> {
    fs::read_dir(env::temp_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect()
}

#[test]
fn process_search_path_round_trip() {
    init_tracing();
    let var = "SCRATCH_TREE_IT_ROUND_TRIP";
    env::set_var(var, "/opt/go");
    let dir = tempdir().unwrap();

    let ws = Workspace::create_with(dir.path(), ProcessSearchPath::new(var), true).unwrap();
    assert_eq!(
        env::var(var).unwrap(),
        format!("{}{}/opt/go", dir.path().display(), SEPARATOR)
    );
    assert_eq!(ws.original_search_path(), Some(OsStr::new("/opt/go")));

    // Someone else rewrites the variable; reset still puts ours back.
    env::set_var(var, "/clobbered");
    ws.reset();
    assert_eq!(env::var(var).unwrap(), "/opt/go");
    assert_eq!(ProcessSearchPath::new(var).cached(), "/opt/go");
}

#[cfg(unix)]
#[test]
fn non_utf8_search_path_is_restored_byte_for_byte() {
    use std::os::unix::ffi::OsStringExt;

    init_tracing();
    let var = "SCRATCH_TREE_IT_NON_UTF8";
    let before = OsString::from_vec(b"/opt/g\xffo".to_vec());
    env::set_var(var, &before);
    let dir = tempdir().unwrap();

    let ws = Workspace::create_with(dir.path(), ProcessSearchPath::new(var), true).unwrap();
    assert_eq!(ws.original_search_path(), Some(before.as_os_str()));
    let patched = env::var_os(var).unwrap().into_vec();
    assert!(patched.ends_with(b"/opt/g\xffo"));

    ws.reset();
    assert_eq!(env::var_os(var), Some(before));
}

#[test]
fn process_search_path_mismatch_is_rejected() {
    init_tracing();
    let var = "SCRATCH_TREE_IT_MISMATCH";
    env::set_var(var, "/seed");
    let search_path = ProcessSearchPath::new(var);
    assert_eq!(search_path.cached(), "/seed");

    env::set_var(var, "/drifted");
    let dir = tempdir().unwrap();
    let result = Workspace::create_with(dir.path(), search_path, true);

    match result {
        Err(WorkspaceError::ConfigurationMismatch {
            variable,
            environment,
            cached,
        }) => {
            assert_eq!(variable, var);
            assert_eq!(environment, "/drifted");
            assert_eq!(cached, "/seed");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched search path was patched"),
    }
    assert_eq!(env::var(var).unwrap(), "/drifted");
}

#[test]
fn temporary_workspace_failure_leaks_nothing() {
    init_tracing();
    let prefix = format!("scratch-tree-leak-{}-", std::process::id());
    let search_path = MemorySearchPath::new("GOPATH", Some("/before"));
    let fixtures = tempdir().unwrap();

    let result = Workspace::with_temporary_directory_using(
        &prefix,
        &[
            SourceFile::with_content("ok/ok.go", "package ok"),
            SourceFile::copied_from("bad/bad.go", fixtures.path().join("missing.go")),
            SourceFile::with_content("never/never.go", "package never"),
        ],
        search_path.clone(),
    );

    assert!(matches!(
        result,
        Err(WorkspaceError::SourceOpenFailed { .. })
    ));
    assert!(temp_entries(&prefix).is_empty());
    assert_eq!(search_path.current(), Some(OsString::from("/before")));
    assert_eq!(search_path.cached(), "/before");
}

#[test]
fn temporary_workspace_creation_failure_leaks_nothing() {
    init_tracing();
    let prefix = format!("scratch-tree-mismatch-{}-", std::process::id());
    let search_path = MemorySearchPath::new("GOPATH", Some("/cached"));
    search_path.set_environment(Some("/environment"));

    let result = Workspace::with_temporary_directory_using(&prefix, &[], search_path.clone());

    assert!(matches!(
        result,
        Err(WorkspaceError::ConfigurationMismatch { .. })
    ));
    assert!(temp_entries(&prefix).is_empty());
    assert_eq!(search_path.current(), Some(OsString::from("/environment")));
}

#[test]
fn temporary_workspace_with_real_environment() {
    init_tracing();
    let var = "SCRATCH_TREE_IT_TEMPORARY";
    env::remove_var(var);
    let fixtures = tempdir().unwrap();
    let fixture = fixtures.path().join("lib.go");
    fs::write(&fixture, "package lib\n").unwrap();

    let ws = Workspace::with_temporary_directory_using(
        "scratch-tree-it",
        &[
            SourceFile::with_content("example.com/app/main.go", "package main\n"),
            SourceFile::copied_from("example.com/lib/lib.go", &fixture),
        ],
        ProcessSearchPath::new(var),
    )
    .unwrap();
    let root = ws.root().to_path_buf();

    assert_eq!(
        env::var_os(var),
        Some(prepend_entry(root.as_os_str(), OsStr::new("")))
    );
    assert!(env::var(var).unwrap().ends_with(SEPARATOR));
    assert_eq!(
        ws.list_files().unwrap(),
        vec!["example.com/app/main.go", "example.com/lib/lib.go"]
    );
    assert!(ws.pkg_dir().is_dir());
    assert!(ws.bin_dir().is_dir());

    ws.reset();
    assert!(!root.exists());
    assert_eq!(env::var(var).unwrap(), "");
}

#[test]
fn keep_temporary_directory() {
    init_tracing();
    let mut ws = Workspace::with_temporary_directory_using(
        "scratch-tree-keep",
        &[SourceFile::with_content("k.go", "package k")],
        MemorySearchPath::new("GOPATH", None),
    )
    .unwrap();
    let root = ws.root().to_path_buf();

    ws.set_delete_on_reset(true);
    ws.reset();

    assert!(root.join("src/k.go").exists());
    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn config_file_drives_provisioning() {
    init_tracing();
    let var = "SCRATCH_TREE_IT_CONFIG";
    env::set_var(var, "/from/config/test");
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("testdata")).unwrap();
    fs::write(dir.path().join("testdata/dep.go"), "package dep\n").unwrap();

    let config_path = dir.path().join("scratch-tree.toml");
    fs::write(
        &config_path,
        format!(
            r#"
prefix = "scratch-tree-config"

[search_path]
variable = "{var}"

[[files]]
dest = "example.com/dep/dep.go"
src = "testdata/dep.go"

[[files]]
dest = "example.com/app/app.go"
content = "package app\n"
"#
        ),
    )
    .unwrap();

    let config = ScaffoldConfig::load(&config_path).unwrap();
    let ws = Workspace::from_config(&config).unwrap();
    let root = ws.root().to_path_buf();

    assert!(env::var(var)
        .unwrap()
        .starts_with(&*root.to_string_lossy()));
    assert_eq!(
        ws.read_file("example.com/dep/dep.go").unwrap(),
        b"package dep\n"
    );
    assert_eq!(
        ws.read_file("example.com/app/app.go").unwrap(),
        b"package app\n"
    );

    ws.reset();
    assert!(!root.exists());
    assert_eq!(env::var(var).unwrap(), "/from/config/test");
}

#[test]
fn dropped_workspace_restores_environment() {
    init_tracing();
    let var = "SCRATCH_TREE_IT_DROP";
    env::set_var(var, "/dropped");
    let root;
    {
        let ws = Workspace::with_temporary_directory_using(
            "scratch-tree-drop",
            &[],
            ProcessSearchPath::new(var),
        )
        .unwrap();
        root = ws.root().to_path_buf();
        assert_ne!(env::var(var).unwrap(), "/dropped");
    }
    assert_eq!(env::var(var).unwrap(), "/dropped");
    assert!(!root.exists());
}

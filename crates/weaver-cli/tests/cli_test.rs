//! Drives the `weaver` binary end to end against a temporary database.

use std::path::Path;
use std::process::Output;

use tokio::process::Command;

use weaver_test_utils::{create_test_db, drop_test_db, pg_url};

struct Env {
    db_url: String,
    config_home: tempfile::TempDir,
}

impl Env {
    async fn weaver(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_weaver"))
            .args(args)
            .env("WEAVER_DATABASE_URL", &self.db_url)
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("RUST_LOG", "warn")
            .output()
            .await
            .expect("failed to run weaver")
    }

    async fn ok(&self, args: &[&str]) -> String {
        let out = self.weaver(args).await;
        assert!(
            out.status.success(),
            "weaver {args:?} failed:\n{}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    fn write(&self, name: &str, contents: &str) -> String {
        let path = self.config_home.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path_str(&path)
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn setup() -> (Env, sqlx::PgPool, String) {
    let (pool, db_name) = create_test_db().await;
    let env = Env {
        db_url: format!("{}/{db_name}", pg_url().await),
        config_home: tempfile::TempDir::new().unwrap(),
    };
    (env, pool, db_name)
}

#[tokio::test]
async fn project_sync_tree_cat_and_version() {
    let (env, pool, db_name) = setup().await;

    let out = env.ok(&["project", "create", "site", "--owner", "ana"]).await;
    assert!(out.contains("Created project site"), "{out}");
    let out = env.ok(&["project", "list"]).await;
    assert!(out.contains("site") && out.contains("ana"), "{out}");

    let blueprint = env.write(
        "blueprint.json",
        r#"[{"type":"folder","name":"src","children":[
                {"type":"file","name":"main.rs","content":"fn main() {}\n"}
            ]},
            {"type":"file","name":"README.md","content":"hello"}]"#,
    );
    let out = env.ok(&["sync", &blueprint, "--project", "site"]).await;
    assert!(out.contains("files:    2"), "{out}");

    let tree = env.ok(&["tree", "--project", "site"]).await;
    assert!(tree.contains("src"), "{tree}");
    assert!(tree.contains("main.rs"), "{tree}");
    assert!(tree.contains("README.md"), "{tree}");

    let cat = env.ok(&["cat", "--project", "site", "/src/main.rs"]).await;
    assert_eq!(cat, "fn main() {}\n");

    let version = env.ok(&["version", "--project", "site"]).await;
    assert_eq!(version.trim().len(), 64);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn run_executes_plan_and_prints_report() {
    let (env, pool, db_name) = setup().await;
    env.ok(&["project", "create", "app"]).await;

    let plan = env.write(
        "plan.json",
        r#"{"name":"scaffold","steps":[
            {"id":"a","tool":"create_vfs_directory","inputs":{"path":"/src/"}},
            {"id":"b","tool":"create_vfs_file","inputs":{"path":"/src/index.ts","content":"x"},
             "dependencies":["a"]}
        ]}"#,
    );
    let out = env
        .ok(&["run", &plan, "--project", "app", "--parallel", "1", "--user", "ana"])
        .await;
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["planName"], "scaffold");
    assert_eq!(report["levels"], serde_json::json!([["a"], ["b"]]));
    assert_eq!(report["outputs"]["b"]["path"], "/src/index.ts");

    let cat = env.ok(&["cat", "--project", "app", "/src/index.ts"]).await;
    assert_eq!(cat.trim_end(), "x");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn failures_exit_nonzero_with_context() {
    let (env, pool, db_name) = setup().await;
    env.ok(&["project", "create", "broken"]).await;

    let plan = env.write(
        "cycle.json",
        r#"{"name":"cycle","steps":[
            {"id":"a","tool":"create_vfs_file","inputs":{"path":"/a"},"dependencies":["b"]},
            {"id":"b","tool":"create_vfs_file","inputs":{"path":"/b"},"dependencies":["a"]}
        ]}"#,
    );
    let out = env.weaver(&["run", &plan, "--project", "broken"]).await;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("circular or unsatisfied"), "{stderr}");

    let out = env.weaver(&["cat", "--project", "missing", "/a"]).await;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not found"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn tools_lists_builtins_without_database() {
    let env = Env {
        db_url: "postgresql://127.0.0.1:1/unreachable".to_string(),
        config_home: tempfile::TempDir::new().unwrap(),
    };
    let out = env.ok(&["tools"]).await;
    assert!(out.contains("create_vfs_file"), "{out}");
    assert!(out.contains("sync_architecture"), "{out}");

    let verbose = env.ok(&["tools", "--verbose"]).await;
    let descriptors: serde_json::Value = serde_json::from_str(&verbose).unwrap();
    assert_eq!(descriptors.as_array().map(Vec::len), Some(10));
}

#[tokio::test]
async fn init_writes_config_once() {
    let env = Env {
        db_url: String::new(),
        config_home: tempfile::TempDir::new().unwrap(),
    };
    env.ok(&["init", "--db-url", "postgresql://cfg:5432/weaver", "--max-parallel-steps", "2"])
        .await;
    let written =
        std::fs::read_to_string(env.config_home.path().join("weaver").join("config.toml")).unwrap();
    assert!(written.contains("postgresql://cfg:5432/weaver"));
    assert!(written.contains("max_parallel_steps = 2"));

    let again = env.weaver(&["init"]).await;
    assert!(!again.status.success(), "second init without --force fails");
}

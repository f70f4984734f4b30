//! Integration tests for the `projects` and `vfs_nodes` query functions.

use serde_json::json;

use weaver_db::models::{NewNode, NodeType};
use weaver_db::queries::nodes::{self, ProjectLock};
use weaver_db::queries::projects;
use weaver_test_utils::{create_test_db, create_test_project, drop_test_db};

fn new_node<'a>(project_id: uuid::Uuid, parent_id: uuid::Uuid, name: &'a str, node_type: NodeType) -> NewNode<'a> {
    NewNode {
        project_id,
        parent_id,
        node_type,
        name,
        content: None,
        content_hash: None,
        metadata: json!({}),
    }
}

#[tokio::test]
async fn project_crud() {
    let (pool, db_name) = create_test_db().await;

    let project = projects::insert_project(&pool, "site", Some("ana"))
        .await
        .expect("insert_project");
    assert_eq!(project.name, "site");
    assert_eq!(project.owner.as_deref(), Some("ana"));

    let by_id = projects::get_project(&pool, project.id).await.unwrap();
    assert_eq!(by_id.as_ref().map(|p| p.id), Some(project.id));
    let by_name = projects::get_project_by_name(&pool, "site").await.unwrap();
    assert_eq!(by_name.map(|p| p.id), Some(project.id));

    let dup = projects::insert_project(&pool, "site", None).await;
    assert!(dup.is_err(), "project names are unique");

    let all = projects::list_projects(&pool).await.unwrap();
    assert_eq!(all.len(), 1);

    projects::delete_project(&pool, project.id).await.unwrap();
    assert!(projects::get_project(&pool, project.id).await.unwrap().is_none());
    assert!(projects::delete_project(&pool, project.id).await.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn insert_root_is_idempotent() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;

    let root = nodes::insert_root(&pool, project.id)
        .await
        .unwrap()
        .expect("first insert creates the root");
    assert!(root.is_root());
    assert!(root.is_directory());
    assert_eq!(root.name, "");

    let again = nodes::insert_root(&pool, project.id).await.unwrap();
    assert!(again.is_none(), "second insert is a no-op");

    let fetched = nodes::get_root(&pool, project.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, root.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn insert_if_absent_returns_none_on_conflict() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;
    let root = nodes::insert_root(&pool, project.id).await.unwrap().unwrap();

    let src = new_node(project.id, root.id, "src", NodeType::Directory);
    let first = nodes::insert_node_if_absent(&pool, &src).await.unwrap();
    assert!(first.is_some());
    let second = nodes::insert_node_if_absent(&pool, &src).await.unwrap();
    assert!(second.is_none());

    let strict = nodes::insert_node(&pool, &src).await.expect_err("duplicate");
    let code = strict
        .as_database_error()
        .and_then(|e| e.code())
        .map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("23505"));

    assert_eq!(nodes::count_nodes(&pool, project.id).await.unwrap(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_cascades_to_descendants() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;
    let root = nodes::insert_root(&pool, project.id).await.unwrap().unwrap();

    let src = nodes::insert_node(&pool, &new_node(project.id, root.id, "src", NodeType::Directory))
        .await
        .unwrap();
    let lib = nodes::insert_node(&pool, &new_node(project.id, src.id, "lib", NodeType::Directory))
        .await
        .unwrap();
    let file = nodes::insert_node(&pool, &new_node(project.id, lib.id, "a.rs", NodeType::File))
        .await
        .unwrap();

    assert_eq!(nodes::delete_node(&pool, src.id).await.unwrap(), 1);
    assert!(nodes::get_node(&pool, lib.id).await.unwrap().is_none());
    assert!(nodes::get_node(&pool, file.id).await.unwrap().is_none());
    assert_eq!(nodes::count_nodes(&pool, project.id).await.unwrap(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_non_root_keeps_root() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;
    let root = nodes::insert_root(&pool, project.id).await.unwrap().unwrap();

    let docs = nodes::insert_node(&pool, &new_node(project.id, root.id, "docs", NodeType::Directory))
        .await
        .unwrap();
    nodes::insert_node(&pool, &new_node(project.id, docs.id, "README.md", NodeType::File))
        .await
        .unwrap();

    let deleted = nodes::delete_non_root_nodes(&pool, project.id).await.unwrap();
    assert_eq!(deleted, 2);
    let remaining = nodes::list_project_nodes(&pool, project.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, root.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_rename_reparent_and_metadata() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;
    let root = nodes::insert_root(&pool, project.id).await.unwrap().unwrap();

    let dir = nodes::insert_node(&pool, &new_node(project.id, root.id, "dir", NodeType::Directory))
        .await
        .unwrap();
    let file = nodes::insert_node(&pool, &new_node(project.id, root.id, "f.txt", NodeType::File))
        .await
        .unwrap();

    let updated = nodes::update_content(&pool, file.id, Some("hello"), Some("abc"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.content.as_deref(), Some("hello"));
    assert_eq!(updated.content_hash.as_deref(), Some("abc"));

    let renamed = nodes::rename_node(&pool, file.id, "g.txt").await.unwrap().unwrap();
    assert_eq!(renamed.name, "g.txt");

    let moved = nodes::reparent_node(&pool, file.id, dir.id).await.unwrap().unwrap();
    assert_eq!(moved.parent_id, Some(dir.id));

    let tagged = nodes::merge_metadata(&pool, file.id, &json!({"lang": "text"}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tagged.metadata, json!({"lang": "text"}));

    let children = nodes::list_children(&pool, dir.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "g.txt");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn lock_project_reports_missing_project() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;

    let mut tx = pool.begin().await.unwrap();
    assert!(nodes::lock_project(&mut *tx, project.id, ProjectLock::Exclusive).await.unwrap());
    assert!(!nodes::lock_project(&mut *tx, uuid::Uuid::new_v4(), ProjectLock::Shared).await.unwrap());
    tx.rollback().await.unwrap();

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn ancestry_walk_terminates_on_a_parent_cycle() {
    let (pool, db_name) = create_test_db().await;
    let project = create_test_project(&pool).await;
    let root = nodes::insert_root(&pool, project.id).await.unwrap().unwrap();

    let a = nodes::insert_node(&pool, &new_node(project.id, root.id, "a", NodeType::Directory))
        .await
        .unwrap();
    let b = nodes::insert_node(&pool, &new_node(project.id, a.id, "b", NodeType::Directory))
        .await
        .unwrap();
    assert!(nodes::is_ancestor(&pool, root.id, b.id).await.unwrap());
    assert!(nodes::is_ancestor(&pool, b.id, b.id).await.unwrap());
    assert!(!nodes::is_ancestor(&pool, b.id, a.id).await.unwrap());

    // Corrupt the tree directly: a and b now point at each other.
    nodes::reparent_node(&pool, a.id, b.id).await.unwrap();
    let detached = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        nodes::is_ancestor(&pool, root.id, a.id),
    )
    .await
    .expect("ancestry query must terminate")
    .unwrap();
    assert!(!detached);

    assert_eq!(projects::count_projects(&pool).await.unwrap(), 1);
    assert_eq!(nodes::count_all_nodes(&pool).await.unwrap(), 3);

    pool.close().await;
    drop_test_db(&db_name).await;
}

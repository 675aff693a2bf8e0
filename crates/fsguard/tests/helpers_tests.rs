//! Integration tests for the filesystem helpers

use camino::{Utf8Path, Utf8PathBuf};
use fsguard::helpers;
use fsguard::{Engine, Error};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

fn create_test_root() -> (Utf8PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let root =
        Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
    (root, temp_dir)
}

fn small_engine() -> Engine {
    Engine::builder().with_capacity(2).build()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Manifest {
    name: String,
    files: Vec<String>,
}

#[tokio::test]
async fn test_json_round_trip_is_pretty() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let path = root.join("manifest.json");
    let manifest = Manifest {
        name: "assets".to_string(),
        files: vec!["a.png".to_string(), "b.png".to_string()],
    };

    helpers::write_json(&engine, &path, &manifest).await.unwrap();

    let raw = helpers::read(&engine, &path).await.unwrap();
    assert!(raw.contains("\n  \"name\": \"assets\""));

    let loaded: Manifest = helpers::read_json(&engine, &path).await.unwrap();
    assert_eq!(loaded, manifest);
}

#[tokio::test]
async fn test_read_json_rejects_garbage() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let path = root.join("broken.json");
    helpers::write(&engine, &path, "{ not json").await.unwrap();

    let err = helpers::read_json::<Manifest>(&engine, &path)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Json { .. }));
}

async fn build_tree(engine: &Engine, root: &Utf8Path) {
    helpers::make_dir(engine, &root.join("a/b/c")).await.unwrap();
    helpers::make_dir(engine, &root.join("a/empty")).await.unwrap();
    helpers::write(engine, &root.join("top.txt"), "top").await.unwrap();
    helpers::write(engine, &root.join("a/one.txt"), "one").await.unwrap();
    helpers::write(engine, &root.join("a/b/c/deep.txt"), "deep")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_copy_directory_tree() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let src = root.join("src");
    let dest = root.join("dest");
    build_tree(&engine, &src).await;

    let files = helpers::copy(&engine, &src, &dest).await.unwrap();

    assert_eq!(files, 3);
    assert_eq!(
        helpers::read(&engine, &dest.join("a/b/c/deep.txt"))
            .await
            .unwrap(),
        "deep"
    );
    assert_eq!(helpers::read(&engine, &dest.join("top.txt")).await.unwrap(), "top");
    assert!(helpers::exists(&engine, &dest.join("a/empty")).await);
    // Source is untouched
    assert!(helpers::exists(&engine, &src.join("a/one.txt")).await);
}

#[tokio::test]
async fn test_copy_single_file() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let src = root.join("file.txt");
    helpers::write(&engine, &src, "payload").await.unwrap();

    let files = helpers::copy(&engine, &src, &root.join("file-copy.txt"))
        .await
        .unwrap();

    assert_eq!(files, 1);
    assert_eq!(
        helpers::read(&engine, &root.join("file-copy.txt"))
            .await
            .unwrap(),
        "payload"
    );
}

#[tokio::test]
async fn test_copy_missing_source_fails() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();

    let err = helpers::copy(&engine, &root.join("absent"), &root.join("out"))
        .await
        .unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
}

#[tokio::test]
async fn test_copy_into_own_subtree_is_rejected() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let src = root.join("src");
    build_tree(&engine, &src).await;

    let err = helpers::copy(&engine, &src, &src.join("a/backup"))
        .await
        .unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::InvalidInput));
    assert!(!helpers::exists(&engine, &src.join("a/backup")).await);

    let err = helpers::copy(&engine, &src, &src).await.unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::InvalidInput));

    // A sibling whose name merely shares the prefix is fine
    let files = helpers::copy(&engine, &src, &root.join("src-backup"))
        .await
        .unwrap();
    assert_eq!(files, 3);
}

#[tokio::test]
async fn test_copy_file_onto_itself_keeps_contents() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let path = root.join("notes.txt");
    helpers::write(&engine, &path, "keep").await.unwrap();

    let err = helpers::copy(&engine, &path, &root.join("./notes.txt"))
        .await
        .unwrap_err();

    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::InvalidInput));
    assert_eq!(helpers::read(&engine, &path).await.unwrap(), "keep");
}

#[cfg(unix)]
#[tokio::test]
async fn test_copy_recreates_symlinks() {
    use std::os::unix::fs::symlink;

    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let src = root.join("site");
    helpers::make_dir(&engine, &src).await.unwrap();
    helpers::write(&engine, &src.join("real.txt"), "real").await.unwrap();
    symlink("real.txt", src.join("link.txt")).unwrap();
    symlink("gone.txt", src.join("dangling.txt")).unwrap();
    // A link back to an ancestor would loop forever if followed
    symlink("..", src.join("up")).unwrap();

    let dest = root.join("mirror");
    let copied = helpers::copy(&engine, &src, &dest).await.unwrap();
    assert_eq!(copied, 4);

    for (name, target) in [("link.txt", "real.txt"), ("dangling.txt", "gone.txt"), ("up", "..")] {
        let link = dest.join(name);
        assert!(std::fs::symlink_metadata(&link).unwrap().is_symlink(), "{name}");
        assert_eq!(std::fs::read_link(&link).unwrap(), std::path::PathBuf::from(target));
    }
    assert_eq!(helpers::read(&engine, &dest.join("link.txt")).await.unwrap(), "real");
}

#[tokio::test]
async fn test_remove_tree_and_file() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let tree = root.join("tree");
    build_tree(&engine, &tree).await;

    helpers::remove(&engine, &tree.join("top.txt")).await.unwrap();
    assert!(!helpers::exists(&engine, &tree.join("top.txt")).await);

    helpers::remove(&engine, &tree).await.unwrap();
    assert!(!helpers::exists(&engine, &tree).await);

    // Second removal is a no-op
    helpers::remove(&engine, &tree).await.unwrap();
}

#[tokio::test]
async fn test_move_creates_destination_parent() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();
    let src = root.join("report.txt");
    let dest = root.join("archive/2024/report.txt");
    helpers::write(&engine, &src, "q4").await.unwrap();

    helpers::move_path(&engine, &src, &dest).await.unwrap();

    assert!(!helpers::exists(&engine, &src).await);
    assert_eq!(helpers::read(&engine, &dest).await.unwrap(), "q4");
}

#[tokio::test]
async fn test_concurrent_helpers_share_capacity() {
    let (root, _temp) = create_test_root();
    let engine = small_engine();

    let writes = (0..20).map(|i| {
        let engine = engine.clone();
        let path = root.join(format!("batch/{i}.txt"));
        async move {
            helpers::ensure_file(&engine, &path).await?;
            helpers::write(&engine, &path, i.to_string()).await
        }
    });
    for result in join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(engine.active_count(), 0);
    assert_eq!(
        helpers::read(&engine, &root.join("batch/7.txt"))
            .await
            .unwrap(),
        "7"
    );
}

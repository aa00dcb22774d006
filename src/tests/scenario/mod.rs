use std::sync::Arc;

use crate::{
    backend::local::LocalDrive,
    batch::{BatchController, BatchOutcome, FileBoard},
    cache::memory,
    drive::Drive,
    store::RemoteStore,
    walk::{Exclude, MemoryNode, UploadEntry, Walked, walk_drop},
    warning::collect_warnings,
};

use super::{RecordingObserver, RecordingStore, controller, settings};

fn docs() -> Vec<MemoryNode> {
    vec![MemoryNode::dir(
        "docs",
        vec![
            MemoryNode::file("a.txt", vec![b'a'; 10]),
            MemoryNode::dir("sub", vec![MemoryNode::file("b.txt", vec![b'b'; 90])]),
        ],
    )]
}

async fn walk(nodes: Vec<MemoryNode>) -> Vec<UploadEntry> {
    let items = nodes.into_iter().map(|node| node.into_dropped(1)).collect();
    match walk_drop(items, &Exclude::default()).await {
        Walked::Tree(entries) => entries,
        Walked::Flat(_) => panic!("expected a folder batch"),
    }
}

#[tokio::test]
async fn test_dropped_directory_with_recording_store() {
    let entries = walk(docs()).await;
    assert_eq!(
        entries
            .iter()
            .map(|entry| entry.relative_path.as_str())
            .collect::<Vec<_>>(),
        vec!["docs/a.txt", "docs/sub/b.txt"]
    );

    let (controller, observer) = controller(RecordingStore::new(), settings(1, 0));
    controller.upload_tree(None, entries).await.unwrap();

    let folders = controller.store().created_folders();
    assert_eq!(
        folders
            .iter()
            .map(|(name, _, _)| name.as_str())
            .collect::<Vec<_>>(),
        vec!["docs", "sub"]
    );
    assert_eq!(folders[1].1.as_ref(), Some(&folders[0].2));

    let id = observer.started()[0].id.clone();
    assert_eq!(observer.progress_of(&id).last(), Some(&100));
}

#[tokio::test]
async fn test_dropped_directory_into_local_drive() {
    let store = LocalDrive::open("sqlite::memory:").await.unwrap();
    let drive = Drive::new(store, memory::Client::new(), crate::drive::DEFAULT_TTL);
    let observer = Arc::new(RecordingObserver::default());
    let controller = BatchController::new(
        drive,
        Arc::new(FileBoard::new()),
        observer.clone(),
        settings(4, 0),
    );

    let (walked, skipped) = collect_warnings(async {
        let mut nodes = docs();
        nodes.push(MemoryNode::Unreadable("secret.txt".into()));
        let items = nodes.into_iter().map(|node| node.into_dropped(1)).collect();
        walk_drop(items, &Exclude::default()).await
    })
    .await;
    assert_eq!(skipped.len(), 1);
    assert_eq!(walked.len(), 2);

    let Ok(BatchOutcome::Tree(summary)) = controller.upload_walked(None, walked).await else {
        panic!("expected a folder batch to succeed");
    };
    assert_eq!(
        summary.folders.keys().collect::<Vec<_>>(),
        vec!["docs", "docs/sub"]
    );

    let drive = controller.store();
    let root = drive.list_files(None, None).await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].name, "docs");
    let sub = &summary.folders["docs/sub"];
    let files = drive.list_files(Some(sub), None).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].size, 90);
    assert_eq!(
        drive.store().content(&files[0].id).await.unwrap().unwrap().len(),
        90
    );

    let view = controller.board().view(None);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id(), root[0].id);
    let id = observer.started()[0].id.clone();
    assert_eq!(observer.progress_of(&id).last(), Some(&100));
}

use std::{collections::HashSet, time::Duration};

use maplit::hashset;

use crate::{
    batch::{BatchError, PlaceholderState},
    notice::Notice,
    store::FOLDER_MIME,
};

use super::{Event, RecordingStore, controller, entry, settings};

#[tokio::test]
async fn test_folders_created_once_per_path() {
    let (controller, _) = controller(RecordingStore::new(), settings(8, 0));
    let summary = controller
        .upload_tree(
            Some("dest"),
            vec![
                entry("A/B/x.txt", 1),
                entry("A/B/y.txt", 1),
                entry("A/C/z.txt", 1),
            ],
        )
        .await
        .unwrap();

    let folders = controller.store().created_folders();
    assert_eq!(folders.len(), 3);
    let (name, parent, a) = &folders[0];
    assert_eq!((name.as_str(), parent.as_deref()), ("A", Some("dest")));
    let children = folders[1..]
        .iter()
        .map(|(name, parent, _)| {
            assert_eq!(parent.as_ref(), Some(a));
            name.as_str()
        })
        .collect::<HashSet<_>>();
    assert_eq!(children, hashset! {"B", "C"});
    assert_eq!(
        summary.folders.keys().collect::<Vec<_>>(),
        vec!["A", "A/B", "A/C"]
    );
    assert_eq!(summary.uploaded.len(), 3);
}

#[tokio::test]
async fn test_upload_waits_for_parent_folder() {
    let (controller, _) = controller(RecordingStore::new(), settings(4, 0));
    controller
        .upload_tree(
            None,
            vec![
                entry("A/B/x.txt", 3),
                entry("A/B/y.txt", 3),
                entry("A/z.txt", 3),
                entry("A/C/D/w.txt", 3),
            ],
        )
        .await
        .unwrap();

    let mut created = Vec::new();
    for call in controller.store().calls() {
        match call {
            super::Call::CreateFolder { id, parent, .. } => {
                if let Some(parent) = parent {
                    assert!(created.contains(&parent), "folder created before its parent");
                }
                created.push(id);
            }
            super::Call::Upload { parent, name } => {
                let parent = parent.unwrap();
                assert!(created.contains(&parent), "{name} uploaded before its folder");
            }
            _ => {}
        }
    }
    assert_eq!(controller.store().uploads().len(), 4);
}

#[tokio::test]
async fn test_sequential_with_concurrency_one() {
    let (controller, _) = controller(RecordingStore::new(), settings(1, 0));
    controller
        .upload_tree(None, vec![entry("A/x.txt", 1), entry("A/y.txt", 1)])
        .await
        .unwrap();
    assert_eq!(controller.store().max_in_flight(), 1);
}

#[tokio::test]
async fn test_single_placeholder_with_monotonic_progress() {
    let (controller, observer) = controller(RecordingStore::new(), settings(3, 0));
    controller
        .upload_tree(
            Some("F"),
            vec![
                entry("docs/a.txt", 10),
                entry("docs/sub/b.txt", 90),
                entry("docs/sub/c.txt", 0),
            ],
        )
        .await
        .unwrap();

    let started = observer.started();
    assert_eq!(started.len(), 1);
    let placeholder = &started[0];
    assert!(placeholder.id.starts_with("temp-"));
    assert_eq!(placeholder.name, "docs");
    assert_eq!(placeholder.mime_type, FOLDER_MIME);
    assert_eq!(placeholder.size, 100);
    assert!(placeholder.is_uploading);
    assert_eq!(placeholder.upload_progress, 0);

    let progress = observer.progress_of(&placeholder.id);
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last(), Some(&100));
    for event in observer.events() {
        if let Event::Progress(id, _) = event {
            assert_eq!(id, placeholder.id);
        }
    }
    assert!(
        observer
            .events()
            .contains(&Event::Complete(placeholder.id.clone()))
    );
}

#[tokio::test]
async fn test_board_swaps_placeholder_for_listing() {
    let (controller, _) = controller(RecordingStore::new(), settings(2, 0));
    let mut rx = controller.board().subscribe();
    controller
        .upload_tree(None, vec![entry("docs/a.txt", 4)])
        .await
        .unwrap();

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.placeholders().count(), 0);
    let view = state.view(None);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].name(), "docs");
    assert!(view[0].is_folder());
    assert!(!view[0].id().starts_with("temp-"));
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_settles_before_removal() {
    let (controller, observer) = controller(RecordingStore::new(), settings(2, 2500));
    let board = controller.board().clone();
    let upload = controller.upload_tree(Some("F"), vec![entry("docs/a.txt", 4)]);
    let check = async {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let state = board.snapshot();
        let placeholders = state.placeholders().collect::<Vec<_>>();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].state(), PlaceholderState::Settling);
        assert_eq!(placeholders[0].item().upload_progress, 100);
        assert_eq!(board.view(Some("F")).len(), 1);
        assert!(board.view(None).is_empty());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(board.snapshot().placeholders().count(), 0);
    };
    let (result, ()) = tokio::join!(upload, check);
    result.unwrap();
    assert!(matches!(observer.events().last(), Some(Event::Notify(_))));
}

#[tokio::test]
async fn test_folder_failure_aborts_batch() {
    let store = RecordingStore::new().failing_folder("B");
    let (controller, observer) = controller(store, settings(1, 0));
    let result = controller
        .upload_tree(None, vec![entry("A/B/x.txt", 1), entry("A/y.txt", 1)])
        .await;

    assert!(matches!(
        result,
        Err(BatchError::CreateFolder { ref path, .. }) if path == "A/B"
    ));
    assert!(controller.store().uploads().is_empty());
    assert_eq!(controller.board().snapshot().placeholders().count(), 0);

    let id = observer.started()[0].id.clone();
    assert!(
        observer
            .events()
            .contains(&Event::Error(id.clone(), Notice::create_folder_failed("A/B")))
    );
    assert!(!observer.events().contains(&Event::Complete(id)));
}

#[tokio::test]
async fn test_upload_failure_aborts_remaining_uploads() {
    let store = RecordingStore::new().failing_upload("x.txt");
    let (controller, observer) = controller(store, settings(1, 0));
    let result = controller
        .upload_tree(
            None,
            vec![entry("A/x.txt", 1), entry("A/y.txt", 1), entry("A/z.txt", 1)],
        )
        .await;

    assert!(matches!(
        result,
        Err(BatchError::Upload { ref path, .. }) if path == "A/x.txt"
    ));
    assert_eq!(controller.store().uploads().len(), 1);
    // Folders created before the failure stay in place.
    assert_eq!(controller.store().created_folders().len(), 1);
    assert!(
        observer
            .events()
            .contains(&Event::EntryFailed("A/x.txt".into()))
    );
    let id = observer.started()[0].id.clone();
    assert!(
        observer
            .events()
            .contains(&Event::Error(id, Notice::folder_upload_failed("A")))
    );
}

#[tokio::test]
async fn test_empty_tree_is_noop() {
    let (controller, observer) = controller(RecordingStore::new(), settings(1, 0));
    let summary = controller.upload_tree(None, Vec::new()).await.unwrap();
    assert!(summary.uploaded.is_empty());
    assert!(observer.events().is_empty());
    assert!(controller.store().calls().is_empty());
}

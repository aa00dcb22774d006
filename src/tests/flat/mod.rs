use crate::{notice::Notice, walk::FileLike};

use super::{Event, RecordingStore, controller, settings};

fn files(names: &[&str]) -> Vec<FileLike> {
    names
        .iter()
        .map(|name| FileLike::from_bytes(*name, name.as_bytes().to_vec()))
        .collect()
}

#[tokio::test]
async fn test_partial_failure_continues() {
    let store = RecordingStore::new().failing_upload("b.txt");
    let (controller, observer) = controller(store, settings(1, 0));
    let summary = controller
        .upload_flat(Some("F"), files(&["a.txt", "b.txt", "c.txt"]))
        .await;

    assert_eq!(
        summary
            .uploaded
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>(),
        vec!["a.txt", "c.txt"]
    );
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].name, "b.txt");

    let started = observer.started();
    assert_eq!(started.len(), 3);
    let events = observer.events();
    assert!(events.contains(&Event::Error(
        started[1].id.clone(),
        Notice::upload_failed("b.txt")
    )));
    assert!(events.contains(&Event::Complete(started[0].id.clone())));
    assert!(events.contains(&Event::Complete(started[2].id.clone())));
    assert_eq!(events.last(), Some(&Event::Notify(Notice::flat_summary(1, 3))));

    let view = controller.board().view(Some("F"));
    assert_eq!(view.len(), 2);
    assert!(view.iter().all(|entry| !entry.id().starts_with("temp-")));
}

#[tokio::test]
async fn test_uploads_issued_concurrently() {
    let (controller, _) = controller(RecordingStore::new(), settings(1, 0));
    let summary = controller
        .upload_flat(None, files(&["a.txt", "b.txt", "c.txt", "d.txt"]))
        .await;
    assert!(summary.failed.is_empty());
    // The concurrency limit only applies to folder batches.
    assert_eq!(controller.store().max_in_flight(), 4);
}

#[tokio::test]
async fn test_placeholder_per_file() {
    let (controller, observer) = controller(RecordingStore::new(), settings(1, 0));
    controller.upload_flat(None, files(&["a.txt", "bb.txt"])).await;

    let started = observer.started();
    assert_eq!(
        started
            .iter()
            .map(|item| (item.name.as_str(), item.size))
            .collect::<Vec<_>>(),
        vec![("a.txt", 5), ("bb.txt", 6)]
    );
    assert_ne!(started[0].id, started[1].id);
    for item in &started {
        let progress = observer.progress_of(&item.id);
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(progress.last(), Some(&100));
    }
    assert_eq!(
        observer.events().last(),
        Some(&Event::Notify(Notice::uploaded(2)))
    );
}

#[tokio::test]
async fn test_all_failed_skips_refresh() {
    let store = RecordingStore::new().failing_upload("a.txt");
    let (controller, _) = controller(store, settings(1, 0));
    let summary = controller.upload_flat(None, files(&["a.txt"])).await;
    assert_eq!(summary.failed.len(), 1);
    assert!(
        !controller
            .store()
            .calls()
            .iter()
            .any(|call| matches!(call, super::Call::List { .. }))
    );
    assert_eq!(controller.board().snapshot().placeholders().count(), 0);
}

#[tokio::test]
async fn test_completion_reaches_observer() {
    let (controller, observer) = controller(RecordingStore::new().silent(), settings(1, 0));
    let summary = controller
        .upload_flat(
            None,
            vec![
                FileLike::from_bytes("empty.txt", Vec::<u8>::new()),
                FileLike::from_bytes("a.txt", "abc"),
            ],
        )
        .await;
    assert!(summary.failed.is_empty());

    let events = observer.events();
    for item in observer.started() {
        assert_eq!(observer.progress_of(&item.id), vec![100]);
        let shown = events
            .iter()
            .position(|event| *event == Event::Progress(item.id.clone(), 100));
        let complete = events
            .iter()
            .position(|event| *event == Event::Complete(item.id.clone()));
        assert!(shown < complete, "{} completed before showing 100", item.name);
    }
}

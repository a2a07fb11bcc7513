use super::Library;
use repokeeper::publish::BroadcastPublisher;
use repokeeper::store::SnapshotStore;
use repokeeper::types::{FsChange, Modification};
use std::fs;
use std::sync::Arc;

#[test]
fn removed_audio_is_reported_deleted_after_restart() {
    let library = Library::new();
    let album = library.album("lib/AlbumX", &["track.flac"]);
    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));

    let (first, changes) = keeper.reconcile_blocking(None).unwrap();
    assert!(changes.is_empty(), "no snapshot yet, nothing to compare");
    assert!(first.contains(&library.root));
    assert!(first.contains(&library.path("lib")));
    assert!(first.is_album_entry(&album));
    keeper.store().save(&first).unwrap();

    fs::remove_file(album.join("track.flac")).unwrap();

    let (second, changes) = keeper.reconcile_blocking(None).unwrap();
    assert_eq!(changes.get(&album), Some(&Modification::deleted()));
    assert!(!second.contains(&album));
}

#[cfg(unix)]
#[test]
fn directory_renamed_while_offline_is_a_rename() {
    let library = Library::new();
    library.album("Artist/Old Title", &["01.flac"]);
    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));
    let (tree, _) = keeper.reconcile_blocking(None).unwrap();
    keeper.store().save(&tree).unwrap();

    fs::rename(library.path("Artist/Old Title"), library.path("Artist/New Title")).unwrap();

    let (_, changes) = keeper.reconcile_blocking(None).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes.get(&library.path("Artist/Old Title")),
        Some(&Modification::renamed(library.path("Artist/New Title")))
    );
}

#[test]
fn new_album_is_reported_created() {
    let library = Library::new();
    library.album("A", &["01.mp3"]);
    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));
    let (tree, _) = keeper.reconcile_blocking(None).unwrap();
    keeper.store().save(&tree).unwrap();

    library.album("B", &["01.wv"]);

    let (_, changes) = keeper.reconcile_blocking(None).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[&library.path("B")].change, FsChange::Created);
}

#[test]
fn corrupt_snapshot_degrades_to_no_snapshot() {
    let library = Library::new();
    library.album("A", &["01.mp3"]);
    fs::create_dir_all(library.snapshot.parent().unwrap()).unwrap();
    fs::write(&library.snapshot, b"{\"cache\": [").unwrap();

    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));
    assert!(keeper.previous_tree().is_none());
    let (tree, changes) = keeper.reconcile_blocking(None).unwrap();
    assert!(changes.is_empty());
    assert_eq!(tree.album_entries(), vec![library.path("A")]);
}

#[test]
fn snapshot_of_another_library_is_ignored() {
    let library = Library::new();
    library.album("A", &["01.mp3"]);
    let other = Library::new();
    other.album("Z", &["01.mp3"]);

    let mut config = other.config();
    config.snapshot_file = Some(library.snapshot.clone());
    let other_keeper =
        repokeeper::service::RepoKeeper::new(config, Arc::new(BroadcastPublisher::default()))
            .unwrap();
    let (other_tree, _) = other_keeper.reconcile_blocking(None).unwrap();
    other_keeper.store().save(&other_tree).unwrap();

    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));
    assert!(keeper.previous_tree().is_none());
}

#[tokio::test]
async fn undelivered_changes_carry_forward_to_next_session() {
    let library = Library::new();
    library.album("A", &["01.mp3"]);
    let keeper = library.keeper(Arc::new(BroadcastPublisher::default()));
    let (tree, _) = keeper.reconcile_blocking(None).unwrap();
    keeper.store().save(&tree).unwrap();

    library.album("B", &["01.mp3"]);

    // Nobody listens: the creation of B cannot be delivered.
    let silent = library.keeper(Arc::new(BroadcastPublisher::default()));
    let (registry, _tx, rx) = repokeeper::watch::MemoryRegistry::channel();
    let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (handle, owner) = silent
        .start_with(cancel, Box::new(registry), rx)
        .await
        .unwrap();
    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();

    let saved = keeper.store().load().unwrap().unwrap();
    assert_eq!(
        saved.cache[&library.path("B")].pending,
        Some(Modification::created())
    );

    // Next session: B was not changed again, it is still reported.
    let publisher = Arc::new(BroadcastPublisher::default());
    let mut notices = publisher.subscribe();
    let (registry, _tx, rx) = repokeeper::watch::MemoryRegistry::channel();
    let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (handle, owner) = library
        .keeper(publisher)
        .start_with(cancel, Box::new(registry), rx)
        .await
        .unwrap();

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.kind, FsChange::Created);
    assert_eq!(notice.path, library.path("B"));

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
    let saved = keeper.store().load().unwrap().unwrap();
    assert!(saved.cache.values().all(|n| n.pending.is_none()));
}

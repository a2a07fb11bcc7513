use super::Library;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use repokeeper::publish::BroadcastPublisher;
use repokeeper::service::CacheHandle;
use repokeeper::store::SnapshotStore;
use repokeeper::types::{ChangeNotice, FsChange};
use repokeeper::watch::{EventSender, MemoryRegistry};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct Running {
    handle: CacheHandle,
    owner: JoinHandle<Result<(), repokeeper::error::ApiError>>,
    events: EventSender,
    notices: broadcast::Receiver<ChangeNotice>,
    registry: MemoryRegistry,
}

impl Running {
    async fn start(library: &Library) -> Self {
        let publisher = Arc::new(BroadcastPublisher::default());
        let notices = publisher.subscribe();
        let (registry, events, rx) = MemoryRegistry::channel();
        let (handle, owner) = library
            .keeper(publisher)
            .start_with(
                Arc::new(AtomicBool::new(false)),
                Box::new(registry.clone()),
                rx,
            )
            .await
            .unwrap();
        Self {
            handle,
            owner,
            events,
            notices,
            registry,
        }
    }

    fn send(&self, kind: EventKind, path: PathBuf) {
        self.events
            .send(Ok(Event::new(kind).add_path(path)))
            .unwrap();
    }

    async fn next_notice(&mut self) -> ChangeNotice {
        tokio::time::timeout(Duration::from_secs(5), self.notices.recv())
            .await
            .expect("notice within timeout")
            .unwrap()
    }

    async fn stop(self) {
        self.handle.shutdown().await.unwrap();
        self.owner.await.unwrap().unwrap();
    }
}

#[cfg(unix)]
#[tokio::test]
async fn remove_then_create_of_same_directory_is_a_rename() {
    let library = Library::new();
    library.album("lib/AlbumX", &["track.flac"]);
    let mut running = Running::start(&library).await;

    fs::rename(library.path("lib/AlbumX"), library.path("lib/AlbumY")).unwrap();
    running.send(
        EventKind::Modify(ModifyKind::Name(RenameMode::From)),
        library.path("lib/AlbumX"),
    );
    running.send(
        EventKind::Modify(ModifyKind::Name(RenameMode::To)),
        library.path("lib/AlbumY"),
    );

    assert_eq!(
        running.next_notice().await,
        ChangeNotice::deleted(library.path("lib/AlbumX"))
    );
    assert_eq!(
        running.next_notice().await,
        ChangeNotice::renamed(library.path("lib/AlbumX"), library.path("lib/AlbumY"))
    );

    running.handle.flush().await.unwrap();
    let saved = library.keeper(Arc::new(BroadcastPublisher::default()));
    let snapshot = saved.store().load().unwrap().unwrap();
    assert!(snapshot.cache.contains_key(&library.path("lib/AlbumY")));
    assert!(!snapshot.cache.contains_key(&library.path("lib/AlbumX")));
    assert!(snapshot.cache[&library.path("lib/AlbumY")].is_album_entry);
    assert!(snapshot.cache[&library.path("lib/AlbumY")].pending.is_none());

    running.stop().await;
}

#[tokio::test]
async fn directory_moved_in_from_outside_is_created() {
    let library = Library::new();
    library.album("Existing", &["01.flac"]);
    let mut running = Running::start(&library).await;

    let outside = tempfile::tempdir().unwrap();
    let staged = outside.path().join("Artist");
    fs::create_dir_all(staged.join("Album")).unwrap();
    fs::write(staged.join("Album/01.mp3"), b"audio").unwrap();
    fs::rename(&staged, library.path("Artist")).unwrap_or_else(|_| {
        // different filesystem: copy instead
        fs::create_dir_all(library.path("Artist/Album")).unwrap();
        fs::write(library.path("Artist/Album/01.mp3"), b"audio").unwrap();
    });

    running.send(EventKind::Create(CreateKind::Folder), library.path("Artist"));

    let notice = running.next_notice().await;
    assert_eq!(notice, ChangeNotice::created(library.path("Artist/Album")));
    assert!(running.registry.is_watched(&library.path("Artist")));
    assert!(running.registry.is_watched(&library.path("Artist/Album")));
    running.stop().await;
}

#[tokio::test]
async fn removing_last_audio_file_deletes_album_entry() {
    let library = Library::new();
    let album = library.album("Single", &["01.flac", "cover.jpg"]);
    library.album("Other", &["01.flac"]);
    let mut running = Running::start(&library).await;

    fs::remove_file(album.join("01.flac")).unwrap();
    running.send(EventKind::Remove(RemoveKind::File), album.join("01.flac"));

    let notice = running.next_notice().await;
    assert_eq!(notice.kind, FsChange::Deleted);
    assert_eq!(notice.path, album);
    assert!(!running.registry.is_watched(&album));
    assert!(running.registry.is_watched(&library.root));
    running.stop().await;
}

#[tokio::test]
async fn watch_errors_do_not_stop_the_loop() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let mut running = Running::start(&library).await;

    running
        .events
        .send(Err(notify::Error::generic("backend hiccup")))
        .unwrap();
    let added = library.album("B", &["01.flac"]);
    running.send(EventKind::Create(CreateKind::File), added.join("01.flac"));

    assert_eq!(running.next_notice().await, ChangeNotice::created(added));
    running.stop().await;
}

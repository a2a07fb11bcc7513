use super::Library;
use repokeeper::error::ApiError;
use repokeeper::tree::{DirectoryTree, Scanner, SystemProbe};
use repokeeper::types::{Extensions, FsChange};
use std::fs;
use std::sync::Arc;

fn scanned(library: &Library) -> DirectoryTree {
    let mut tree = DirectoryTree::new(
        library.root.clone(),
        Extensions::default(),
        Arc::new(SystemProbe::new()),
    );
    Scanner::new().calculate(&mut tree).unwrap();
    tree
}

#[test]
fn scan_tracks_album_entries_and_their_ancestors() {
    let library = Library::new();
    let album = library.album("lib/AlbumX", &["track.flac"]);
    library.album("lib/Artwork", &["cover.jpg"]);
    library.album("Various/Disc 1", &["01.DSF", "02.dsf"]);
    library.album("Various/Disc 2", &["01.mp3"]);

    let tree = scanned(&library);

    assert!(tree.contains(&library.root));
    assert!(tree.contains(&library.path("lib")));
    assert!(tree.is_album_entry(&album));
    assert!(!tree.is_album_entry(&library.path("lib")));
    assert!(!tree.contains(&library.path("lib/Artwork")));
    assert_eq!(
        tree.album_entries(),
        vec![
            library.path("Various/Disc 1"),
            library.path("Various/Disc 2"),
            album.clone(),
        ]
    );
    let various = tree.get(&library.path("Various")).unwrap();
    assert_eq!(various.children.len(), 2);
    assert!(tree.validate().is_empty());
}

#[test]
fn album_entry_with_subdirectory_album_is_kept_on_both_levels() {
    let library = Library::new();
    library.album("Box", &["booklet.flac"]);
    library.album("Box/CD1", &["01.wv"]);

    let tree = scanned(&library);

    assert!(tree.is_album_entry(&library.path("Box")));
    assert!(tree.is_album_entry(&library.path("Box/CD1")));
    assert!(tree
        .get(&library.path("Box"))
        .unwrap()
        .children
        .contains(&library.path("Box/CD1")));
}

#[cfg(unix)]
#[test]
fn rename_follows_disk_identity() {
    let library = Library::new();
    library.album("Artist/Album", &["01.flac"]);
    let mut tree = scanned(&library);
    let inode = tree.get(&library.path("Artist/Album")).unwrap().inode;

    fs::rename(library.path("Artist"), library.path("Band")).unwrap();
    tree.rename(&library.path("Artist"), &library.path("Band")).unwrap();

    assert_eq!(tree.get(&library.path("Band/Album")).unwrap().inode, inode);
    assert!(tree.paths().iter().all(|p| !p.starts_with(library.path("Artist"))));
    let pending = tree.get(&library.path("Band")).unwrap().pending.clone().unwrap();
    assert_eq!(pending.change, FsChange::Renamed);
    assert!(tree.validate().is_empty());
}

#[test]
fn mutations_on_absent_paths_report_desync() {
    let library = Library::new();
    library.album("A", &["01.mp3"]);
    let mut tree = scanned(&library);

    let err = tree.delete(&library.path("Nowhere")).unwrap_err();
    assert!(err.is_cache_desync());
    let err = tree
        .rename(&library.path("Nowhere"), &library.path("Else"))
        .unwrap_err();
    assert!(matches!(err, ApiError::PathNotInTree(_)));
    assert_eq!(tree.album_entries(), vec![library.path("A")]);
}

#[test]
fn deep_nesting_is_handled_iteratively() {
    let library = Library::new();
    let rel: Vec<String> = (0..200).map(|i| format!("d{}", i)).collect();
    let deep = library.album(&rel.join("/"), &["x.flac"]);
    let mut tree = scanned(&library);
    assert!(tree.is_album_entry(&deep));
    assert_eq!(tree.len(), 201);

    tree.delete(&library.path("d0")).unwrap();
    assert_eq!(tree.len(), 1);
    assert!(tree.get(&library.root).unwrap().children.is_empty());
}

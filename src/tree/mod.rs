//! Directory entry cache: tree, probe, scanner and diff engine.

pub mod diff;
pub mod entries;
pub mod node;
pub mod probe;
pub mod walker;

pub use diff::{compare, ChangeSet};
pub use entries::{DetachedSubtree, DirectoryTree};
pub use node::CacheNode;
pub use probe::{EntryKind, FsProbe, SystemProbe};
pub use walker::Scanner;

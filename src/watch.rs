//! Live watching: notification conversion, rename correlation, subscriptions.

pub mod correlator;
pub mod events;
pub mod pending;
pub mod runtime;

pub use correlator::{Correlation, LiveCorrelator};
pub use events::{convert_event, FsEvent, WatchConfig};
pub use pending::{PendingRename, PendingRenameTable};
pub use runtime::{EventReceiver, EventSender, MemoryRegistry, NotifyRegistry, WatchRegistry};

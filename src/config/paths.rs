//! Filesystem locations for config and per-library data.

pub mod xdg_root;

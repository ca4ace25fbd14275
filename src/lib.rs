//! A FUSE filesystem over a remote workspace API: node engine, two-tier
//! caching (metadata + on-disk content), and the remote-access client.

pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fs;
pub mod node;
pub mod path;
pub mod readdir;
pub mod registry;
pub mod remote;

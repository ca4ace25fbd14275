//! Shared re-exports for the `fs` submodules, mirroring the teacher's
//! `fs/prelude.rs` (one place to manage imports common to every dispatch
//! file instead of repeating them).

pub use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};

pub use libc::{EACCES, EBADF, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, ENOTEMPTY, ENOTSUP};
#[cfg(not(target_os = "macos"))]
pub use libc::ENODATA;
#[cfg(target_os = "macos")]
pub use libc::ENOATTR;

pub use std::ffi::OsStr;
pub use std::time::{Duration, SystemTime};

pub use crate::error::NodeError;
pub use crate::node::{Node, NodeAttrView, NodeEngine, OpenOutcome};
pub use crate::readdir::DirStream;

pub use super::FsWrapper;

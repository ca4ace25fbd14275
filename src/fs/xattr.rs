use super::FsWrapper;
use crate::fs::prelude::*;

// Extended attributes are out of scope (§1 Non-goals: "does not support
// extended attributes"). The teacher's stub behavior is kept rather than
// wired to the node engine at all: reads report "no such attribute",
// writes report success without storing anything, avoiding spurious
// "Cannot copy file" errors from tools that probe xattrs unconditionally.

pub fn getxattr(_fs: &mut FsWrapper, _req: &Request, _ino: u64, _name: &OsStr, _size: u32, reply: ReplyXattr) {
    #[cfg(target_os = "macos")]
    reply.error(ENOATTR);
    #[cfg(not(target_os = "macos"))]
    reply.error(ENODATA);
}

pub fn setxattr(
    _fs: &mut FsWrapper,
    _req: &Request,
    _ino: u64,
    _name: &OsStr,
    _value: &[u8],
    _flags: i32,
    _position: u32,
    reply: ReplyEmpty,
) {
    reply.ok();
}

pub fn listxattr(_fs: &mut FsWrapper, _req: &Request, _ino: u64, size: u32, reply: ReplyXattr) {
    if size == 0 {
        reply.size(0);
    } else {
        reply.data(&[]);
    }
}

pub fn removexattr(_fs: &mut FsWrapper, _req: &Request, _ino: u64, _name: &OsStr, reply: ReplyEmpty) {
    reply.ok();
}

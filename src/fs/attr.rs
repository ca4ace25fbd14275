use super::{to_file_attr, FsWrapper};
use crate::fs::prelude::*;

/// FUSE `getattr`: fetches the node's attribute view and its owner for the
/// `uid` field, then builds a `FileAttr` with the TTL the mount was
/// configured with.
pub fn getattr(fs: &mut FsWrapper, _req: &Request, ino: u64, reply: ReplyAttr) {
    let node = match fs.engine().get_node(ino) {
        Ok(n) => n,
        Err(e) => {
            reply.error(e.to_errno());
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().attr(ino)) {
        Ok(view) => reply.attr(&fs.attr_ttl, &to_file_attr(&view, node.owner_uid)),
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `setattr`. Mode/uid/gid are rejected with "not supported" before
/// ever reaching the node engine (§4.6 "Setattr"); `atime`/`ctime`/`crtime`
/// are accepted by the kernel but carry no corresponding engine operation.
#[allow(clippy::too_many_arguments)]
pub fn setattr(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    ino: u64,
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
    size: Option<u64>,
    mtime: Option<TimeOrNow>,
    reply: ReplyAttr,
) {
    let node = match fs.engine().get_node(ino) {
        Ok(n) => n,
        Err(e) => {
            reply.error(e.to_errno());
            return;
        }
    };
    let mtime_abs = mtime.map(|t| match t {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    });
    match fs.runtime.block_on(fs.engine().setattr(ino, mode, uid, gid, size, mtime_abs)) {
        Ok(view) => reply.attr(&fs.attr_ttl, &to_file_attr(&view, node.owner_uid)),
        Err(e) => reply.error(e.to_errno()),
    }
}

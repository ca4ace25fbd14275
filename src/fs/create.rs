use super::{to_file_attr, FsWrapper};
use crate::fs::prelude::*;

/// FUSE `create`: writes an initial empty payload remotely, then opens the
/// new node with write intent. `fh` in the reply is the new inode.
#[allow(clippy::too_many_arguments)]
pub fn create(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    parent: u64,
    name: &OsStr,
    _mode: u32,
    _umask: u32,
    _flags: i32,
    reply: ReplyCreate,
) {
    let name = match name.to_str() {
        Some(s) => s,
        None => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().create(parent, name)) {
        Ok((node, outcome)) => {
            let view = match fs.runtime.block_on(fs.engine().attr(node.ino)) {
                Ok(v) => v,
                Err(e) => {
                    reply.error(e.to_errno());
                    return;
                }
            };
            let mut open_flags = 0;
            if outcome.direct_io {
                open_flags |= fuser::consts::FOPEN_DIRECT_IO;
            }
            if outcome.keep_cache {
                open_flags |= fuser::consts::FOPEN_KEEP_CACHE;
            }
            reply.created(&fs.entry_ttl, &to_file_attr(&view, node.owner_uid), 0, node.ino, open_flags);
        }
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `mkdir`.
pub fn mkdir(fs: &mut FsWrapper, _req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
    let name = match name.to_str() {
        Some(s) => s,
        None => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().mkdir(parent, name)) {
        Ok(node) => match fs.runtime.block_on(fs.engine().attr(node.ino)) {
            Ok(view) => reply.entry(&fs.entry_ttl, &to_file_attr(&view, node.owner_uid), 0),
            Err(e) => reply.error(e.to_errno()),
        },
        Err(e) => reply.error(e.to_errno()),
    }
}

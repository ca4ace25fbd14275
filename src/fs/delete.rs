use super::FsWrapper;
use crate::fs::prelude::*;

/// FUSE `unlink`.
pub fn unlink(fs: &mut FsWrapper, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
    let name = match name.to_str() {
        Some(s) => s,
        None => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().unlink(parent, name)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `rmdir`.
pub fn rmdir(fs: &mut FsWrapper, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
    let name = match name.to_str() {
        Some(s) => s,
        None => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().rmdir(parent, name)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

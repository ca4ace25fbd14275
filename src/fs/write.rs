use super::FsWrapper;
use crate::fs::prelude::*;

/// FUSE `write`. `fh` is the inode (see `fs::mod`'s module doc).
#[allow(clippy::too_many_arguments)]
pub fn write(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    data: &[u8],
    _write_flags: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyWrite,
) {
    match fs.runtime.block_on(fs.engine().write(ino, offset, data)) {
        Ok(written) => reply.written(written),
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `flush`: a no-op while other handles remain open (§4.6 "Flush").
pub fn flush(fs: &mut FsWrapper, _req: &Request<'_>, ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
    match fs.runtime.block_on(fs.engine().flush(ino)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `release`.
#[allow(clippy::too_many_arguments)]
pub fn release(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    ino: u64,
    _fh: u64,
    _flags: i32,
    _lock_owner: Option<u64>,
    _flush: bool,
    reply: ReplyEmpty,
) {
    match fs.runtime.block_on(fs.engine().release(ino)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `fsync`: unlike `flush`, always persists dirty data.
pub fn fsync(fs: &mut FsWrapper, _req: &Request<'_>, ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
    match fs.runtime.block_on(fs.engine().fsync(ino)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

use super::{to_file_attr, FsWrapper};
use crate::fs::prelude::*;
use crate::readdir::DirStream;

/// FUSE `lookup`.
pub fn lookup(fs: &mut FsWrapper, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
    let name = match name.to_str() {
        Some(s) => s,
        None => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().lookup(parent, name)) {
        Ok(node) => match fs.runtime.block_on(fs.engine().attr(node.ino)) {
            Ok(view) => reply.entry(&fs.entry_ttl, &to_file_attr(&view, node.owner_uid), 0),
            Err(e) => reply.error(e.to_errno()),
        },
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `readdir`. The directory's own attributes were already staged by
/// `lookup`/`opendir`; here we only need its children, synthesizing `.`
/// and `..` through [`DirStream`].
pub fn readdir(fs: &mut FsWrapper, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
    let children = match fs.runtime.block_on(fs.engine().read_dir(ino)) {
        Ok(c) => c,
        Err(e) => {
            reply.error(e.to_errno());
            return;
        }
    };

    let parent_ino = fs.runtime.block_on(fs.engine().parent_of(ino));
    let stream = DirStream::new(ino, parent_ino, children);
    for (next_offset, entry) in stream.from_offset(offset) {
        let kind = if entry.is_directory { FileType::Directory } else { FileType::RegularFile };
        if reply.add(entry.ino, next_offset, kind, &entry.name) {
            break;
        }
    }
    reply.ok();
}

/// FUSE `open`: honors `O_TRUNC`; direct I/O is requested for write-intent
/// opens so the kernel doesn't cache pages this engine already buffers.
pub fn open(fs: &mut FsWrapper, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
    let o_trunc = flags & libc::O_TRUNC != 0;
    let write_intent = (flags & libc::O_WRONLY != 0) || (flags & libc::O_RDWR != 0);
    match fs.runtime.block_on(fs.engine().open(ino, o_trunc, write_intent)) {
        Ok(outcome) => {
            let mut open_flags = 0;
            if outcome.direct_io {
                open_flags |= fuser::consts::FOPEN_DIRECT_IO;
            }
            if outcome.keep_cache {
                open_flags |= fuser::consts::FOPEN_KEEP_CACHE;
            }
            reply.opened(ino, open_flags);
        }
        Err(e) => reply.error(e.to_errno()),
    }
}

/// FUSE `read`. `fh` is the inode itself (see module doc on `fs::mod`).
pub fn read(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    size: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyData,
) {
    match fs.runtime.block_on(fs.engine().read(ino, offset, size)) {
        Ok(bytes) => reply.data(&bytes),
        Err(e) => reply.error(e.to_errno()),
    }
}

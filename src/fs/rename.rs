use super::FsWrapper;
use crate::fs::prelude::*;

/// FUSE `rename`. `flags` (e.g. `RENAME_NOREPLACE`) are not honored; the
/// remote API gives no way to express them atomically, matching the
/// teacher's own "not atomic" caveat on its move implementation.
#[allow(clippy::too_many_arguments)]
pub fn rename(
    fs: &mut FsWrapper,
    _req: &Request<'_>,
    parent: u64,
    name: &OsStr,
    newparent: u64,
    newname: &OsStr,
    _flags: u32,
    reply: ReplyEmpty,
) {
    let (name, newname) = match (name.to_str(), newname.to_str()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            reply.error(EINVAL);
            return;
        }
    };
    match fs.runtime.block_on(fs.engine().rename(parent, name, newparent, newname)) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.to_errno()),
    }
}

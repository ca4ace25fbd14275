//! Directory stream adapter (§2 "Directory stream adapter"): a lazy,
//! offset-resumable view over a directory listing, handed to the FUSE
//! `readdir` callback which may page through it across multiple calls.
//!
//! Grounded on the teacher's `read::readdir` (`client/src/fs/read.rs`),
//! which built an `entries_to_add: Vec<(u64, FileType, String)>` inline and
//! iterated it with `.skip(offset as usize)`. Promoted here to its own
//! type so the `.` / `..` synthesis and the offset bookkeeping are
//! reusable and independently testable.

#[derive(Debug, Clone)]
pub struct DirStreamEntry {
    pub ino: u64,
    pub name: String,
    pub is_directory: bool,
}

/// A fully materialized directory listing, ready to be paged out starting
/// from an arbitrary offset.
pub struct DirStream {
    entries: Vec<DirStreamEntry>,
}

impl DirStream {
    pub fn new(ino: u64, parent_ino: u64, children: Vec<DirStreamEntry>) -> Self {
        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push(DirStreamEntry { ino, name: ".".to_string(), is_directory: true });
        entries.push(DirStreamEntry { ino: parent_ino, name: "..".to_string(), is_directory: true });
        entries.extend(children);
        Self { entries }
    }

    /// Entries starting at `offset`, paired with the offset the caller
    /// should resume from next (`index + 1`, matching `fuser::ReplyDirectory`'s
    /// convention that the offset passed to `add` is "next call starts here").
    pub fn from_offset(&self, offset: i64) -> impl Iterator<Item = (i64, &DirStreamEntry)> {
        self.entries.iter().enumerate().skip(offset.max(0) as usize).map(|(i, e)| ((i + 1) as i64, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ino: u64, name: &str) -> DirStreamEntry {
        DirStreamEntry { ino, name: name.to_string(), is_directory: false }
    }

    #[test]
    fn synthesizes_dot_entries_first() {
        let stream = DirStream::new(5, 1, vec![entry(6, "a.txt")]);
        let names: Vec<_> = stream.from_offset(0).map(|(_, e)| e.name.clone()).collect();
        assert_eq!(names, vec![".", "..", "a.txt"]);
    }

    #[test]
    fn resumes_from_offset() {
        let stream = DirStream::new(5, 1, vec![entry(6, "a.txt"), entry(7, "b.txt")]);
        let names: Vec<_> = stream.from_offset(2).map(|(_, e)| e.name.clone()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn offsets_increment_by_one() {
        let stream = DirStream::new(5, 1, vec![entry(6, "a.txt")]);
        let offsets: Vec<_> = stream.from_offset(0).map(|(off, _)| off).collect();
        assert_eq!(offsets, vec![1, 2, 3]);
    }
}

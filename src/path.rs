//! Bidirectional mapping between user-visible (FUSE) paths and the paths
//! used against the remote workspace API.
//!
//! Notebook objects are stored remotely without a suffix but presented to
//! FUSE callers with a trailing `.ipynb`. Detection of "is this a notebook"
//! is always driven by the remote object's type, never by the suffix alone
//! — a plain file that happens to be named `x.ipynb` must not be treated
//! as a notebook.

const NOTEBOOK_SUFFIX: &str = ".ipynb";

/// Stateless translator between `FusePath` and `RemotePath` strings.
///
/// Both path flavors are represented as plain `String`s in this crate;
/// the distinction is a naming discipline enforced at call sites, not a
/// type-level one, matching how the teacher crate threads plain path
/// strings through `inode_to_path`/`path_to_inode`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathTranslator;

impl PathTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Strips a trailing `.ipynb` suffix, if present, to obtain the path
    /// used for remote API calls.
    pub fn to_remote(&self, fuse_path: &str) -> String {
        fuse_path
            .strip_suffix(NOTEBOOK_SUFFIX)
            .unwrap_or(fuse_path)
            .to_string()
    }

    /// Appends `.ipynb` to `name` iff `is_notebook` is true and the name
    /// does not already carry the suffix.
    pub fn to_fuse_name(&self, name: &str, is_notebook: bool) -> String {
        if is_notebook && !self.has_notebook_suffix(name) {
            format!("{name}{NOTEBOOK_SUFFIX}")
        } else {
            name.to_string()
        }
    }

    pub fn has_notebook_suffix(&self, name: &str) -> bool {
        name.ends_with(NOTEBOOK_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_notebook_suffix() {
        let t = PathTranslator::new();
        assert_eq!(t.to_remote("notes/a.ipynb"), "notes/a");
        assert_eq!(t.to_remote("notes/a.txt"), "notes/a.txt");
    }

    #[test]
    fn appends_suffix_only_for_notebooks() {
        let t = PathTranslator::new();
        assert_eq!(t.to_fuse_name("a", true), "a.ipynb");
        assert_eq!(t.to_fuse_name("a", false), "a");
        assert_eq!(t.to_fuse_name("a.ipynb", true), "a.ipynb");
    }

    #[test]
    fn detects_suffix_textually_but_typing_is_external() {
        let t = PathTranslator::new();
        assert!(t.has_notebook_suffix("x.ipynb"));
        assert!(!t.has_notebook_suffix("x.txt"));
    }
}

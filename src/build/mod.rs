//! Build units: the groupings of files the build plan works on.

pub mod loader;

use std::path::{Path, PathBuf};

pub use loader::{load_units, LoadConfig};

use crate::encoding::FileSpec;
use crate::error::PlanError;
use crate::syntax::File;

/// One package or ad-hoc file set found on the command line.
#[derive(Debug, Default)]
pub struct BuildUnit {
    /// Came from explicit file arguments rather than a package directory.
    pub user: bool,
    /// Directory the unit lives in.
    pub dir: PathBuf,
    /// Name used in diagnostics and `// <id>` headers.
    pub display_path: String,
    pub pkg_name: Option<String>,
    /// Configuration source files, in load order.
    pub syntax: Vec<File>,
    /// Data files that are not configuration source.
    pub orphaned: Vec<FileSpec>,
    /// Nearest ancestor holding a `cue.mod` directory.
    pub module_root: Option<PathBuf>,
    /// Load failure; fatal for the whole plan.
    pub err: Option<PlanError>,
}

impl BuildUnit {
    pub fn new(user: bool, dir: impl Into<PathBuf>, display_path: impl Into<String>) -> Self {
        Self {
            user,
            dir: dir.into(),
            display_path: display_path.into(),
            ..Default::default()
        }
    }

    pub fn with_syntax(mut self, file: File) -> Self {
        self.add_syntax(file);
        self
    }

    pub fn with_orphan(mut self, spec: FileSpec) -> Self {
        self.orphaned.push(spec);
        self
    }

    /// Append a configuration file, adopting its package name if the unit
    /// has none yet.
    pub fn add_syntax(&mut self, file: File) {
        if self.pkg_name.is_none() {
            self.pkg_name = file.package.clone();
        }
        self.syntax.push(file);
    }

    /// True when the unit consists of data files only.
    pub fn is_orphan_only(&self) -> bool {
        self.syntax.is_empty() && !self.orphaned.is_empty()
    }

    /// Record the first load error.
    pub(crate) fn fail(&mut self, err: PlanError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }
}

/// Find the module root for `start`: the nearest ancestor holding `cue.mod`.
pub fn find_module_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("cue.mod").is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn module_root_prefers_nearest() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("cue.mod")).unwrap();
        std::fs::create_dir_all(root.join("sub/cue.mod")).unwrap();
        std::fs::create_dir_all(root.join("sub/pkg/x")).unwrap();

        assert_eq!(find_module_root(&root.join("sub/pkg/x")), Some(root.join("sub")));
        assert_eq!(find_module_root(root), Some(root.to_path_buf()));
    }

    #[test]
    fn module_root_absent() {
        let dir = tempdir().unwrap();
        assert_eq!(find_module_root(dir.path()), None);
    }

    #[test]
    fn first_package_name_wins() {
        let mut f = File::new("a.cue");
        f.package = Some("foo".into());
        let mut g = File::new("b.cue");
        g.package = Some("bar".into());
        let unit = BuildUnit::new(true, ".", "x").with_syntax(f).with_syntax(g);
        assert_eq!(unit.pkg_name.as_deref(), Some("foo"));
        assert!(!unit.is_orphan_only());
    }
}

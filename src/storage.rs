//! 根目录与请求路径拼接，以及越界检查。

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 将请求路径后缀拼接到根目录下。
    ///
    /// 后缀中的 `.`/`..` 按字面折叠，随后对最深的已存在祖先做规范化，
    /// 结果必须仍位于规范化后的根目录之下。返回的是拼接路径而非规范化路径。
    pub fn resolve(&self, suffix: &str) -> Result<PathBuf, StorageError> {
        let mut normalized = PathBuf::new();
        let trimmed = suffix.trim_start_matches(['/', '\\']);
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => continue,
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(StorageError::OutsideRoot);
                    }
                }
            }
        }

        let target = self.root.join(normalized);
        self.ensure_contained(&target)?;
        Ok(target)
    }

    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }

    fn ensure_contained(&self, target: &Path) -> Result<(), StorageError> {
        let root = fs::canonicalize(&self.root)?;
        let mut probe = target;
        loop {
            // symlink_metadata 让悬空链接也算作已存在，随后规范化失败即拒绝。
            if fs::symlink_metadata(probe).is_ok() {
                let canonical = fs::canonicalize(probe).map_err(|_| StorageError::OutsideRoot)?;
                if canonical.starts_with(&root) {
                    return Ok(());
                }
                return Err(StorageError::OutsideRoot);
            }
            probe = probe.parent().ok_or(StorageError::OutsideRoot)?;
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    OutsideRoot,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{Storage, StorageError};
    use std::io::ErrorKind;
    use tempfile::tempdir;

    fn make_storage() -> (tempfile::TempDir, Storage) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        std::fs::create_dir_all(&root).expect("create root");
        (temp, Storage::new(root))
    }

    #[test]
    fn resolve_concatenates_suffix_onto_root() {
        let (_temp, storage) = make_storage();
        let resolved = storage.resolve("/uploads/hello.txt").expect("resolve");
        assert_eq!(resolved, storage.root_path().join("uploads").join("hello.txt"));
    }

    #[test]
    fn resolve_root_suffix_is_root() {
        let (_temp, storage) = make_storage();
        let resolved = storage.resolve("/").expect("resolve");
        assert!(storage.is_root(&resolved));
    }

    #[test]
    fn resolve_folds_parent_segments_inside_root() {
        let (_temp, storage) = make_storage();
        let resolved = storage.resolve("/a/../b/./c").expect("resolve");
        assert_eq!(resolved, storage.root_path().join("b").join("c"));
    }

    #[test]
    fn resolve_rejects_parent_escape() {
        let (_temp, storage) = make_storage();
        let result = storage.resolve("/../outside.txt");
        assert!(matches!(result, Err(StorageError::OutsideRoot)));
        let result = storage.resolve("/a/../../outside.txt");
        assert!(matches!(result, Err(StorageError::OutsideRoot)));
    }

    #[test]
    fn resolve_reports_missing_root() {
        let temp = tempdir().expect("tempdir");
        let storage = Storage::new(temp.path().join("absent"));
        match storage.resolve("/file") {
            Err(StorageError::Io(err)) => assert_eq!(err.kind(), ErrorKind::NotFound),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escaping_root() {
        use std::os::unix::fs::symlink;

        let (temp, storage) = make_storage();
        let outside = temp.path().join("outside.txt");
        std::fs::write(&outside, b"secret").expect("write outside file");
        symlink(&outside, storage.root_path().join("link")).expect("symlink");

        let result = storage.resolve("/link");
        assert!(matches!(result, Err(StorageError::OutsideRoot)));

        let outside_dir = temp.path().join("elsewhere");
        std::fs::create_dir_all(&outside_dir).expect("create outside dir");
        symlink(&outside_dir, storage.root_path().join("dirlink")).expect("symlink");
        let result = storage.resolve("/dirlink/new.bin");
        assert!(matches!(result, Err(StorageError::OutsideRoot)));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_allows_symlink_within_root() {
        use std::os::unix::fs::symlink;

        let (_temp, storage) = make_storage();
        std::fs::create_dir_all(storage.root_path().join("real")).expect("create dir");
        symlink(
            storage.root_path().join("real"),
            storage.root_path().join("alias"),
        )
        .expect("symlink");

        let resolved = storage.resolve("/alias/file.bin").expect("resolve");
        assert_eq!(resolved, storage.root_path().join("alias").join("file.bin"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_dangling_symlink() {
        use std::os::unix::fs::symlink;

        let (temp, storage) = make_storage();
        symlink(temp.path().join("nowhere"), storage.root_path().join("dangling"))
            .expect("symlink");
        let result = storage.resolve("/dangling");
        assert!(matches!(result, Err(StorageError::OutsideRoot)));
    }
}

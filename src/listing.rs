//! 目录枚举：按文件名排序并为文件计算摘要。

use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

use crate::hasher::hash_file;
use crate::logging::EventLog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EntryType {
    File,
    Folder,
}

/// 单次列表响应中的一项；`id` 只是本次枚举中的序号。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: usize,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub sha256: String,
}

impl FileEntry {
    pub fn file(id: usize, title: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            kind: EntryType::File,
            sha256: sha256.into(),
        }
    }

    pub fn folder(id: usize, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            kind: EntryType::Folder,
            sha256: String::new(),
        }
    }
}

/// 列出目录的直接子项。
///
/// 枚举本身失败时整体返回错误；单个文件摘要失败只记录告警，
/// 该项仍以空 `sha256` 返回。摘要每次重新计算，不做缓存。
pub fn list_directory(dir: &Path, log: &dyn EventLog) -> io::Result<Vec<FileEntry>> {
    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    let mut entries = Vec::with_capacity(children.len());
    for (id, child) in children.into_iter().enumerate() {
        let title = child.file_name().to_string_lossy().into_owned();
        let path = child.path();
        // 跟随链接判断目录；悬空链接退回到链接本身的类型。
        let is_dir = match fs::metadata(&path) {
            Ok(metadata) => metadata.is_dir(),
            Err(_) => child.file_type().map(|ty| ty.is_dir()).unwrap_or(false),
        };

        if is_dir {
            entries.push(FileEntry::folder(id, title));
            continue;
        }

        let sha256 = match hash_file(&path) {
            Ok(digest) => digest,
            Err(err) => {
                log.warn(&format!(
                    "failed to hash {}: {err}",
                    path.to_string_lossy()
                ));
                String::new()
            }
        };
        entries.push(FileEntry::file(id, title, sha256));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_reader;
    use crate::logging::testing::RecordingLog;
    use tempfile::tempdir;

    #[test]
    fn entries_are_sorted_and_numbered() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("zeta.bin"), b"z").expect("write");
        std::fs::write(temp.path().join("alpha.bin"), b"a").expect("write");
        std::fs::create_dir(temp.path().join("middle")).expect("mkdir");

        let log = RecordingLog::default();
        let entries = list_directory(temp.path(), &log).expect("list");

        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["alpha.bin", "middle", "zeta.bin"]);
        for (index, entry) in entries.iter().enumerate() {
            assert_eq!(entry.id, index);
        }
    }

    #[test]
    fn files_carry_digest_and_folders_do_not() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("data.txt"), b"payload").expect("write");
        std::fs::create_dir(temp.path().join("nested")).expect("mkdir");
        std::fs::write(temp.path().join("nested").join("inner.txt"), b"x").expect("write");

        let log = RecordingLog::default();
        let entries = list_directory(temp.path(), &log).expect("list");

        let expected = hash_reader(&b"payload"[..]).expect("hash");
        assert_eq!(entries[0], FileEntry::file(0, "data.txt", expected));
        assert_eq!(entries[1], FileEntry::folder(1, "nested"));
        assert!(entries[1].sha256.is_empty());
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn empty_directory_lists_nothing() {
        let temp = tempdir().expect("tempdir");
        let log = RecordingLog::default();
        assert!(list_directory(temp.path(), &log).expect("list").is_empty());
    }

    #[test]
    fn missing_directory_fails_whole_listing() {
        let temp = tempdir().expect("tempdir");
        let log = RecordingLog::default();
        let err = list_directory(&temp.path().join("absent"), &log).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_listed_without_digest() {
        use std::os::unix::fs::symlink;

        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("good.txt"), b"ok").expect("write");
        symlink(temp.path().join("gone"), temp.path().join("broken")).expect("symlink");

        let log = RecordingLog::default();
        let entries = list_directory(temp.path(), &log).expect("list");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], FileEntry::file(0, "broken", ""));
        assert_eq!(entries[1].title, "good.txt");
        assert!(!entries[1].sha256.is_empty());
        let warnings = log.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("broken"));
    }

    #[test]
    fn entry_serializes_with_wire_field_names() {
        let value = serde_json::to_value(FileEntry::folder(3, "fw")).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"id": 3, "title": "fw", "type": "Folder", "sha256": ""})
        );
    }
}

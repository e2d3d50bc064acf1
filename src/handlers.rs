//! 方法处理器：把请求映射为根目录下的文件系统操作。
//!
//! 所有操作都是同步阻塞调用，不持有锁，也不重试；
//! 调用方负责把它们放到独立的执行单元上运行。

use axum::http::Method;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{COPY_DESTINATION_HEADER, SNIFF_LEN, UPLOAD_FIELD};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::hasher::hash_reader;
use crate::listing::{FileEntry, list_directory};
use crate::logging::EventLog;
use crate::sniff::detect_content_type;
use crate::storage::Storage;
use crate::transfer::write_stream;

/// 处理结果，由传输层适配器转换为具体响应。
#[derive(Debug)]
pub enum Reply {
    Listing(Vec<FileEntry>),
    Stored(FileEntry),
    Content(FileContent),
    Probe(ProbeInfo),
    Done,
}

#[derive(Debug)]
pub struct FileContent {
    pub file: File,
    pub path: PathBuf,
    pub len: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProbeInfo {
    pub len: u64,
    pub content_type: &'static str,
    pub file_name: String,
    pub server_name: String,
}

pub struct FileService {
    storage: Storage,
    log: Arc<dyn EventLog>,
    server_name: String,
}

impl FileService {
    pub fn new(storage: Storage, log: Arc<dyn EventLog>, server_name: impl Into<String>) -> Self {
        Self {
            storage,
            log,
            server_name: server_name.into(),
        }
    }

    pub fn handle(&self, ctx: &mut dyn RequestContext) -> Result<Reply, ApiError> {
        let method = ctx.method().clone();
        match method {
            Method::GET => self.retrieve(ctx),
            Method::PUT => self.upload(ctx),
            Method::DELETE => self.delete(ctx),
            Method::HEAD => self.probe(ctx),
            Method::POST => self.copy(ctx),
            other => Err(ApiError::MethodNotAllowed(format!(
                "unsupported method {other}"
            ))),
        }
    }

    /// 目录返回条目列表，文件返回原始内容。
    pub fn retrieve(&self, ctx: &dyn RequestContext) -> Result<Reply, ApiError> {
        let target = self.storage.resolve(ctx.path())?;
        let metadata = stat(&target)?;

        if metadata.is_dir() {
            let entries = list_directory(&target, self.log.as_ref())
                .map_err(|err| ApiError::NotFound(err.to_string()))?;
            return Ok(Reply::Listing(entries));
        }

        let file = File::open(&target).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        })?;
        Ok(Reply::Content(FileContent {
            file,
            path: target,
            len: metadata.len(),
        }))
    }

    /// 把 `File` 字段写入路径所指的已有目录，返回写入内容的摘要。
    pub fn upload(&self, ctx: &mut dyn RequestContext) -> Result<Reply, ApiError> {
        let dir_suffix = ctx.path().to_string();
        let dir = self.storage.resolve(&dir_suffix)?;
        stat(&dir)?;

        let mut upload = ctx
            .take_upload(UPLOAD_FIELD)
            .ok_or_else(|| ApiError::NotFound(format!("missing form field {UPLOAD_FIELD}")))?;
        let name = base_name(&upload.file_name)
            .ok_or_else(|| ApiError::BadRequest("invalid upload filename".into()))?
            .to_string();

        let sha256 =
            hash_reader(&mut upload.content).map_err(|err| ApiError::Internal(err.to_string()))?;
        upload
            .content
            .seek(SeekFrom::Start(0))
            .map_err(|err| ApiError::Internal(err.to_string()))?;

        let destination = self
            .storage
            .resolve(&format!("{}/{}", dir_suffix.trim_end_matches('/'), name))?;
        let written = write_stream(&mut upload.content, &destination)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;

        self.log.info(&format!(
            "stored {} ({written} bytes, sha256 {sha256})",
            destination.to_string_lossy()
        ));
        Ok(Reply::Stored(FileEntry::file(0, name, sha256)))
    }

    /// 递归删除文件或目录；不是幂等操作。
    pub fn delete(&self, ctx: &dyn RequestContext) -> Result<Reply, ApiError> {
        let target = self.storage.resolve(ctx.path())?;
        stat(&target)?;
        if self.storage.is_root(&target) {
            return Err(ApiError::BadRequest("refusing to remove root".into()));
        }

        remove_path(&target).map_err(|err| ApiError::BadRequest(err.to_string()))?;
        self.log
            .info(&format!("removed {}", target.to_string_lossy()));
        Ok(Reply::Done)
    }

    /// 只返回元数据：大小、探测出的类型与文件名。
    pub fn probe(&self, ctx: &dyn RequestContext) -> Result<Reply, ApiError> {
        let target = self.storage.resolve(ctx.path())?;
        let metadata = stat(&target)?;

        let file = File::open(&target).map_err(|err| ApiError::BadRequest(err.to_string()))?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        // 小于窗口的文件是短读，不算错误。
        file.take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;

        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Reply::Probe(ProbeInfo {
            len: metadata.len(),
            content_type: detect_content_type(&head),
            file_name,
            server_name: self.server_name.clone(),
        }))
    }

    /// 把请求路径的文件复制到 `X-Copy-From` 指定的路径。
    pub fn copy(&self, ctx: &dyn RequestContext) -> Result<Reply, ApiError> {
        let source = self.storage.resolve(ctx.path())?;
        let mut file = File::open(&source).map_err(|err| ApiError::NotFound(err.to_string()))?;

        let destination_suffix = ctx
            .header(COPY_DESTINATION_HEADER)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("missing copy destination header".into()))?;
        let destination = self.storage.resolve(destination_suffix)?;

        if is_same_file(&source, &destination) {
            return Ok(Reply::Done);
        }

        let written = write_stream(&mut file, &destination)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        self.log.info(&format!(
            "copied {} to {} ({written} bytes)",
            source.to_string_lossy(),
            destination.to_string_lossy()
        ));
        Ok(Reply::Done)
    }
}

fn stat(path: &Path) -> Result<fs::Metadata, ApiError> {
    fs::metadata(path).map_err(|err| ApiError::NotFound(err.to_string()))
}

fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// 去掉客户端文件名中的目录部分（兼容 `/` 与 `\`）。
fn base_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

// 目标与源相同时截断会清空源文件。
fn is_same_file(source: &Path, destination: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(destination)) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

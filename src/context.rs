//! 与传输层无关的请求上下文抽象。

use axum::http::Method;
use std::io::{Read, Seek};

/// 可读且可回绕的上传内容。
pub trait UploadSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> UploadSource for T {}

/// multipart 表单中的单个文件字段。
pub struct UploadedFile {
    /// 客户端提交的原始文件名，可能带有目录部分。
    pub file_name: String,
    pub content: Box<dyn UploadSource>,
}

/// 处理器所需的请求视图：方法、路径后缀、请求头与表单文件。
pub trait RequestContext {
    fn method(&self) -> &Method;
    fn path(&self) -> &str;
    fn header(&self, name: &str) -> Option<&str>;
    /// 取出指定名称的表单文件字段，每个字段只能取一次。
    fn take_upload(&mut self, field: &str) -> Option<UploadedFile>;
}

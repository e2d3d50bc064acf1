//! axum 适配层：构造请求上下文，在阻塞线程池中运行处理器并生成响应。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, FromRequest, Multipart, Path};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::SERVER_ID_HEADER;
use crate::context::{RequestContext, UploadedFile};
use crate::error::ApiError;
use crate::handlers::{FileService, ProbeInfo, Reply};

/// 从 axum 请求中提取出的上下文；上传字段已落盘到匿名临时文件。
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    uploads: HashMap<String, UploadedFile>,
}

impl RequestContext for HttpRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn take_upload(&mut self, field: &str) -> Option<UploadedFile> {
        self.uploads.remove(field)
    }
}

/// 根路径请求。
pub async fn serve_root(
    Extension(service): Extension<Arc<FileService>>,
    request: Request<AxumBody>,
) -> Response {
    dispatch(service, "/".to_string(), request).await
}

/// 根目录以下任意路径的请求。
pub async fn serve_path(
    Extension(service): Extension<Arc<FileService>>,
    Path(path): Path<String>,
    request: Request<AxumBody>,
) -> Response {
    dispatch(service, format!("/{path}"), request).await
}

async fn dispatch(service: Arc<FileService>, path: String, request: Request<AxumBody>) -> Response {
    let method = request.method().clone();
    let headers = request.headers().clone();
    let uploads = if method == Method::PUT {
        match spool_uploads(request).await {
            Ok(uploads) => uploads,
            Err(err) => return err.into_response(),
        }
    } else {
        HashMap::new()
    };

    let mut ctx = HttpRequest {
        method,
        path,
        headers,
        uploads,
    };
    let outcome = tokio::task::spawn_blocking(move || service.handle(&mut ctx)).await;
    let result = match outcome {
        Ok(result) => result.and_then(reply_into_response),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// 把 multipart 中的文件字段写入匿名临时文件，供阻塞处理器读取与回绕。
async fn spool_uploads(
    request: Request<AxumBody>,
) -> Result<HashMap<String, UploadedFile>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));
    if !is_multipart {
        return Ok(HashMap::new());
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let mut uploads = HashMap::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        let (Some(name), Some(file_name)) = (
            field.name().map(str::to_string),
            field.file_name().map(str::to_string),
        ) else {
            continue;
        };
        if uploads.contains_key(&name) {
            continue;
        }

        let spool = tempfile::tempfile().map_err(|err| ApiError::Internal(err.to_string()))?;
        let mut spool = tokio::fs::File::from_std(spool);
        let mut total: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ApiError::BadRequest(err.body_text()))?
        {
            total += chunk.len() as u64;
            spool
                .write_all(&chunk)
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))?;
        }
        spool
            .flush()
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        spool
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        debug!(field = name, file_name, bytes = total, "upload field spooled");

        let content = spool.into_std().await;
        uploads.insert(
            name,
            UploadedFile {
                file_name,
                content: Box::new(content),
            },
        );
    }
    Ok(uploads)
}

fn reply_into_response(reply: Reply) -> Result<Response, ApiError> {
    match reply {
        Reply::Listing(entries) => Ok(JsonResponse(entries).into_response()),
        Reply::Stored(entry) => Ok(JsonResponse(entry).into_response()),
        Reply::Content(content) => {
            let mime = mime_guess::from_path(&content.path).first_or_octet_stream();
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, header_value(mime.essence_str())?);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.len));
            let stream = ReaderStream::new(tokio::fs::File::from_std(content.file));
            Ok((StatusCode::OK, headers, AxumBody::from_stream(stream)).into_response())
        }
        Reply::Probe(info) => Ok((StatusCode::OK, probe_headers(&info)?).into_response()),
        Reply::Done => Ok(StatusCode::OK.into_response()),
    }
}

fn probe_headers(info: &ProbeInfo) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.len));
    headers.insert(header::CONTENT_TYPE, header_value(info.content_type)?);
    let file_name = info.file_name.replace('\\', "\\\\").replace('"', "\\\"");
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_bytes(format!("attachment; filename=\"{file_name}\"").as_bytes())
            .map_err(|_| ApiError::Internal("invalid file name for header".into()))?,
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    headers.insert(
        HeaderName::from_static(SERVER_ID_HEADER),
        header_value(&info.server_name)?,
    );
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::Internal("响应头构建失败".into()))
}

use std::fmt;
use std::path::Path;

use crate::error::{AppResult, FileError};

/// 支持上传的文档扩展名及对应的 MIME 类型
static EXTENSION_MIME: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "pdf" => "application/pdf",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "ppt" => "application/vnd.ms-powerpoint",
    "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
};

/// 一份生成材料：用户上传的文件或搜索补充下载的文件
///
/// 仅在单次生成请求内存活，不做任何持久化
#[derive(Clone, PartialEq)]
pub struct MaterialRef {
    /// 文件名，用于展示、相关性过滤和上传
    pub name: String,
    /// 文件内容
    pub bytes: Vec<u8>,
}

impl MaterialRef {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// 从本地文件读取一份材料
    pub fn from_path(path: &str) -> AppResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| FileError::ReadFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Ok(Self { name, bytes })
    }

    /// 根据文件名扩展名推断 MIME 类型
    pub fn mime_type(&self) -> &'static str {
        extension_of(&self.name)
            .and_then(|ext| EXTENSION_MIME.get(ext.to_ascii_lowercase().as_str()))
            .copied()
            .unwrap_or("application/octet-stream")
    }
}

impl fmt::Debug for MaterialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 文件内容可能很大，Debug 输出只显示字节数
        f.debug_struct("MaterialRef")
            .field("name", &self.name)
            .field("bytes", &format!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// 搜索阶段的候选文档：下载结果加上产生它的搜索词
///
/// 只存在于检索流程内部，过滤完成后即被拆掉
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    pub material: MaterialRef,
    pub origin_query: String,
}

/// 搜索服务返回的一条结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: String,
}

/// 判断 URL 的路径后缀是否为支持的文档格式
pub fn supported_document_url(url: &str) -> bool {
    url_path(url)
        .rsplit('/')
        .next()
        .and_then(extension_of)
        .map(|ext| EXTENSION_MIME.contains_key(ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 从 URL 中提取文件名，供展示和过滤使用
pub fn file_name_from_url(url: &str) -> String {
    let segment = url_path(url).trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if segment.is_empty() {
        "downloaded_document".to_string()
    } else {
        segment.to_string()
    }
}

/// 去掉 URL 中的查询串和锚点
fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

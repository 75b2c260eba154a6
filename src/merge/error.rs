//! 合并流水线错误分类
//!
//! - [`Rejection`]：单文件级软失败，记入错误收集器，批次继续
//! - [`MergeError`]：批次级致命失败，整个请求终止且不产出文档

use thiserror::Error;

/// 单文件软失败原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("unsupported media type")]
    UnsupportedType { extension: String },

    #[error("empty file")]
    EmptyPayload,

    #[error("could not read document: {0}")]
    CorruptDocument(String),

    #[error("document is encrypted")]
    EncryptedDocument,

    #[error("document has zero pages")]
    ZeroPageDocument,

    #[error("image not detected or corrupted: {0}")]
    CorruptImage(String),

    #[error("could not encode image: {0}")]
    ImageEncode(String),
}

impl Rejection {
    /// 日志中使用的稳定类别名
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::UnsupportedType { .. } => "unsupported_type",
            Rejection::EmptyPayload => "empty_payload",
            Rejection::CorruptDocument(_) => "corrupt_document",
            Rejection::EncryptedDocument => "encrypted_document",
            Rejection::ZeroPageDocument => "zero_page_document",
            Rejection::CorruptImage(_) => "corrupt_image",
            Rejection::ImageEncode(_) => "image_encode",
        }
    }
}

/// 批次级致命错误
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Please select at least one file")]
    NoFilesSupplied,

    #[error("Exceeds total page limit: {max_pages}")]
    BudgetExceeded { max_pages: u32 },

    #[error("There are no valid pages to merge")]
    NoValidPages,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to assemble merged document: {0}")]
    Assembly(String),

    #[error("storage backend failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MergeError {
    /// 是否属于调用方输入问题（4xx），其余为服务端问题（5xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MergeError::NoFilesSupplied
                | MergeError::BudgetExceeded { .. }
                | MergeError::NoValidPages
                | MergeError::InvalidRequest(_)
        )
    }

    /// 日志中使用的稳定类别名
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::NoFilesSupplied => "no_files_supplied",
            MergeError::BudgetExceeded { .. } => "budget_exceeded",
            MergeError::NoValidPages => "no_valid_pages",
            MergeError::InvalidRequest(_) => "invalid_request",
            MergeError::Assembly(_) => "assembly",
            MergeError::Storage(_) => "storage",
            MergeError::Internal(_) => "internal",
        }
    }
}

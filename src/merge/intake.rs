//! 入口校验：按扩展名分类，拒绝不支持或空的文件，不中断批次

use super::error::Rejection;
use crate::model::InputItem;

/// 支持的扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// 已接收文件的媒体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image,
}

impl MediaKind {
    /// 由小写扩展名（不含点）推导类别
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(MediaKind::Pdf),
            "jpg" | "jpeg" | "png" => Some(MediaKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Pdf => "pdf",
            MediaKind::Image => "image",
        }
    }
}

/// 判断单个文件能否进入页面规范化阶段
///
/// 扩展名检查先于空文件检查。
pub fn validate(item: &InputItem) -> Result<MediaKind, Rejection> {
    let kind = MediaKind::from_extension(&item.extension).ok_or_else(|| {
        Rejection::UnsupportedType {
            extension: item.extension.clone(),
        }
    })?;

    if item.data.is_empty() {
        return Err(Rejection::EmptyPayload);
    }

    Ok(kind)
}

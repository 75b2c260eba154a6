//! 命名工具
//! 批次ID、对象键随机段以及用户文件名清洗

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// 批次ID长度（十六进制字符）
pub const BATCH_ID_LEN: usize = 12;
/// 对象键随机段长度（十六进制字符）
pub const KEY_SUFFIX_LEN: usize = 8;
/// 清洗后文件名的最大长度
pub const MAX_FILENAME_LEN: usize = 80;

const FALLBACK_FILENAME: &str = "file";

/// 生成批次ID：UUID v4 的前 12 位十六进制
pub fn generate_batch_id() -> String {
    random_hex(BATCH_ID_LEN)
}

/// 生成对象键中的随机段
pub fn generate_key_suffix() -> String {
    random_hex(KEY_SUFFIX_LEN)
}

fn random_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

/// 取路径最后一段，同时兼容 `/` 与 `\` 分隔符
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// 清洗用户提供的文件名
///
/// 去掉路径部分，把 `[A-Za-z0-9._-]` 之外的连续字符替换为单个 `_`，
/// 空结果回退为 `file`，最后截断到 80 个字符。结果只含 ASCII，
/// 因此按字节截断是安全的。
pub fn sanitize_filename(name: &str) -> String {
    static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();
    let unsafe_re =
        UNSAFE_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

    let safe = unsafe_re.replace_all(base_name(name), "_").into_owned();
    let mut safe = if safe.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        safe
    };
    safe.truncate(MAX_FILENAME_LEN);
    safe
}

/// 小写扩展名（不含点）；没有扩展名时返回空串
pub fn extension_of(name: &str) -> String {
    let base = base_name(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[idx + 1..].trim().to_ascii_lowercase(),
        _ => String::new(),
    }
}

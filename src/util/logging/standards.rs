//! Centralised logging metadata (event names, shared keys, etc.).

/// Canonical event names used across the service.
pub mod events {
    /// HTTP request lifecycle.
    pub const REQUEST_START: &str = "request.start";
    pub const REQUEST_COMPLETE: &str = "request.complete";
    pub const REQUEST_ERROR: &str = "request.error";
    pub const REQUEST_SLOW: &str = "request.slow";

    /// Merge request handling.
    pub const MERGE_RECEIVED: &str = "merge.received";
    pub const MERGE_REJECTED_REQUEST: &str = "merge.request_rejected";
    pub const MERGE_COMPLETE: &str = "merge.complete";
    pub const MERGE_FAILED: &str = "merge.failed";

    /// 单个文件在流水线中的进度。
    pub const MERGE_ITEM_READ: &str = "merge.item.read";
    pub const MERGE_ITEM_NORMALIZED: &str = "merge.item.normalized";
    pub const MERGE_ITEM_ADMITTED: &str = "merge.item.admitted";
    pub const MERGE_ITEM_REJECTED: &str = "merge.item.rejected";

    /// Batch level outcome.
    pub const MERGE_ABORTED: &str = "merge.aborted";
    pub const MERGE_TOTAL: &str = "merge.total";
    pub const MERGE_ASSEMBLED: &str = "merge.assembled";
    pub const MERGE_PUBLISHED: &str = "merge.published";

    /// Object storage.
    pub const STORAGE_INIT: &str = "storage.init";
    pub const STORAGE_PUT_FAILED: &str = "storage.put_failed";
    pub const STORAGE_PRESIGN_FAILED: &str = "storage.presign_failed";
}

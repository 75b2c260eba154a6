//! 合并流水线
//!
//! 每个批次严格按到达顺序处理：
//! 入口校验 → 页面规范化 → 页数预算 → 文档组装，错误收集器观察每个阶段。
//! 软失败只影响单个文件；预算超限等致命失败立即终止整批。
//!
//! 流水线本身是同步的 CPU 密集逻辑，HTTP 层在阻塞线程池中调用 [`run_batch`]。

pub mod assemble;
pub mod budget;
pub mod collector;
pub mod error;
pub mod intake;
pub mod normalize;
pub mod publish;

pub use assemble::DocumentAssembler;
pub use budget::{Admission, PageBudget};
pub use collector::ErrorCollector;
pub use error::{MergeError, Rejection};
pub use intake::MediaKind;
pub use normalize::NormalizedPages;
pub use publish::OutputPublisher;

use crate::model::{InputItem, ItemStatus, MergeOutput};
use crate::util::logging::standards::events;
use tracing::{info, warn};

/// 单个文件处理后的批次走向
#[derive(Debug)]
pub enum Outcome {
    Continue,
    Abort(MergeError),
}

/// 一个批次的可变处理状态
#[derive(Debug)]
pub struct MergeBatch {
    budget: PageBudget,
    assembler: DocumentAssembler,
    errors: ErrorCollector,
}

impl MergeBatch {
    pub fn new(max_pages: u32) -> Self {
        Self {
            budget: PageBudget::new(max_pages),
            assembler: DocumentAssembler::new(),
            errors: ErrorCollector::new(),
        }
    }

    /// 处理一个文件并更新其状态
    pub fn process(&mut self, item: &mut InputItem) -> Outcome {
        info!(
            event = events::MERGE_ITEM_READ,
            file = %item.name,
            bytes = item.data.len()
        );

        let kind = match intake::validate(item) {
            Ok(kind) => kind,
            Err(rejection) => {
                self.reject(item, rejection);
                return Outcome::Continue;
            }
        };
        let pages = match normalize::normalize(kind, &item.data) {
            Ok(pages) => pages,
            Err(rejection) => {
                self.reject(item, rejection);
                return Outcome::Continue;
            }
        };

        let incoming = pages.page_count;
        item.status = ItemStatus::Normalized { pages: incoming };
        info!(
            event = events::MERGE_ITEM_NORMALIZED,
            file = %item.name,
            kind = kind.as_str(),
            pages = incoming
        );

        match self.budget.admit(incoming) {
            Admission::Granted { consumed } => {
                self.assembler.append(pages);
                item.status = ItemStatus::Admitted { pages: incoming };
                info!(
                    event = events::MERGE_ITEM_ADMITTED,
                    file = %item.name,
                    added = incoming,
                    total = consumed,
                    max_pages = self.budget.max_pages()
                );
                Outcome::Continue
            }
            Admission::Exceeded {
                requested,
                max_pages,
            } => {
                warn!(
                    event = events::MERGE_ABORTED,
                    reason = "budget_exceeded",
                    file = %item.name,
                    requested,
                    max_pages
                );
                Outcome::Abort(MergeError::BudgetExceeded { max_pages })
            }
        }
    }

    fn reject(&mut self, item: &mut InputItem, rejection: Rejection) {
        warn!(
            event = events::MERGE_ITEM_REJECTED,
            file = %item.name,
            kind = rejection.kind(),
            reason = %rejection
        );
        self.errors.record(&item.name, &rejection);
        item.status = ItemStatus::Rejected(rejection);
    }

    /// 结束批次并序列化合并文档
    pub fn finish(self) -> Result<MergeOutput, MergeError> {
        let total_pages = self.budget.consumed();
        info!(event = events::MERGE_TOTAL, total_pages);

        let bytes = self.assembler.finish()?;
        info!(
            event = events::MERGE_ASSEMBLED,
            total_pages,
            bytes = bytes.len(),
            rejected = self.errors.rejected_count()
        );

        Ok(MergeOutput {
            bytes,
            total_pages,
            errors: self.errors.into_records(),
        })
    }
}

/// 按顺序处理整个批次
pub fn run_batch(items: &mut [InputItem], max_pages: u32) -> Result<MergeOutput, MergeError> {
    if items.is_empty() {
        return Err(MergeError::NoFilesSupplied);
    }

    let mut batch = MergeBatch::new(max_pages);
    for item in items.iter_mut() {
        if let Outcome::Abort(reason) = batch.process(item) {
            return Err(reason);
        }
    }
    batch.finish()
}

#[cfg(test)]
mod tests {
    use super::normalize::fixtures::{
        encrypted_pdf, jpeg, page_tags, pdf_with_pages, png_with_alpha,
    };
    use super::*;

    const MAX_PAGES: u32 = 10;

    #[test]
    fn test_three_single_page_documents() {
        let mut items = vec![
            InputItem::new("a.pdf", pdf_with_pages("a", 1)),
            InputItem::new("b.pdf", pdf_with_pages("b", 1)),
            InputItem::new("c.pdf", pdf_with_pages("c", 1)),
        ];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 3);
        assert!(output.errors.is_empty());
        assert_eq!(page_tags(&output.bytes), vec!["a-1", "b-1", "c-1"]);
        assert!(items
            .iter()
            .all(|item| item.status == ItemStatus::Admitted { pages: 1 }));
    }

    #[test]
    fn test_unsupported_file_is_recorded_and_batch_continues() {
        let mut items = vec![
            InputItem::new("notes.txt", b"hello".to_vec()),
            InputItem::new("doc.pdf", pdf_with_pages("d", 1)),
        ];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 1);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].file, "notes.txt");
        assert_eq!(output.errors[0].reason, "unsupported media type");
        assert!(items[0].status.is_rejected());
        assert!(items[1].status.is_accepted());
    }

    #[test]
    fn test_budget_exceeded_is_fatal() {
        let mut items = vec![
            InputItem::new("one.pdf", pdf_with_pages("x", 6)),
            InputItem::new("two.pdf", pdf_with_pages("y", 6)),
        ];
        let err = run_batch(&mut items, MAX_PAGES).unwrap_err();
        assert!(matches!(err, MergeError::BudgetExceeded { max_pages: 10 }));
        assert_eq!(items[0].status, ItemStatus::Admitted { pages: 6 });
        assert_eq!(items[1].status, ItemStatus::Normalized { pages: 6 });
    }

    #[test]
    fn test_budget_abort_stops_processing_later_items() {
        let mut items = vec![
            InputItem::new("big.pdf", pdf_with_pages("x", 11)),
            InputItem::new("later.txt", b"x".to_vec()),
        ];
        assert!(matches!(
            run_batch(&mut items, MAX_PAGES),
            Err(MergeError::BudgetExceeded { .. })
        ));
        assert_eq!(items[1].status, ItemStatus::Received);
    }

    #[test]
    fn test_multi_page_document_counts_once() {
        let mut items = vec![
            InputItem::new("five.pdf", pdf_with_pages("f", 5)),
            InputItem::new("four.pdf", pdf_with_pages("g", 4)),
            InputItem::new("pic.jpg", jpeg(16, 16)),
        ];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 10);
    }

    #[test]
    fn test_empty_batch_is_fatal() {
        assert!(matches!(
            run_batch(&mut [], MAX_PAGES),
            Err(MergeError::NoFilesSupplied)
        ));
    }

    #[test]
    fn test_all_rejected_yields_no_valid_pages() {
        let mut items = vec![
            InputItem::new("a.txt", b"x".to_vec()),
            InputItem::new("b.pdf", Vec::new()),
            InputItem::new("c.png", b"not an image".to_vec()),
        ];
        assert!(matches!(
            run_batch(&mut items, MAX_PAGES),
            Err(MergeError::NoValidPages)
        ));
        assert!(items.iter().all(|item| item.status.is_rejected()));
    }

    #[test]
    fn test_mixed_images_and_documents_keep_order() {
        let mut items = vec![
            InputItem::new("first.pdf", pdf_with_pages("p", 2)),
            InputItem::new("logo.png", png_with_alpha(8, 8)),
            InputItem::new("broken.pdf", b"garbage".to_vec()),
            InputItem::new("last.pdf", pdf_with_pages("q", 1)),
        ];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 4);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].file, "broken.pdf");

        // 图片页没有文本标记
        assert_eq!(page_tags(&output.bytes), vec!["p-1", "p-2", "", "q-1"]);
    }

    #[test]
    fn test_owner_password_only_pdf_is_merged() {
        let mut items = vec![InputItem::new(
            "statement.pdf",
            encrypted_pdf("enc", 1, None, false),
        )];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 1);
        assert!(output.errors.is_empty());
        assert_eq!(page_tags(&output.bytes), vec!["enc-1"]);
    }

    #[test]
    fn test_password_protected_pdf_is_skipped() {
        let mut items = vec![
            InputItem::new(
                "locked.pdf",
                encrypted_pdf("locked", 1, Some(vec![0x11_u8; 32]), false),
            ),
            InputItem::new("open.pdf", pdf_with_pages("o", 1)),
        ];
        let output = run_batch(&mut items, MAX_PAGES).unwrap();
        assert_eq!(output.total_pages, 1);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].file, "locked.pdf");
        assert_eq!(output.errors[0].reason, "document is encrypted");
        assert_eq!(
            items[0].status,
            ItemStatus::Rejected(Rejection::EncryptedDocument)
        );
        assert_eq!(page_tags(&output.bytes), vec!["o-1"]);
    }
}

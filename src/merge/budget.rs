//! 页数预算：跨批次累计页数，超出上限即整批失败

/// 页数预算
///
/// 不变式：成功返回的结果中 `consumed <= max_pages`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBudget {
    consumed: u32,
    max_pages: u32,
}

/// 预算检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 已计入预算，页面可以交给组装器
    Granted { consumed: u32 },
    /// 会超出上限，整批终止
    Exceeded { requested: u32, max_pages: u32 },
}

impl PageBudget {
    pub fn new(max_pages: u32) -> Self {
        Self {
            consumed: 0,
            max_pages,
        }
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// 每个文件调用一次，按该文件的页数整体计入
    pub fn admit(&mut self, incoming_pages: u32) -> Admission {
        let requested = self.consumed.saturating_add(incoming_pages);
        if requested > self.max_pages {
            return Admission::Exceeded {
                requested,
                max_pages: self.max_pages,
            };
        }
        self.consumed = requested;
        Admission::Granted {
            consumed: self.consumed,
        }
    }
}

//! 文档组装：按接收顺序追加页面，最终序列化为单个 PDF 字节流

use lopdf::{dictionary, Document, Object, ObjectId};
use std::collections::BTreeSet;

use super::error::MergeError;
use super::normalize::NormalizedPages;

/// 源文档中不迁移到合并文档的结构节点
const DROPPED_NODE_TYPES: [&[u8]; 4] = [b"Catalog", b"Pages", b"Outlines", b"Outline"];

/// 只追加的合并文档
///
/// 所有中间对象归本实例所有，`finish` 消费自身，
/// 任何退出路径（包括提前终止）都会随 drop 释放。
#[derive(Debug)]
pub struct DocumentAssembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    page_count: u32,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            page_count: 0,
        }
    }

    /// 追加一个文件的全部页面，返回追加的页数
    ///
    /// 源文档先整体重编号到当前最大对象号之后，再把非页树对象迁入，
    /// 页面挂到唯一的根 Pages 节点下，顺序与源页树一致。
    pub fn append(&mut self, pages: NormalizedPages) -> u32 {
        let NormalizedPages { mut document, .. } = pages;

        document.renumber_objects_with(self.document.max_id + 1);
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        let page_set: BTreeSet<ObjectId> = page_ids.iter().copied().collect();

        for (id, object) in std::mem::take(&mut document.objects) {
            let dropped = !page_set.contains(&id)
                && object
                    .type_name()
                    .map(|name| DROPPED_NODE_TYPES.contains(&name))
                    .unwrap_or(false);
            if !dropped {
                self.document.objects.insert(id, object);
            }
        }
        self.document.max_id = self.document.max_id.max(document.max_id);

        let mut appended = 0;
        for page_id in page_ids {
            let Ok(page) = self
                .document
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
            else {
                continue;
            };
            page.set("Parent", self.pages_id);
            self.kids.push(Object::Reference(page_id));
            appended += 1;
        }

        self.page_count += appended;
        appended
    }

    /// 写入目录与页树，序列化为字节流
    ///
    /// 没有任何页面时返回 [`MergeError::NoValidPages`]。
    pub fn finish(mut self) -> Result<Vec<u8>, MergeError> {
        if self.page_count == 0 {
            return Err(MergeError::NoValidPages);
        }

        let kids = std::mem::take(&mut self.kids);
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(self.page_count),
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        self.document.prune_objects();
        self.document.renumber_objects();
        self.document.compress();

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| MergeError::Assembly(e.to_string()))?;
        Ok(bytes)
    }
}

//! 单道题目的求解上下文
//!
//! 每道题目新建一个，提交后丢弃，不在链路之间共享。

use crate::models::resource::ImagePayload;
use crate::models::table::Table;
use crate::utils::truncate_text;

/// 一个带标题的文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    pub label: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    fragments: Vec<TextFragment>,
    /// 按页面资源顺序保存的表格，键为资源地址
    tabular_cache: Vec<(String, Table)>,
    images: Vec<ImagePayload>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fragment(&mut self, label: impl Into<String>, body: impl Into<String>) {
        self.fragments.push(TextFragment {
            label: label.into(),
            body: body.into(),
        });
    }

    /// 缓存解码成功的表格，同一地址只保留最后一次
    pub fn cache_table(&mut self, url: impl Into<String>, table: Table) {
        let url = url.into();
        match self.tabular_cache.iter_mut().find(|(key, _)| *key == url) {
            Some(entry) => entry.1 = table,
            None => self.tabular_cache.push((url, table)),
        }
    }

    pub fn push_image(&mut self, image: ImagePayload) {
        self.images.push(image);
    }

    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    pub fn table(&self, url: &str) -> Option<&Table> {
        self.tabular_cache
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, table)| table)
    }

    /// 按资源顺序返回所有表格
    pub fn tables(&self) -> Vec<&Table> {
        self.tabular_cache.iter().map(|(_, table)| table).collect()
    }

    pub fn images(&self) -> &[ImagePayload] {
        &self.images
    }

    /// 拼接所有片段，超过 `max_chars` 时截掉尾部
    pub fn assembled_text(&self, max_chars: usize) -> String {
        let joined = self
            .fragments
            .iter()
            .map(|f| {
                if f.body.is_empty() {
                    f.label.clone()
                } else {
                    format!("{}\n{}", f.label, f.body)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        truncate_text(&joined, max_chars)
    }
}

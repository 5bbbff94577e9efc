use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde_json::Value as JsonValue;

use crate::models::table::Table;

/// 资源的逻辑格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFormat {
    /// csv / tsv 等分隔文本
    Tabular,
    /// xlsx / xls
    Spreadsheet,
    /// pdf
    Document,
    /// json
    StructuredData,
    Image,
    /// html
    Markup,
    PlainText,
    UnknownBinary,
}

impl ResourceFormat {
    /// 上下文片段标题中使用的名称
    pub fn label(self) -> &'static str {
        match self {
            ResourceFormat::Tabular => "CSV",
            ResourceFormat::Spreadsheet => "Excel",
            ResourceFormat::Document => "PDF",
            ResourceFormat::StructuredData => "JSON",
            ResourceFormat::Image => "Image",
            ResourceFormat::Markup => "HTML",
            ResourceFormat::PlainText => "Text",
            ResourceFormat::UnknownBinary => "Binary",
        }
    }
}

/// 可以转发给视觉模型的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// 解码后的图片
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// png / jpeg / gif / webp ...
    pub format: String,
    pub payload: ImagePayload,
}

impl DecodedImage {
    pub fn data_uri(&self) -> String {
        self.payload.data_uri()
    }
}

/// PDF 中识别出的表格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTable {
    /// 从 1 开始的页码
    pub page: usize,
    pub rows: Vec<Vec<String>>,
}

/// PDF 解码结果
#[derive(Debug, Clone, Default)]
pub struct DocumentText {
    pub pages: Vec<String>,
    pub tables: Vec<DocumentTable>,
}

impl DocumentText {
    /// 拼接所有页面文本，页与页之间插入分页标记
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            text.push_str(&format!("\n--- Page {} ---\n{}", i + 1, page));
        }
        text
    }
}

/// 单个资源的解码结果
#[derive(Debug, Clone)]
pub enum DecodedResource {
    Tabular(Table),
    DocumentText(DocumentText),
    StructuredData(JsonValue),
    Image(DecodedImage),
    PlainText(String),
    /// 解码失败，不会中断整个流程
    Error(String),
}

impl DecodedResource {
    pub fn is_error(&self) -> bool {
        matches!(self, DecodedResource::Error(_))
    }
}

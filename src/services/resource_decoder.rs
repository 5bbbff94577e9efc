/// 资源解码服务
///
/// 按识别出的格式把原始字节转换为结构化数据。
/// 单个资源解码失败（包括解析库 panic）只会得到 `DecodedResource::Error`。
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use image::ImageFormat;
use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::models::{
    DecodedImage, DecodedResource, DocumentTable, DocumentText, ImagePayload, ResourceFormat,
    Table,
};

/// html2text 的折行宽度，足够大以免把长行拆开
const MARKUP_WRAP_WIDTH: usize = 10_000;

static CELL_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}|\t|\|").expect("valid regex"));

/// 按格式解码，任何失败都转换为 `Error` 片段
pub fn decode(format: ResourceFormat, bytes: &[u8]) -> DecodedResource {
    let result = panic::catch_unwind(AssertUnwindSafe(|| decode_as(format, bytes)));
    match result {
        Ok(Ok(decoded)) => decoded,
        Ok(Err(e)) => {
            warn!("⚠️ 资源解码失败 ({}): {}", format.label(), e);
            DecodedResource::Error(e.to_string())
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("⚠️ 解码器 panic ({}): {}", format.label(), message);
            DecodedResource::Error(DecodeError::Panicked(message).to_string())
        }
    }
}

fn decode_as(format: ResourceFormat, bytes: &[u8]) -> Result<DecodedResource, DecodeError> {
    let decoded = match format {
        ResourceFormat::Tabular => DecodedResource::Tabular(decode_tabular(bytes)?),
        ResourceFormat::Spreadsheet => DecodedResource::Tabular(decode_spreadsheet(bytes, None)?),
        ResourceFormat::Document => DecodedResource::DocumentText(decode_document(bytes)?),
        ResourceFormat::StructuredData => DecodedResource::StructuredData(decode_structured(bytes)?),
        ResourceFormat::Image => DecodedResource::Image(decode_image(bytes)?),
        ResourceFormat::Markup => DecodedResource::PlainText(markup_to_text(&decode_text(bytes))),
        ResourceFormat::PlainText | ResourceFormat::UnknownBinary => {
            DecodedResource::PlainText(decode_text(bytes))
        }
    };
    Ok(decoded)
}

/// 解析分隔文本
///
/// 默认逗号；表头含制表符且没有逗号时用制表符，含分号且没有逗号时用分号
pub fn decode_tabular(bytes: &[u8]) -> Result<Table, DecodeError> {
    let text = decode_text(bytes);
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let header = text.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(header);
    debug!("CSV 分隔符: {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| DecodeError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DecodeError::Csv(e.to_string()))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    Ok(Table::new(columns, rows))
}

fn detect_delimiter(header: &str) -> u8 {
    if header.contains(',') {
        b','
    } else if header.contains('\t') {
        b'\t'
    } else if header.contains(';') {
        b';'
    } else {
        b','
    }
}

/// 解析 Excel 工作簿
///
/// # 参数
/// - `sheet`: 工作表名称，`None` 表示第一个工作表
pub fn decode_spreadsheet(bytes: &[u8], sheet: Option<&str>) -> Result<Table, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DecodeError::Spreadsheet(e.to_string()))?;

    let range = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(DecodeError::SheetNotFound(name.to_string()));
            }
            workbook
                .worksheet_range(name)
                .map_err(|e| DecodeError::Spreadsheet(e.to_string()))?
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DecodeError::Spreadsheet("工作簿中没有工作表".to_string()))?
            .map_err(|e| DecodeError::Spreadsheet(e.to_string()))?,
    };

    let mut rows = range.rows().map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());
    let columns = rows.next().unwrap_or_default();
    Ok(Table::new(columns, rows.collect()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// 提取 PDF 每页文本，并尝试识别其中的表格
pub fn decode_document(bytes: &[u8]) -> Result<DocumentText, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let doc = Document::load_mem(bytes).map_err(|e| DecodeError::Pdf(e.to_string()))?;

    let mut document = DocumentText::default();
    for (index, page_number) in doc.get_pages().keys().enumerate() {
        let text = match doc.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!("第 {} 页文本提取失败: {}", page_number, e);
                String::new()
            }
        };
        document.tables.extend(detect_tables(index + 1, &text));
        document.pages.push(text);
    }

    debug!(
        "PDF 解码完成: {} 页, {} 个表格",
        document.pages.len(),
        document.tables.len()
    );
    Ok(document)
}

/// 连续两行以上、列数一致（至少两列）的文本块视为表格
fn detect_tables(page: usize, text: &str) -> Vec<DocumentTable> {
    let mut tables = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();

    let mut flush = |block: &mut Vec<Vec<String>>| {
        if block.len() >= 2 {
            tables.push(DocumentTable {
                page,
                rows: std::mem::take(block),
            });
        } else {
            block.clear();
        }
    };

    for line in text.lines() {
        let cells: Vec<String> = CELL_SEPARATOR
            .split(line.trim())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if cells.len() < 2 {
            flush(&mut block);
            continue;
        }
        if block.first().is_some_and(|first| first.len() != cells.len()) {
            flush(&mut block);
        }
        block.push(cells);
    }
    flush(&mut block);

    tables
}

/// 解析 JSON
pub fn decode_structured(bytes: &[u8]) -> Result<JsonValue, DecodeError> {
    let text = decode_text(bytes);
    if text.trim().is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| DecodeError::Json(e.to_string()))
}

/// 解码图片并重新编码，无法按原格式编码时改用 PNG
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let format = image::guess_format(bytes).map_err(|e| DecodeError::Image(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::Image(e.to_string()))?;

    let mut encoded = Vec::new();
    let format = match img.write_to(&mut Cursor::new(&mut encoded), format) {
        Ok(()) => format,
        Err(e) => {
            debug!("按原格式重新编码失败，改用 PNG: {}", e);
            encoded.clear();
            img.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
                .map_err(|e| DecodeError::Image(e.to_string()))?;
            ImageFormat::Png
        }
    };

    let name = format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("png")
        .to_string();

    Ok(DecodedImage {
        width: img.width(),
        height: img.height(),
        format: name,
        payload: ImagePayload::new(format.to_mime_type(), encoded),
    })
}

/// HTML 转纯文本：由 html2text 处理标签和实体，再合并空白
pub fn markup_to_text(html: &str) -> String {
    let text = html2text::from_read(Cursor::new(html.as_bytes()), MARKUP_WRAP_WIDTH)
        .unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// UTF-8 解码，失败时按单字节（latin-1）解码，永不失败
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

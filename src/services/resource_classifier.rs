/// 资源类型识别
///
/// 依次参考 URL 扩展名、Content-Type、文件头和文本特征，总能给出一个结果
use phf::phf_map;
use url::Url;

use crate::models::ResourceFormat;

static EXTENSION_FORMATS: phf::Map<&'static str, ResourceFormat> = phf_map! {
    "csv" => ResourceFormat::Tabular,
    "tsv" => ResourceFormat::Tabular,
    "xlsx" => ResourceFormat::Spreadsheet,
    "xls" => ResourceFormat::Spreadsheet,
    "pdf" => ResourceFormat::Document,
    "json" => ResourceFormat::StructuredData,
    "png" => ResourceFormat::Image,
    "jpg" => ResourceFormat::Image,
    "jpeg" => ResourceFormat::Image,
    "gif" => ResourceFormat::Image,
    "webp" => ResourceFormat::Image,
    "html" => ResourceFormat::Markup,
    "htm" => ResourceFormat::Markup,
    "txt" => ResourceFormat::PlainText,
};

/// Content-Type 关键字，顺序有意义（`text/csv` 要先于 `text`）
const CONTENT_TYPE_FORMATS: &[(&str, ResourceFormat)] = &[
    ("pdf", ResourceFormat::Document),
    ("csv", ResourceFormat::Tabular),
    ("excel", ResourceFormat::Spreadsheet),
    ("spreadsheet", ResourceFormat::Spreadsheet),
    ("json", ResourceFormat::StructuredData),
    ("image", ResourceFormat::Image),
    ("html", ResourceFormat::Markup),
    ("text", ResourceFormat::PlainText),
];

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G'];

/// 识别资源格式
///
/// # 参数
/// - `bytes`: 原始内容
/// - `content_type`: 服务端声明的类型，可以为空
/// - `url`: 资源地址
pub fn classify(bytes: &[u8], content_type: &str, url: &str) -> ResourceFormat {
    by_extension(url)
        .or_else(|| by_content_type(content_type))
        .or_else(|| by_signature(bytes))
        .unwrap_or_else(|| by_text_shape(bytes))
}

fn by_extension(url: &str) -> Option<ResourceFormat> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let (_, ext) = path.rsplit('/').next()?.rsplit_once('.')?;
    EXTENSION_FORMATS.get(ext.to_ascii_lowercase().as_str()).copied()
}

fn by_content_type(content_type: &str) -> Option<ResourceFormat> {
    let lowered = content_type.to_ascii_lowercase();
    CONTENT_TYPE_FORMATS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, format)| *format)
}

fn by_signature(bytes: &[u8]) -> Option<ResourceFormat> {
    if bytes.starts_with(b"%PDF") {
        Some(ResourceFormat::Document)
    } else if bytes.starts_with(b"PK") {
        // xlsx 是 zip 容器
        Some(ResourceFormat::Spreadsheet)
    } else if bytes.starts_with(PNG_SIGNATURE)
        || bytes.starts_with(&[0xFF, 0xD8])
        || bytes.starts_with(b"GIF8")
    {
        Some(ResourceFormat::Image)
    } else {
        None
    }
}

fn by_text_shape(bytes: &[u8]) -> ResourceFormat {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ResourceFormat::UnknownBinary;
    };
    let trimmed = text.trim_start();
    let lowered = trimmed.to_ascii_lowercase();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        ResourceFormat::StructuredData
    } else if text.contains(',') && text.contains('\n') {
        ResourceFormat::Tabular
    } else if lowered.contains("<html") || lowered.contains("<!doctype") {
        ResourceFormat::Markup
    } else {
        ResourceFormat::PlainText
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_wins_over_content_type() {
        let bytes = b",,\n1,2\n";
        let format = classify(bytes, "application/octet-stream", "https://q.example.com/data.csv");
        assert_eq!(format, ResourceFormat::Tabular);
    }

    #[test]
    fn test_extension_ignores_query_and_case() {
        assert_eq!(
            classify(b"", "", "https://q.example.com/Report.PDF?download=1"),
            ResourceFormat::Document
        );
    }

    #[test]
    fn test_content_type_when_extension_missing() {
        assert_eq!(
            classify(b"a;b", "text/csv; charset=utf-8", "https://q.example.com/api/data"),
            ResourceFormat::Tabular
        );
        assert_eq!(
            classify(b"{}", "application/json", "https://q.example.com/api/data"),
            ResourceFormat::StructuredData
        );
    }

    #[test]
    fn test_signature_sniffing() {
        let url = "https://q.example.com/blob";
        assert_eq!(classify(b"%PDF-1.7", "", url), ResourceFormat::Document);
        assert_eq!(classify(b"PK\x03\x04", "", url), ResourceFormat::Spreadsheet);
        assert_eq!(
            classify(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A], "", url),
            ResourceFormat::Image
        );
        assert_eq!(classify(&[0xFF, 0xD8, 0xFF], "", url), ResourceFormat::Image);
    }

    #[test]
    fn test_text_heuristics() {
        let url = "https://q.example.com/blob";
        assert_eq!(classify(b"  [1, 2]", "", url), ResourceFormat::StructuredData);
        assert_eq!(classify(b"a,b\n1,2", "", url), ResourceFormat::Tabular);
        assert_eq!(
            classify(b"<!DOCTYPE html><p>hi</p>", "", url),
            ResourceFormat::Markup
        );
        assert_eq!(classify(b"just words", "", url), ResourceFormat::PlainText);
        assert_eq!(classify(&[0xC3, 0x28, 0x00], "", url), ResourceFormat::UnknownBinary);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let cases: [(&[u8], &str, &str); 3] = [
            (b"x,y\n", "", "https://q.example.com/a"),
            (b"\x00\x01", "application/octet-stream", "https://q.example.com/b"),
            (b"{\"k\":1}", "text/plain", "https://q.example.com/c.json"),
        ];
        for (bytes, ct, url) in cases {
            assert_eq!(classify(bytes, ct, url), classify(bytes, ct, url));
        }
    }
}

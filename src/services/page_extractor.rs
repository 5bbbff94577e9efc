//! 页面解析服务
//!
//! 从渲染后的文本和 HTML 中找出题目、提交地址和引用的资源
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::{ChallengePage, ResourceKind, ResourceRef};

/// 视为可下载文件的扩展名
const FILE_EXTENSIONS: &[&str] = &[
    "pdf", "csv", "tsv", "xlsx", "xls", "json", "txt", "png", "jpg", "jpeg", "gif", "webp",
];

/// 提交地址的匹配规则，按顺序尝试，第一个命中的生效
static SUBMIT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)(?:post|submit|send)\s+(?:your\s+|the\s+)?(?:answer\s+)?to\s+[`"']?(https?://[^\s<>"'`]+)"#,
        r#"(?i)\bPOST\b[^\n]{0,80}?\bto\s+[`"']?(https?://[^\s<>"'`]+)"#,
        r#"(https?://[^\s<>"'`]+/submit[^\s<>"'`]*)"#,
        r#"(https?://[^\s<>"'`]+/answer[^\s<>"'`]*)"#,
        r#"(?i)endpoint[:\s]+[`"']?(https?://[^\s<>"'`]+)"#,
        r#"(?i)action\s*=\s*["']?(https?://[^\s<>"'`]+)"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`)\]]+"#).expect("valid regex"));

/// 页面解析器
pub struct PageExtractor {
    /// 是否把同站的普通链接也当作资源
    include_links: bool,
}

impl PageExtractor {
    pub fn new(include_links: bool) -> Self {
        Self { include_links }
    }

    /// 解析一个题目页面
    ///
    /// # 参数
    /// - `text`: 页面可见文本
    /// - `html`: 页面完整 HTML
    /// - `base_url`: 页面地址，用于解析相对链接
    ///
    /// # 返回
    /// 返回 `ChallengePage`，找不到提交地址时其 `submission_url` 为空
    pub fn extract(&self, text: &str, html: &str, base_url: &str) -> ChallengePage {
        let base = Url::parse(base_url).ok();
        let submission_url = find_submission_url(text, html).unwrap_or_default();
        let resources = self.discover_resources(text, html, base.as_ref(), &submission_url);

        debug!(
            "页面解析: 提交地址 {:?}, 资源 {} 个",
            submission_url,
            resources.len()
        );

        ChallengePage::new(
            text.to_string(),
            submission_url,
            resources,
            base_url.to_string(),
        )
    }

    fn discover_resources(
        &self,
        text: &str,
        html: &str,
        base: Option<&Url>,
        submission_url: &str,
    ) -> Vec<ResourceRef> {
        let mut collector = ResourceCollector::new(normalize(submission_url, None));

        // 1. <a href> 指向文件
        let hrefs = anchor_hrefs(html);
        for href in &hrefs {
            if let Some(url) = normalize(href, base) {
                if has_file_extension(&url) {
                    collector.push(url, ResourceKind::File);
                }
            }
        }

        // 2. 正文中直接出现的文件地址
        for url in bare_urls(text) {
            if has_file_extension(&url) {
                collector.push(url, ResourceKind::File);
            }
        }

        // 3. 文本或 HTML 中的 /api/ 地址
        for url in bare_urls(text).chain(bare_urls(html)) {
            if url.path().contains("/api/") {
                collector.push(url, ResourceKind::Api);
            }
        }

        if self.include_links {
            if let Some(base) = base {
                for href in &hrefs {
                    if let Some(url) = normalize(href, Some(base)) {
                        if url.host_str() == base.host_str() && url.path() != base.path() {
                            collector.push(url, ResourceKind::Link);
                        }
                    }
                }
            }
        }

        collector.into_refs()
    }
}

/// 按规则顺序查找提交地址，先搜文本再搜 HTML
pub fn find_submission_url(text: &str, html: &str) -> Option<String> {
    for source in [text, html] {
        for pattern in SUBMIT_PATTERNS.iter() {
            if let Some(m) = pattern.captures(source).and_then(|c| c.get(1)) {
                let url = strip_trailing_punctuation(m.as_str());
                if !url.is_empty() {
                    return Some(url.to_string());
                }
            }
        }
    }
    None
}

/// 所有 `<a href>` 的值，属性中的实体已解码，引号可有可无
fn anchor_hrefs(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

fn strip_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', ')', '!', '?'])
}

/// 解析为绝对地址并去掉片段，只接受 http(s)
fn normalize(raw: &str, base: Option<&Url>) -> Option<Url> {
    if raw.is_empty() {
        return None;
    }
    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn bare_urls(source: &str) -> impl Iterator<Item = Url> + '_ {
    BARE_URL
        .find_iter(source)
        .filter_map(|m| normalize(strip_trailing_punctuation(m.as_str()), None))
}

fn has_file_extension(url: &Url) -> bool {
    url.path()
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 去重收集器：首次出现的地址生效，提交地址永不入选
struct ResourceCollector {
    excluded: Option<String>,
    seen: HashSet<String>,
    refs: Vec<ResourceRef>,
}

impl ResourceCollector {
    fn new(excluded: Option<Url>) -> Self {
        Self {
            excluded: excluded.map(|u| u.to_string()),
            seen: HashSet::new(),
            refs: Vec::new(),
        }
    }

    fn push(&mut self, url: Url, kind: ResourceKind) {
        let key = url.to_string();
        if self.excluded.as_deref() == Some(key.as_str()) {
            return;
        }
        if self.seen.insert(key.clone()) {
            self.refs.push(ResourceRef::new(key, kind));
        }
    }

    fn into_refs(self) -> Vec<ResourceRef> {
        self.refs
    }
}

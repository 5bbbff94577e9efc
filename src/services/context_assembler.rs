/// 上下文组装服务
///
/// 并发下载页面引用的资源，按页面顺序识别、解码并拼成上下文
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::ResourceFetcher;
use crate::models::{DecodedResource, DocumentText, ResolutionContext, ResourceFormat, ResourceRef};
use crate::services::{resource_classifier, resource_decoder};
use crate::utils::truncate_text;

pub struct ContextAssembler {
    fetcher: Arc<dyn ResourceFetcher>,
    max_text_fragment_chars: usize,
    max_table_rows: usize,
}

impl ContextAssembler {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        max_text_fragment_chars: usize,
        max_table_rows: usize,
    ) -> Self {
        Self {
            fetcher,
            max_text_fragment_chars,
            max_table_rows,
        }
    }

    /// 处理所有资源，单个资源失败只会留下一条错误片段
    pub async fn assemble(&self, resources: &[ResourceRef]) -> ResolutionContext {
        let mut ctx = ResolutionContext::new();
        if resources.is_empty() {
            return ctx;
        }

        info!("📦 处理 {} 个资源...", resources.len());

        // join_all 保持输入顺序
        let results = join_all(resources.iter().map(|r| self.fetch_and_decode(r))).await;

        for (resource, result) in resources.iter().zip(results) {
            match result {
                Ok((format, decoded)) => self.append(&mut ctx, &resource.url, format, decoded),
                Err(e) => {
                    warn!("⚠️ 资源下载失败 {}: {}", resource.url, e);
                    ctx.push_fragment(format!("=== Error fetching {}: {} ===", resource.url, e), "");
                }
            }
        }

        debug!(
            "上下文组装完成: {} 个片段, {} 张表格, {} 张图片",
            ctx.fragments().len(),
            ctx.tables().len(),
            ctx.images().len()
        );
        ctx
    }

    async fn fetch_and_decode(
        &self,
        resource: &ResourceRef,
    ) -> AppResult<(ResourceFormat, DecodedResource)> {
        let fetched = self.fetcher.fetch(&resource.url).await?;
        let format =
            resource_classifier::classify(&fetched.bytes, &fetched.content_type, &resource.url);
        debug!("{} → {:?} ({} 字节)", resource.url, format, fetched.bytes.len());
        Ok((format, resource_decoder::decode(format, &fetched.bytes)))
    }

    fn append(
        &self,
        ctx: &mut ResolutionContext,
        url: &str,
        format: ResourceFormat,
        decoded: DecodedResource,
    ) {
        let label = format!("=== {} from {} ===", format.label(), url);
        match decoded {
            DecodedResource::Tabular(table) => {
                ctx.push_fragment(label, table.to_context(self.max_table_rows));
                ctx.cache_table(url, table);
            }
            DecodedResource::DocumentText(doc) => {
                ctx.push_fragment(label, self.document_body(&doc));
            }
            DecodedResource::StructuredData(value) => {
                let body = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                ctx.push_fragment(label, truncate_text(&body, self.max_text_fragment_chars));
            }
            DecodedResource::Image(image) => {
                ctx.push_fragment(
                    label,
                    format!("Image: {}x{} {}", image.width, image.height, image.format),
                );
                ctx.push_image(image.payload);
            }
            DecodedResource::PlainText(text) => {
                ctx.push_fragment(label, truncate_text(&text, self.max_text_fragment_chars));
            }
            DecodedResource::Error(cause) => {
                ctx.push_fragment(format!("=== Error decoding {} from {} ===", format.label(), url), cause);
            }
        }
    }

    fn document_body(&self, doc: &DocumentText) -> String {
        let mut body = truncate_text(&doc.full_text(), self.max_text_fragment_chars);
        for (i, table) in doc.tables.iter().enumerate() {
            body.push_str(&format!("\n\nTable {} (page {}):\n", i + 1, table.page));
            for row in table.rows.iter().take(self.max_table_rows) {
                body.push_str(&row.join(" | "));
                body.push('\n');
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, TransportError};
    use crate::infrastructure::FetchedResource;
    use crate::models::ResourceKind;

    /// 内存中的资源表，可以为每个地址设置延迟
    struct MapFetcher {
        entries: HashMap<String, (Vec<u8>, String, u64)>,
    }

    #[async_trait]
    impl ResourceFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> AppResult<FetchedResource> {
            match self.entries.get(url) {
                Some((bytes, content_type, delay)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    Ok(FetchedResource {
                        bytes: bytes.clone(),
                        content_type: content_type.clone(),
                    })
                }
                None => Err(AppError::Transport(TransportError::Fetch {
                    url: url.to_string(),
                    message: "HTTP 404".to_string(),
                })),
            }
        }
    }

    fn fetcher(entries: &[(&str, &[u8], &str, u64)]) -> Arc<MapFetcher> {
        Arc::new(MapFetcher {
            entries: entries
                .iter()
                .map(|(url, bytes, ct, delay)| (url.to_string(), (bytes.to_vec(), ct.to_string(), *delay)))
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_fragments_follow_page_order() {
        let fetcher = fetcher(&[
            // 第一个资源最慢，但仍然排在最前面
            ("https://q.example.com/a.csv", b"Name,Revenue\nx,10\n".as_slice(), "application/octet-stream", 30),
            ("https://q.example.com/api/info", br#"{"k": 1}"#.as_slice(), "application/json", 0),
            ("https://q.example.com/notes.txt", b"plain notes".as_slice(), "text/plain", 10),
        ]);
        let assembler = ContextAssembler::new(fetcher, 1000, 100);
        let resources = vec![
            ResourceRef::new("https://q.example.com/a.csv", ResourceKind::File),
            ResourceRef::new("https://q.example.com/api/info", ResourceKind::Api),
            ResourceRef::new("https://q.example.com/missing.pdf", ResourceKind::File),
            ResourceRef::new("https://q.example.com/notes.txt", ResourceKind::File),
        ];

        let ctx = assembler.assemble(&resources).await;
        let labels: Vec<&str> = ctx.fragments().iter().map(|f| f.label.as_str()).collect();

        assert_eq!(labels[0], "=== CSV from https://q.example.com/a.csv ===");
        assert_eq!(labels[1], "=== JSON from https://q.example.com/api/info ===");
        assert!(labels[2].starts_with("=== Error fetching https://q.example.com/missing.pdf"));
        assert_eq!(labels[3], "=== Text from https://q.example.com/notes.txt ===");

        assert_eq!(ctx.tables().len(), 1);
        assert!(ctx.table("https://q.example.com/a.csv").is_some());
        assert!(ctx.fragments()[0].body.contains("Shape: 1 rows, 2 columns"));
    }

    #[tokio::test]
    async fn test_bad_resource_does_not_stop_others() {
        let fetcher = fetcher(&[
            ("https://q.example.com/broken.pdf", b"%PDF-not really".as_slice(), "application/pdf", 0),
            ("https://q.example.com/data.csv", b"v\n1\n2\n".as_slice(), "text/csv", 0),
        ]);
        let assembler = ContextAssembler::new(fetcher, 1000, 100);
        let resources = vec![
            ResourceRef::new("https://q.example.com/broken.pdf", ResourceKind::File),
            ResourceRef::new("https://q.example.com/data.csv", ResourceKind::File),
        ];

        let ctx = assembler.assemble(&resources).await;

        assert!(ctx.fragments()[0].label.starts_with("=== Error decoding PDF"));
        assert_eq!(ctx.tables().len(), 1);
    }

    #[tokio::test]
    async fn test_images_are_collected() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 255]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let fetcher = fetcher(&[("https://q.example.com/pic", png.as_slice(), "image/png", 0)]);
        let assembler = ContextAssembler::new(fetcher, 1000, 100);
        let ctx = assembler
            .assemble(&[ResourceRef::new("https://q.example.com/pic", ResourceKind::Api)])
            .await;

        assert_eq!(ctx.images().len(), 1);
        assert_eq!(ctx.fragments()[0].body, "Image: 2x2 png");
    }
}

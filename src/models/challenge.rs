use serde::Serialize;

/// 资源引用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// 可下载的文件（csv / pdf / 图片等）
    File,
    /// 路径中包含 `/api/` 的接口
    Api,
    /// 普通页面链接
    Link,
}

/// 页面中引用的一个资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub url: String,
    pub kind: ResourceKind,
}

impl ResourceRef {
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// 一道题目的页面解析结果
///
/// 每次抓取页面时构造一次，之后只读。
#[derive(Debug, Clone, Serialize)]
pub struct ChallengePage {
    question_text: String,
    /// 为空表示没有找到提交地址
    submission_url: String,
    resources: Vec<ResourceRef>,
    source_url: String,
}

impl ChallengePage {
    pub fn new(
        question_text: String,
        submission_url: String,
        resources: Vec<ResourceRef>,
        source_url: String,
    ) -> Self {
        Self {
            question_text,
            submission_url,
            resources,
            source_url,
        }
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn submission_url(&self) -> Option<&str> {
        if self.submission_url.is_empty() {
            None
        } else {
            Some(&self.submission_url)
        }
    }

    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

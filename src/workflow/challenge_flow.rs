//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 渲染页面（带截图）
//! 2. 解析题目、提交地址和资源
//! 3. 下载并解码资源，组装上下文
//! 4. 计算答案（表格计算 → 图表 → 推理）
//!
//! 提交和链路推进由编排层负责。

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{InferenceClient, PageRenderer, ResourceFetcher};
use crate::models::{ChallengePage, ImagePayload};
use crate::services::{AnswerEngine, AnswerRequest, ComputedAnswer, ContextAssembler, PageExtractor};
use crate::utils::truncate_text;
use crate::workflow::challenge_ctx::ChallengeCtx;

/// 题目处理结果
#[derive(Debug, Clone)]
pub enum ChallengeResult {
    /// 页面中没有提交地址，不进行计算
    MissingSubmitUrl { page: ChallengePage },
    /// 已得到答案，等待提交
    Solved {
        page: ChallengePage,
        answer: ComputedAnswer,
    },
}

/// 题目处理流程
///
/// - 编排单道题目的处理步骤
/// - 只依赖协作者接口，不持有浏览器
/// - 每次调用新建求解上下文，不同链路之间不共享状态
pub struct ChallengeFlow {
    renderer: Arc<dyn PageRenderer>,
    extractor: PageExtractor,
    assembler: ContextAssembler,
    engine: AnswerEngine,
    max_context_chars: usize,
}

impl ChallengeFlow {
    /// 创建新的题目处理流程
    pub fn new(
        config: &Config,
        renderer: Arc<dyn PageRenderer>,
        fetcher: Arc<dyn ResourceFetcher>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            renderer,
            extractor: PageExtractor::new(config.include_page_links),
            assembler: ContextAssembler::new(
                fetcher,
                config.max_text_fragment_chars,
                config.max_table_rows_in_context,
            ),
            engine: AnswerEngine::new(inference),
            max_context_chars: config.max_context_chars,
        }
    }

    pub async fn run(&self, ctx: &ChallengeCtx) -> AppResult<ChallengeResult> {
        // ========== 步骤 1: 渲染 ==========
        let rendered = self.renderer.render_with_screenshot(&ctx.url).await?;

        // ========== 步骤 2: 解析 ==========
        let page = self
            .extractor
            .extract(&rendered.text, &rendered.html, &ctx.url);
        info!(
            "{} 📝 题目: {}",
            ctx,
            truncate_text(page.question_text(), 200)
        );

        let Some(submit_url) = page.submission_url() else {
            warn!("{} ⚠️ 页面中没有找到提交地址", ctx);
            return Ok(ChallengeResult::MissingSubmitUrl { page });
        };
        info!(
            "{} 提交地址: {}, 资源 {} 个",
            ctx,
            submit_url,
            page.resources().len()
        );

        // ========== 步骤 3: 组装上下文 ==========
        let resolution = self.assembler.assemble(page.resources()).await;
        let context_text = resolution.assembled_text(self.max_context_chars);
        let screenshot = rendered
            .screenshot
            .map(|bytes| ImagePayload::new("image/png", bytes));

        // ========== 步骤 4: 计算答案 ==========
        let request = AnswerRequest {
            question: page.question_text(),
            tables: resolution.tables(),
            context: &context_text,
            images: resolution.images(),
            screenshot: screenshot.as_ref(),
        };
        let answer = self.engine.compute(&request).await;

        info!(
            "{} 💡 答案 ({}, {:?}): {}",
            ctx,
            answer.value.kind(),
            answer.method,
            truncate_text(&answer.value.preview(), 100)
        );

        Ok(ChallengeResult::Solved { page, answer })
    }
}

/// 答案计算服务
///
/// 优先在表格上确定性地计算，无法计算时交给推理服务
use std::sync::Arc;

use tracing::{debug, info};

use crate::infrastructure::InferenceClient;
use crate::models::{AnswerValue, ComputationMethod, ImagePayload, QuestionIntent, Table};
use crate::services::answer_normalizer::normalize;
use crate::services::chart_renderer::{render_chart, ChartKind};

/// 一次计算所需的输入
pub struct AnswerRequest<'a> {
    pub question: &'a str,
    /// 按页面资源顺序排列的表格
    pub tables: Vec<&'a Table>,
    /// 已截断的上下文文本
    pub context: &'a str,
    pub images: &'a [ImagePayload],
    pub screenshot: Option<&'a ImagePayload>,
}

/// 计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedAnswer {
    pub intent: QuestionIntent,
    pub value: AnswerValue,
    pub method: ComputationMethod,
}

pub struct AnswerEngine {
    inference: Arc<dyn InferenceClient>,
}

impl AnswerEngine {
    pub fn new(inference: Arc<dyn InferenceClient>) -> Self {
        Self { inference }
    }

    /// 计算答案
    ///
    /// 顺序：聚合统计 → 图表 → 推理。前两步失败不会报错，直接进入下一步
    pub async fn compute(&self, request: &AnswerRequest<'_>) -> ComputedAnswer {
        let intent = QuestionIntent::classify(request.question);
        info!("🧭 题目意图: {}", intent);

        if intent.is_aggregate() {
            if let Some(raw) = compute_aggregate(intent, request.question, &request.tables) {
                info!("✓ 表格直接计算: {}", raw);
                return ComputedAnswer {
                    intent,
                    value: normalize(&raw),
                    method: ComputationMethod::Deterministic,
                };
            }
            debug!("没有表格能匹配到列，改用推理");
        }

        if intent == QuestionIntent::Visualization {
            let kind = ChartKind::from_question(request.question);
            for table in &request.tables {
                match render_chart(table, kind) {
                    Ok(chart) => {
                        info!("📊 已生成 {:?} 图 ({} 字节)", kind, chart.bytes.len());
                        // data URI 不经过规范化
                        return ComputedAnswer {
                            intent,
                            value: AnswerValue::Text(chart.data_uri()),
                            method: ComputationMethod::Chart,
                        };
                    }
                    Err(e) => debug!("图表生成失败: {}", e),
                }
            }
        }

        let images = vision_images(intent, request);
        let prompt = build_prompt(request.question, request.context);
        debug!("调用推理服务: 提示词 {} 字符, 图片 {} 张", prompt.len(), images.len());

        let raw = self.inference.complete(&prompt, &images).await;
        ComputedAnswer {
            intent,
            value: normalize(&raw),
            method: ComputationMethod::Inference,
        }
    }
}

fn vision_images(intent: QuestionIntent, request: &AnswerRequest<'_>) -> Vec<ImagePayload> {
    if !intent.is_vision_eligible() {
        return Vec::new();
    }
    let mut images = request.images.to_vec();
    if intent == QuestionIntent::ImageAnalysis {
        if let Some(shot) = request.screenshot {
            images.push(shot.clone());
        }
    }
    images
}

fn build_prompt(question: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no additional data)"
    } else {
        context
    };
    format!(
        "You are solving a data analysis quiz.\n\n\
         QUESTION:\n{question}\n\n\
         AVAILABLE DATA:\n{context}\n\n\
         Instructions:\n\
         - Respond with ONLY the final answer value.\n\
         - Numbers: digits only, no units or thousands separators.\n\
         - Yes/no questions: true or false.\n\
         - Lists or objects: valid JSON.\n\
         - Do not explain your reasoning.\n\n\
         ANSWER:"
    )
}

/// 在第一张能匹配到列的表格上计算聚合值，返回原始文本
fn compute_aggregate(intent: QuestionIntent, question: &str, tables: &[&Table]) -> Option<String> {
    tables.iter().find_map(|table| {
        let column = resolve_column(question, table)?;
        let summary = table.numeric_values(column);
        if summary.count() == 0 && intent != QuestionIntent::Count {
            return None;
        }
        debug!("匹配到列 {:?}, {} 个数值", table.columns()[column], summary.count());

        let raw = match intent {
            QuestionIntent::Sum => format!("{:?}", finite(summary.sum())?),
            QuestionIntent::Average => format!("{:.2}", round2(finite(summary.mean()?)?)),
            QuestionIntent::Count => summary.count().to_string(),
            QuestionIntent::Max => format!("{:?}", finite(summary.max()?)?),
            QuestionIntent::Min => format!("{:?}", finite(summary.min()?)?),
            QuestionIntent::Median => format!("{:?}", finite(summary.median()?)?),
            QuestionIntent::StdDev => format!("{:.2}", round2(finite(summary.std_dev()?)?)),
            _ => return None,
        };
        Some(raw)
    })
}

/// 列匹配：先找题目中出现的完整列名（不区分大小写），再按列名中的单词匹配
fn resolve_column(question: &str, table: &Table) -> Option<usize> {
    let q = question.to_lowercase();
    let names: Vec<String> = table
        .columns()
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    names
        .iter()
        .position(|name| !name.is_empty() && q.contains(name.as_str()))
        .or_else(|| {
            names.iter().position(|name| {
                name.split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .any(|w| q.contains(w))
            })
        })
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// 记录调用次数并返回固定回复
    struct ScriptedInference {
        reply: String,
        calls: AtomicUsize,
        last_images: Mutex<usize>,
    }

    impl ScriptedInference {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                last_images: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedInference {
        async fn complete(&self, _prompt: &str, images: &[ImagePayload]) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_images.lock().unwrap() = images.len();
            self.reply.clone()
        }
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn request<'a>(question: &'a str, tables: Vec<&'a Table>) -> AnswerRequest<'a> {
        AnswerRequest {
            question,
            tables,
            context: "",
            images: &[],
            screenshot: None,
        }
    }

    #[tokio::test]
    async fn test_sum_is_computed_without_inference() {
        let revenue = table(
            &["Name", "Revenue"],
            &[&["a", "10"], &["b", "20"], &["c", "bad"], &["d", "30"]],
        );
        let inference = ScriptedInference::new("999");
        let engine = AnswerEngine::new(inference.clone());

        let answer = engine
            .compute(&request("What is the sum of the Revenue column?", vec![&revenue]))
            .await;

        assert_eq!(answer.intent, QuestionIntent::Sum);
        assert_eq!(answer.value, AnswerValue::Float(60.0));
        assert_eq!(answer.method, ComputationMethod::Deterministic);
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_average_is_rounded_to_two_decimals() {
        let scores = table(&["Student", "Score"], &[&["a", "50"], &["b", "70"], &["c", "90"]]);
        let raw = compute_aggregate(QuestionIntent::Average, "What is the average Score?", &[&scores]);
        assert_eq!(raw.as_deref(), Some("70.00"));
        assert_eq!(normalize("70.00"), AnswerValue::Float(70.0));

        let thirds = table(&["v"], &[&["1"], &["1"], &["2"]]);
        let raw = compute_aggregate(QuestionIntent::Average, "average of v", &[&thirds]);
        assert_eq!(raw.as_deref(), Some("1.33"));
    }

    #[test]
    fn test_other_aggregates() {
        let t = table(&["Price"], &[&["4"], &["1"], &["x"], &["7"], &["2"]]);
        let tables = [&t];
        let q = "price";
        assert_eq!(compute_aggregate(QuestionIntent::Count, q, &tables).as_deref(), Some("4"));
        assert_eq!(compute_aggregate(QuestionIntent::Max, q, &tables).as_deref(), Some("7.0"));
        assert_eq!(compute_aggregate(QuestionIntent::Min, q, &tables).as_deref(), Some("1.0"));
        assert_eq!(compute_aggregate(QuestionIntent::Median, q, &tables).as_deref(), Some("3.0"));
        assert_eq!(compute_aggregate(QuestionIntent::StdDev, q, &tables).as_deref(), Some("2.65"));
    }

    #[test]
    fn test_column_resolution_falls_back_to_words() {
        let t = table(&["id", "total_sales"], &[&["1", "5"]]);
        assert_eq!(resolve_column("What is the maximum of sales?", &t), Some(1));
        assert_eq!(resolve_column("TOTAL_SALES max", &t), Some(1));
        assert_eq!(resolve_column("nothing relevant", &t), None);
    }

    #[test]
    fn test_first_matching_table_wins() {
        let unrelated = table(&["city"], &[&["Oslo"]]);
        let first = table(&["amount"], &[&["1"], &["2"]]);
        let second = table(&["amount"], &[&["100"]]);
        let raw = compute_aggregate(
            QuestionIntent::Sum,
            "total amount",
            &[&unrelated, &first, &second],
        );
        assert_eq!(raw.as_deref(), Some("3.0"));
    }

    #[tokio::test]
    async fn test_unresolved_column_falls_back_to_inference() {
        let t = table(&["Name", "Revenue"], &[&["a", "10"]]);
        let inference = ScriptedInference::new("```json\n{\"x\": 1}\n```");
        let engine = AnswerEngine::new(inference.clone());

        let answer = engine.compute(&request("What is the total weight?", vec![&t])).await;

        assert_eq!(answer.method, ComputationMethod::Inference);
        assert_eq!(answer.value, AnswerValue::StructuredJson(serde_json::json!({"x": 1})));
        assert_eq!(inference.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_visualization_returns_data_uri() {
        let t = table(&["Month", "Sales"], &[&["Jan", "3"], &["Feb", "5"]]);
        let engine = AnswerEngine::new(ScriptedInference::new("unused"));

        let answer = engine.compute(&request("Draw a chart of sales", vec![&t])).await;

        assert_eq!(answer.method, ComputationMethod::Chart);
        match answer.value {
            AnswerValue::Text(uri) => assert!(uri.starts_with("data:image/png;base64,")),
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_screenshot_only_sent_for_image_questions() {
        let shot = ImagePayload::new("image/png", vec![1, 2, 3]);
        let inference = ScriptedInference::new("cat");
        let engine = AnswerEngine::new(inference.clone());

        let mut req = request("What animal is in the picture?", vec![]);
        req.screenshot = Some(&shot);
        let answer = engine.compute(&req).await;
        assert_eq!(answer.intent, QuestionIntent::ImageAnalysis);
        assert_eq!(answer.value, AnswerValue::Text("cat".into()));
        assert_eq!(*inference.last_images.lock().unwrap(), 1);

        let mut req = request("Who wrote Hamlet?", vec![]);
        req.screenshot = Some(&shot);
        engine.compute(&req).await;
        assert_eq!(*inference.last_images.lock().unwrap(), 0);
    }
}

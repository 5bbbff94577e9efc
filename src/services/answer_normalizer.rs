/// 答案规范化
///
/// 把计算结果或模型回复的原始文本转换为 `AnswerValue`。
/// 对任何输入都有结果，最差情况是 `Text`。
use serde_json::Value as JsonValue;

use crate::models::AnswerValue;

pub fn normalize(raw: &str) -> AnswerValue {
    let text = strip_matching_quotes(strip_code_fence(raw.trim()));

    // JSON 优先：对象 / 数组不能被当成数字或布尔值
    if let Some(value) = parse_structured(text) {
        return value;
    }

    if let Some(value) = parse_numeric(text) {
        return value;
    }

    if text.eq_ignore_ascii_case("true") {
        return AnswerValue::Boolean(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return AnswerValue::Boolean(false);
    }

    AnswerValue::Text(text.to_string())
}

/// 去掉 ``` 代码块标记（包括语言标记行）
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn strip_matching_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn parse_structured(text: &str) -> Option<AnswerValue> {
    let value: JsonValue = serde_json::from_str(text).ok()?;
    // 必须能重新序列化
    serde_json::to_string(&value).ok()?;

    let answer = match value {
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AnswerValue::Integer(i),
            None => AnswerValue::Float(n.as_f64()?),
        },
        JsonValue::Bool(b) => AnswerValue::Boolean(b),
        JsonValue::String(s) => AnswerValue::Text(s),
        other => AnswerValue::StructuredJson(other),
    };
    Some(answer)
}

/// 只保留数字、符号、小数点和指数标记后再解析
fn parse_numeric(text: &str) -> Option<AnswerValue> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if cleaned.contains(['.', 'e', 'E']) {
        return cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(AnswerValue::Float);
    }

    match cleaned.parse::<i64>() {
        Ok(i) => Some(AnswerValue::Integer(i)),
        Err(_) => cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(AnswerValue::Float),
    }
}

use serde::Serialize;
use serde_json::Value as JsonValue;

/// 规范化后的答案
///
/// 序列化时直接输出原生 JSON 值（不带标签），用于提交请求体。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    StructuredJson(JsonValue),
}

impl AnswerValue {
    /// 答案类型名称（日志与记录使用）
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerValue::Integer(_) => "integer",
            AnswerValue::Float(_) => "float",
            AnswerValue::Boolean(_) => "boolean",
            AnswerValue::Text(_) => "text",
            AnswerValue::StructuredJson(_) => "json",
        }
    }

    /// 转换为原生 JSON 值
    pub fn to_json(&self) -> JsonValue {
        match self {
            AnswerValue::Integer(v) => JsonValue::from(*v),
            AnswerValue::Float(v) => JsonValue::from(*v),
            AnswerValue::Boolean(v) => JsonValue::Bool(*v),
            AnswerValue::Text(v) => JsonValue::String(v.clone()),
            AnswerValue::StructuredJson(v) => v.clone(),
        }
    }

    /// 用于日志的字符串形式
    pub fn preview(&self) -> String {
        match self {
            AnswerValue::Text(v) => v.clone(),
            other => other.to_json().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_native_json() {
        assert_eq!(serde_json::to_value(AnswerValue::Integer(42)).unwrap(), json!(42));
        assert_eq!(serde_json::to_value(AnswerValue::Float(70.0)).unwrap(), json!(70.0));
        assert_eq!(serde_json::to_value(AnswerValue::Boolean(true)).unwrap(), json!(true));
        assert_eq!(
            serde_json::to_value(AnswerValue::Text("Paris".into())).unwrap(),
            json!("Paris")
        );
        assert_eq!(
            serde_json::to_value(AnswerValue::StructuredJson(json!({"x": 1}))).unwrap(),
            json!({"x": 1})
        );
    }

    #[test]
    fn test_structured_json_round_trip() {
        let original = json!({"items": [1, 2.5, "three", null], "ok": true});
        let answer = AnswerValue::StructuredJson(original.clone());
        let text = serde_json::to_string(&answer).unwrap();
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }
}

use serde::Serialize;

/// 题目意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionIntent {
    Sum,
    Average,
    Count,
    Max,
    Min,
    Median,
    StdDev,
    Filter,
    Sort,
    Group,
    Visualization,
    ImageAnalysis,
    Hash,
    Encode,
    General,
}

/// 关键词表，按优先级排列，第一个命中的意图生效
const KEYWORDS: &[(QuestionIntent, &[&str])] = &[
    (QuestionIntent::Sum, &["sum of", "total", "add up", "combined"]),
    (QuestionIntent::Average, &["average", "mean", "avg"]),
    (QuestionIntent::Count, &["count", "how many", "number of"]),
    (QuestionIntent::Max, &["maximum", "max", "highest", "largest"]),
    (QuestionIntent::Min, &["minimum", "min", "lowest", "smallest"]),
    (QuestionIntent::Median, &["median"]),
    (QuestionIntent::StdDev, &["standard deviation", "std"]),
    (QuestionIntent::Filter, &["where", "which", "filter", "find"]),
    (QuestionIntent::Sort, &["sort", "order", "rank"]),
    (QuestionIntent::Group, &["group by", "grouped", "per"]),
    (
        QuestionIntent::Visualization,
        &["chart", "plot", "graph", "visualiz", "draw"],
    ),
    (
        QuestionIntent::ImageAnalysis,
        &["image", "picture", "photo", "screenshot"],
    ),
    (QuestionIntent::Hash, &["hash", "md5", "sha"]),
    (QuestionIntent::Encode, &["encode", "base64"]),
];

impl QuestionIntent {
    /// 根据关键词判断题目意图，未命中时为 `General`
    pub fn classify(question: &str) -> Self {
        let lower = question.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(intent, _)| *intent)
            .unwrap_or(QuestionIntent::General)
    }

    /// 是否可以直接在表格上做聚合计算
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            QuestionIntent::Sum
                | QuestionIntent::Average
                | QuestionIntent::Count
                | QuestionIntent::Max
                | QuestionIntent::Min
                | QuestionIntent::Median
                | QuestionIntent::StdDev
        )
    }

    /// 是否需要把图片一并交给视觉模型
    pub fn is_vision_eligible(self) -> bool {
        matches!(
            self,
            QuestionIntent::ImageAnalysis | QuestionIntent::Visualization
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            QuestionIntent::Sum => "sum",
            QuestionIntent::Average => "average",
            QuestionIntent::Count => "count",
            QuestionIntent::Max => "max",
            QuestionIntent::Min => "min",
            QuestionIntent::Median => "median",
            QuestionIntent::StdDev => "std-dev",
            QuestionIntent::Filter => "filter",
            QuestionIntent::Sort => "sort",
            QuestionIntent::Group => "group",
            QuestionIntent::Visualization => "visualization",
            QuestionIntent::ImageAnalysis => "image-analysis",
            QuestionIntent::Hash => "hash",
            QuestionIntent::Encode => "encode",
            QuestionIntent::General => "general",
        }
    }
}

impl std::fmt::Display for QuestionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//! 二维表格
//!
//! CSV 与 Excel 解码后的统一表示，也是确定性计算的数据来源。

use std::fmt;

/// 列的推断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    /// 整列没有任何值
    Empty,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    column_types: Vec<ColumnType>,
}

impl Table {
    /// 构造表格，行长度会被补齐或截断到列数
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        let column_types = (0..width)
            .map(|idx| infer_column_type(rows.iter().map(|r| r[idx].as_str())))
            .collect();

        Self {
            columns,
            rows,
            column_types,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// 把一列转换为数值，无法解析的单元格视为缺失
    pub fn numeric_column(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(idx).and_then(|cell| parse_numeric(cell)))
            .collect()
    }

    /// 一列中所有可解析的数值
    pub fn numeric_values(&self, idx: usize) -> NumericSummary {
        NumericSummary::new(self.numeric_column(idx).into_iter().flatten().collect())
    }

    /// 第一个（除 `skip` 外）包含数值的列
    pub fn first_numeric_column(&self, skip: Option<usize>) -> Option<usize> {
        (0..self.column_count())
            .filter(|idx| Some(*idx) != skip)
            .find(|idx| self.numeric_column(*idx).iter().any(Option::is_some))
    }

    /// 渲染成放入推理上下文的文本
    pub fn to_context(&self, max_rows: usize) -> String {
        let mut out = format!(
            "Shape: {} rows, {} columns\n",
            self.row_count(),
            self.column_count()
        );
        out.push_str(&format!("Columns: {:?}\n", self.columns));
        out.push_str("Data types:\n");
        for (name, ty) in self.columns.iter().zip(&self.column_types) {
            out.push_str(&format!("{}    {}\n", name, ty));
        }
        out.push('\n');

        if self.row_count() > max_rows {
            out.push_str(&format!("First {} rows:\n", max_rows));
        } else {
            out.push_str("Data:\n");
        }
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in self.rows.iter().take(max_rows) {
            out.push_str(&row.join(" | "));
            out.push('\n');
        }
        out
    }
}

/// 宽松的数值解析：去掉首尾空白，拒绝 NaN / 无穷
pub fn parse_numeric(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for cell in cells.map(str::trim).filter(|c| !c.is_empty()) {
        seen = true;
        all_int &= cell.parse::<i64>().is_ok();
        all_float &= parse_numeric(cell).is_some();
        all_bool &= cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false");
    }

    match (seen, all_int, all_float, all_bool) {
        (false, ..) => ColumnType::Empty,
        (true, true, _, _) => ColumnType::Integer,
        (true, false, true, _) => ColumnType::Float,
        (true, false, false, true) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

/// 数值列的统计量
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    values: Vec<f64>,
}

impl NumericSummary {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum() / self.values.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    /// 样本标准差（n - 1）
    pub fn std_dev(&self) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.values.len() - 1) as f64;
        Some(variance.sqrt())
    }
}

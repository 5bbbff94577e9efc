/// 图表生成
///
/// 在内存中把表格画成 PNG，用于可视化类题目
use std::f64::consts::PI;
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::models::{ImagePayload, Table};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const MARGIN: i64 = 50;
/// 柱状图和饼图最多展示的行数
const MAX_CATEGORIES: usize = 20;
const HISTOGRAM_BINS: usize = 10;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([40, 40, 40, 255]);
const PALETTE: [Rgba<u8>; 6] = [
    Rgba([31, 119, 180, 255]),
    Rgba([255, 127, 14, 255]),
    Rgba([44, 160, 44, 255]),
    Rgba([214, 39, 40, 255]),
    Rgba([148, 103, 189, 255]),
    Rgba([140, 86, 75, 255]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Histogram,
}

impl ChartKind {
    /// 根据题目中的关键词选择图表类型，默认柱状图
    pub fn from_question(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("bar") {
            ChartKind::Bar
        } else if q.contains("line") {
            ChartKind::Line
        } else if q.contains("pie") {
            ChartKind::Pie
        } else if q.contains("scatter") {
            ChartKind::Scatter
        } else if q.contains("hist") {
            ChartKind::Histogram
        } else {
            ChartKind::Bar
        }
    }
}

/// 绘制图表
///
/// x 轴为第一列，y 轴为第一列以外的第一个数值列（只有一列时用该列）
///
/// # 返回
/// PNG 图片；表格为空或没有数值列时返回错误信息
pub fn render_chart(table: &Table, kind: ChartKind) -> Result<ImagePayload, String> {
    if table.row_count() == 0 {
        return Err("表格没有数据".to_string());
    }
    let skip = (table.column_count() > 1).then_some(0);
    let y_idx = table
        .first_numeric_column(skip)
        .ok_or_else(|| "表格中没有数值列".to_string())?;

    let values: Vec<f64> = table
        .numeric_column(y_idx)
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    debug!("绘制 {:?} 图: 列 {}, {} 个点", kind, table.columns()[y_idx], values.len());

    let mut canvas = Canvas::new();
    match kind {
        ChartKind::Bar => canvas.bars(&values[..values.len().min(MAX_CATEGORIES)]),
        ChartKind::Line => canvas.line(&values),
        ChartKind::Pie => canvas.pie(&values[..values.len().min(MAX_CATEGORIES)]),
        ChartKind::Scatter => {
            let x_idx = table.first_numeric_column(Some(y_idx));
            let points: Vec<(f64, f64)> = match x_idx {
                Some(x_idx) => table
                    .numeric_column(x_idx)
                    .into_iter()
                    .zip(table.numeric_column(y_idx))
                    .filter_map(|(x, y)| Some((x?, y?)))
                    .collect(),
                None => values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect(),
            };
            canvas.scatter(&points)
        }
        ChartKind::Histogram => {
            let present: Vec<f64> = table.numeric_column(y_idx).into_iter().flatten().collect();
            canvas.histogram(&present)
        }
    }

    canvas.encode()
}

struct Canvas {
    img: RgbaImage,
}

impl Canvas {
    fn new() -> Self {
        Self {
            img: RgbaImage::from_pixel(WIDTH, HEIGHT, BACKGROUND),
        }
    }

    fn plot_left(&self) -> i64 {
        MARGIN
    }

    fn plot_right(&self) -> i64 {
        WIDTH as i64 - MARGIN
    }

    fn plot_top(&self) -> i64 {
        MARGIN
    }

    fn plot_bottom(&self) -> i64 {
        HEIGHT as i64 - MARGIN
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && x < WIDTH as i64 && y < HEIGHT as i64 {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    fn draw_line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn dot(&mut self, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
        for y in -radius..=radius {
            for x in -radius..=radius {
                if x * x + y * y <= radius * radius {
                    self.put(cx + x, cy + y, color);
                }
            }
        }
    }

    fn axes(&mut self) {
        let (l, r, t, b) = (
            self.plot_left(),
            self.plot_right(),
            self.plot_top(),
            self.plot_bottom(),
        );
        self.draw_line((l, b), (r, b), AXIS);
        self.draw_line((l, t), (l, b), AXIS);
    }

    /// 数值到 y 像素的映射，范围总是包含 0
    fn y_scale(&self, values: &[f64]) -> impl Fn(f64) -> i64 {
        let min = values.iter().copied().fold(0.0_f64, f64::min);
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let range = if max - min == 0.0 { 1.0 } else { max - min };
        let (top, bottom) = (self.plot_top() as f64, self.plot_bottom() as f64);
        move |v| (bottom - (v - min) / range * (bottom - top)).round() as i64
    }

    fn bars(&mut self, values: &[f64]) {
        self.axes();
        if values.is_empty() {
            return;
        }
        let scale = self.y_scale(values);
        let zero = scale(0.0);
        let slot = (self.plot_right() - self.plot_left()) as f64 / values.len() as f64;
        for (i, v) in values.iter().enumerate() {
            let x0 = self.plot_left() + (i as f64 * slot + slot * 0.1).round() as i64;
            let x1 = self.plot_left() + ((i + 1) as f64 * slot - slot * 0.1).round() as i64;
            self.fill_rect(x0, zero, x1, scale(*v), PALETTE[0]);
        }
    }

    fn line(&mut self, values: &[f64]) {
        self.axes();
        if values.is_empty() {
            return;
        }
        let scale = self.y_scale(values);
        let step = if values.len() > 1 {
            (self.plot_right() - self.plot_left()) as f64 / (values.len() - 1) as f64
        } else {
            0.0
        };
        let points: Vec<(i64, i64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (self.plot_left() + (i as f64 * step).round() as i64, scale(*v)))
            .collect();
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], PALETTE[0]);
        }
        for (x, y) in points {
            self.dot(x, y, 3, PALETTE[0]);
        }
    }

    fn scatter(&mut self, points: &[(f64, f64)]) {
        self.axes();
        if points.is_empty() {
            return;
        }
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let y_scale = self.y_scale(&ys);
        let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let x_range = if x_max - x_min == 0.0 { 1.0 } else { x_max - x_min };
        let width = (self.plot_right() - self.plot_left()) as f64;
        for (x, y) in points {
            let px = self.plot_left() + ((x - x_min) / x_range * width).round() as i64;
            self.dot(px, y_scale(*y), 4, PALETTE[1]);
        }
    }

    fn histogram(&mut self, values: &[f64]) {
        if values.is_empty() {
            self.axes();
            return;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = if max - min == 0.0 { 1.0 } else { (max - min) / HISTOGRAM_BINS as f64 };
        let mut counts = vec![0.0; HISTOGRAM_BINS];
        for v in values {
            let bin = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
            counts[bin] += 1.0;
        }
        self.bars(&counts);
    }

    fn pie(&mut self, values: &[f64]) {
        let positive: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
        let total: f64 = positive.iter().sum();
        if total <= 0.0 {
            return;
        }

        // 每个扇区的累计结束角度
        let mut bounds = Vec::with_capacity(positive.len());
        let mut acc = 0.0;
        for v in &positive {
            acc += v / total * 2.0 * PI;
            bounds.push(acc);
        }

        let cx = WIDTH as i64 / 2;
        let cy = HEIGHT as i64 / 2;
        let radius = (HEIGHT as i64 / 2) - MARGIN;
        for y in -radius..=radius {
            for x in -radius..=radius {
                if x * x + y * y > radius * radius {
                    continue;
                }
                let mut angle = (y as f64).atan2(x as f64);
                if angle < 0.0 {
                    angle += 2.0 * PI;
                }
                let slice = bounds.iter().position(|b| angle <= *b).unwrap_or(bounds.len() - 1);
                self.put(cx + x, cy + y, PALETTE[slice % PALETTE.len()]);
            }
        }
    }

    fn encode(self) -> Result<ImagePayload, String> {
        let mut bytes = Vec::new();
        self.img
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| format!("PNG 编码失败: {}", e))?;
        Ok(ImagePayload::new("image/png", bytes))
    }
}

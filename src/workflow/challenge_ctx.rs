//! 题目处理上下文
//!
//! 封装"我正在处理链路中的第几题"这一信息

use std::fmt::Display;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct ChallengeCtx {
    /// 当前轮次（从1开始）
    pub iteration: usize,

    /// 最大轮次（仅用于日志显示）
    pub max_iterations: usize,

    /// 题目页面地址
    pub url: String,
}

impl ChallengeCtx {
    /// 创建新的题目上下文
    pub fn new(iteration: usize, max_iterations: usize, url: String) -> Self {
        Self {
            iteration,
            max_iterations,
            url,
        }
    }
}

impl Display for ChallengeCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[第 {}/{} 题]", self.iteration, self.max_iterations)
    }
}

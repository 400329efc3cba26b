// ==========================================
// 遗留会员数据导入管道 - 导入结果报表
// ==========================================
// 职责: 单次运行 / 单表结果的统计结构
// 说明: 序列化后持久化到 import_run 表，也用于 --json 输出
// ==========================================

use crate::domain::types::{RunStatus, SkipReason, TableStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 被跳过的行（用于报表采样，只保留前若干条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRow {
    pub legacy_id: i64,
    pub reason: SkipReason,
}

/// 单表导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub source_table: String,
    pub dest_table: String,
    pub status: TableStatus,
    /// 成功写入目标库的行数
    pub imported: u64,
    /// 因悬空外键等原因跳过的行数
    pub skipped: u64,
    /// 硬失败行数（硬失败中止本表，0 或 1）
    pub failed: u64,
    /// 跳过原因采样（前 N 条，N 见配置 skip_sample_limit）
    pub skip_samples: Vec<SkippedRow>,
    /// 硬失败信息
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn new(source_table: &str, dest_table: &str) -> Self {
        Self {
            source_table: source_table.to_string(),
            dest_table: dest_table.to_string(),
            status: TableStatus::Success,
            imported: 0,
            skipped: 0,
            failed: 0,
            skip_samples: Vec::new(),
            error: None,
        }
    }

    /// 标记为未启动（运行被前序硬失败中止）
    pub fn not_started(source_table: &str, dest_table: &str) -> Self {
        let mut outcome = Self::new(source_table, dest_table);
        outcome.status = TableStatus::Skipped;
        outcome
    }

    pub fn is_hard_failure(&self) -> bool {
        self.status == TableStatus::Failed
    }
}

/// 一次导入运行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// 按执行顺序排列的各表结果
    pub outcomes: Vec<TableOutcome>,
}

impl ImportRun {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Completed,
            outcomes: Vec::new(),
        }
    }

    /// 收尾: 填充结束时间并根据各表结果定整体状态
    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = if self.outcomes.iter().any(|o| o.is_hard_failure()) {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
    }

    pub fn total_imported(&self) -> u64 {
        self.outcomes.iter().map(|o| o.imported).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.outcomes.iter().map(|o| o.skipped).sum()
    }
}

// ==========================================
// 遗留会员数据导入管道 - 领域类型
// ==========================================
// 职责: 运行状态、表状态、跳过原因枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 导入运行整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// 所有表导入完成
    Completed,
    /// 某张表硬失败，后续表未启动
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Aborted => "ABORTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(RunStatus::Completed),
            "ABORTED" => Some(RunStatus::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单表导入状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    /// 表内全部行处理完毕（允许存在跳过行）
    Success,
    /// 硬失败，表导入中止
    Failed,
    /// 运行被中止，此表未启动或未完成
    Skipped,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Success => "SUCCESS",
            TableStatus::Failed => "FAILED",
            TableStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 行级跳过原因
///
/// 跳过是局部恢复：计数并记录，但不中止所在表的导入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// 外键指向的 legacy id 在映射表中不存在（悬空引用）
    MissingReference {
        column: String,
        referenced_table: String,
        referenced_id: i64,
    },
    /// 必填外键列的值为 NULL
    MissingForeignKeyValue { column: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingReference {
                column,
                referenced_table,
                referenced_id,
            } => write!(
                f,
                "悬空外键: 列 {} 引用 {}.{} 无映射",
                column, referenced_table, referenced_id
            ),
            SkipReason::MissingForeignKeyValue { column } => {
                write!(f, "必填外键列 {} 为 NULL", column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        assert_eq!(RunStatus::parse("COMPLETED"), Some(RunStatus::Completed));
        assert_eq!(RunStatus::parse("ABORTED"), Some(RunStatus::Aborted));
        assert_eq!(RunStatus::parse("???"), None);
        assert_eq!(RunStatus::Completed.as_str(), "COMPLETED");
    }

    #[test]
    fn test_skip_reason_display_contains_ids() {
        let reason = SkipReason::MissingReference {
            column: "coduser".to_string(),
            referenced_table: "miembro".to_string(),
            referenced_id: 42,
        };
        let text = reason.to_string();
        assert!(text.contains("miembro"));
        assert!(text.contains("42"));
    }
}

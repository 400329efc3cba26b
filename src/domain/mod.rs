// ==========================================
// 遗留会员数据导入管道 - 领域层
// ==========================================
// 职责: 转储值域、表映射配置、导入结果报表
// ==========================================

pub mod row;
pub mod run;
pub mod table_spec;
pub mod types;

// 重导出核心类型
pub use row::{DumpRow, SqlValue};
pub use run::{ImportRun, SkippedRow, TableOutcome};
pub use table_spec::{default_table_specs, ColumnKind, ColumnSpec, TableSpec};
pub use types::{RunStatus, SkipReason, TableStatus};

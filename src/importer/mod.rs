// ==========================================
// 遗留会员数据导入管道 - 导入层
// ==========================================
// 职责: 转储行的清洗、外键换算、批量落库与运行调度
// ==========================================

pub mod coordinator;
pub mod data_cleaner;
pub mod error;
pub mod table_importer;

// 重导出核心类型
pub use coordinator::ImportCoordinator;
pub use data_cleaner::{normalize_territorial_code, normalize_text};
pub use error::{ImportError, ImportTaskResult};
pub use table_importer::{ImporterSettings, TableImporter};

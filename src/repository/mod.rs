// ==========================================
// 遗留会员数据导入管道 - 仓储层
// ==========================================
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

pub mod destination_repo;
pub mod error;
pub mod id_map_repo;
pub mod run_log_repo;

// 重导出核心类型
pub use destination_repo::{DestinationStore, SqliteDestinationStore};
pub use error::{RepositoryError, RepositoryResult};
pub use id_map_repo::{IdMapRepositoryImpl, IdentifierMap};
pub use run_log_repo::{ImportRunRecord, RunLogRepository, RunLogRepositoryImpl};

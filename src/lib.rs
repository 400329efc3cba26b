// ==========================================
// 遗留会员数据导入管道 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 一次性/可重跑的遗留数据迁移管道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值域与配置数据
pub mod domain;

// 转储解析层 - 外部转储文件
pub mod dump;

// 导入层 - 清洗/换算/调度
pub mod importer;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 调优参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/schema 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    default_table_specs, ColumnKind, ColumnSpec, DumpRow, ImportRun, RunStatus, SkipReason,
    SkippedRow, SqlValue, TableOutcome, TableSpec, TableStatus,
};

// 转储解析
pub use dump::{DumpParser, ParseError};

// 导入层
pub use importer::{ImportCoordinator, ImportError, ImporterSettings, TableImporter};

// 仓储
pub use repository::{
    DestinationStore, IdMapRepositoryImpl, IdentifierMap, RepositoryError, RunLogRepository,
    RunLogRepositoryImpl, SqliteDestinationStore,
};

// 配置
pub use config::ConfigManager;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "遗留会员数据导入管道";

// ==========================================
// 遗留会员数据导入管道 - 导入层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 解析错误 / 行结构错误 → 当前表硬失败
// - 约束违反 / 连接错误   → 当前表硬失败，运行中止
// - 悬空外键不是错误，作为行级跳过走 SkipReason
// ==========================================

use crate::dump::error::ParseError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入层错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 转储解析 =====
    #[error("转储解析失败: {0}")]
    Parse(#[from] ParseError),

    #[error("行结构错误 (偏移 {offset}): {message}")]
    RowShape { offset: u64, message: String },

    #[error("字段类型转换失败 (legacy_id={legacy_id}, 列 {column}): {message}")]
    TypeConversion {
        legacy_id: i64,
        column: String,
        message: String,
    },

    // ===== 配置 =====
    #[error("未知的源表: {0}")]
    UnknownTable(String),

    #[error("表依赖配置存在环: {0}")]
    DependencyCycle(String),

    // ===== 目标库写入 =====
    #[error("写入约束违反: {0}")]
    ConstraintViolation(String),

    #[error("数据库连接失败: {0}")]
    ConnectionError(String),

    #[error("仓储错误: {0}")]
    Repository(RepositoryError),

    // ===== 控制流 =====
    #[error("导入在批次边界被中止")]
    Aborted,

    // ===== 通用 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<RepositoryError>: 按错误语义归类
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => {
                ImportError::ConstraintViolation(msg)
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::LockError(msg) => ImportError::ConnectionError(msg),
            other => ImportError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type ImportTaskResult<T> = Result<T, ImportError>;

// ==========================================
// 遗留会员数据导入管道 - 运行历史仓储
// ==========================================
// 职责: 导入运行的落库记录（追加写 + 收尾更新）
// 存储: import_run 表，summary 以 JSON 持久化
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::domain::run::ImportRun;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// import_run 表的一行
#[derive(Debug, Clone)]
pub struct ImportRunRecord {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
}

// ==========================================
// RunLogRepository Trait
// ==========================================
#[async_trait]
pub trait RunLogRepository: Send + Sync {
    /// 运行开始时登记
    async fn insert_run(&self, run: &ImportRun) -> RepositoryResult<()>;

    /// 运行收尾时回写状态与汇总
    async fn finalize_run(&self, run: &ImportRun) -> RepositoryResult<()>;

    /// 最近 N 次运行（新→旧）
    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportRunRecord>>;
}

// ==========================================
// RunLogRepositoryImpl
// ==========================================
pub struct RunLogRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl RunLogRepositoryImpl {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl RunLogRepository for RunLogRepositoryImpl {
    async fn insert_run(&self, run: &ImportRun) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO import_run (run_id, started_at, status) VALUES (?1, ?2, ?3)",
            params![
                run.run_id,
                run.started_at.to_rfc3339(),
                run.status.as_str()
            ],
        )?;
        Ok(())
    }

    async fn finalize_run(&self, run: &ImportRun) -> RepositoryResult<()> {
        let summary = serde_json::to_string(&run.outcomes)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE import_run SET finished_at = ?2, status = ?3, summary_json = ?4 \
             WHERE run_id = ?1",
            params![
                run.run_id,
                run.finished_at.map(|t| t.to_rfc3339()),
                run.status.as_str(),
                summary
            ],
        )?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportRunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, started_at, finished_at, status FROM import_run \
             ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ImportRunRecord {
                    run_id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ==========================================
// 遗留会员数据导入管道 - 标识符映射仓储
// ==========================================
// 职责: (源表名, legacy id) → 目标 id 的持久化簿记
// 存储: id_mapping 表，(source_table, legacy_id) 唯一
// 红线: 映射建立后不可变更，只随整表重导入一并清除
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// IdentifierMap Trait
// ==========================================
// 用途: 跨表外键换算的唯一事实来源
// 实现者: IdMapRepositoryImpl（rusqlite）
#[async_trait]
pub trait IdentifierMap: Send + Sync {
    /// 记录一条映射（幂等）
    ///
    /// 已存在 (source_table, legacy_id) 时不覆盖，返回已记录的目标 id；
    /// 目标 id 的分配由目标库批量写入产生，这里只做登记。
    async fn reserve(
        &self,
        source_table: &str,
        legacy_id: i64,
        destination_id: i64,
    ) -> RepositoryResult<i64>;

    /// 单事务内批量登记 (legacy_id, destination_id) 对
    async fn reserve_batch(
        &self,
        source_table: &str,
        pairs: &[(i64, i64)],
    ) -> RepositoryResult<()>;

    /// 纯查询: 未命中返回 None（悬空外键是可报告状态，不直接视为错误）
    async fn resolve(&self, source_table: &str, legacy_id: i64) -> RepositoryResult<Option<i64>>;

    /// 清除一张源表的全部映射（仅用于 truncate-and-reimport 路径）
    async fn clear(&self, source_table: &str) -> RepositoryResult<usize>;

    /// 该源表已登记的映射数
    async fn count(&self, source_table: &str) -> RepositoryResult<i64>;
}

// ==========================================
// IdMapRepositoryImpl
// ==========================================
pub struct IdMapRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl IdMapRepositoryImpl {
    /// 从已有连接创建（幂等地再次应用统一 PRAGMA）
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
impl IdentifierMap for IdMapRepositoryImpl {
    async fn reserve(
        &self,
        source_table: &str,
        legacy_id: i64,
        destination_id: i64,
    ) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO id_mapping (source_table, legacy_id, destination_id) \
             VALUES (?1, ?2, ?3)",
            params![source_table, legacy_id, destination_id],
        )?;
        // 幂等: 无论本次是否插入，都返回登记在案的目标 id
        let recorded: i64 = conn.query_row(
            "SELECT destination_id FROM id_mapping WHERE source_table = ?1 AND legacy_id = ?2",
            params![source_table, legacy_id],
            |row| row.get(0),
        )?;
        Ok(recorded)
    }

    async fn reserve_batch(
        &self,
        source_table: &str,
        pairs: &[(i64, i64)],
    ) -> RepositoryResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO id_mapping (source_table, legacy_id, destination_id) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for (legacy_id, destination_id) in pairs {
                stmt.execute(params![source_table, legacy_id, destination_id])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    async fn resolve(&self, source_table: &str, legacy_id: i64) -> RepositoryResult<Option<i64>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT destination_id FROM id_mapping WHERE source_table = ?1 AND legacy_id = ?2",
                params![source_table, legacy_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(result)
    }

    async fn clear(&self, source_table: &str) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM id_mapping WHERE source_table = ?1",
            params![source_table],
        )?;
        Ok(removed)
    }

    async fn count(&self, source_table: &str) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM id_mapping WHERE source_table = ?1",
            params![source_table],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_destination_schema;

    fn setup() -> IdMapRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_destination_schema(&conn).unwrap();
        IdMapRepositoryImpl::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_reserve_then_resolve_roundtrip() {
        let repo = setup();
        let dest = repo.reserve("miembro", 1, 101).await.unwrap();
        assert_eq!(dest, 101);
        assert_eq!(repo.resolve("miembro", 1).await.unwrap(), Some(101));
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent() {
        let repo = setup();
        let first = repo.reserve("miembro", 7, 70).await.unwrap();
        // 第二次用不同目标 id 登记：既不覆盖也不报错
        let second = repo.reserve("miembro", 7, 999).await.unwrap();
        assert_eq!(first, 70);
        assert_eq!(second, 70);
        assert_eq!(repo.count("miembro").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_is_per_table() {
        let repo = setup();
        repo.reserve("miembro", 1, 10).await.unwrap();
        repo.reserve("agrupacionterritorial", 1, 20).await.unwrap();
        assert_eq!(repo.resolve("miembro", 1).await.unwrap(), Some(10));
        assert_eq!(
            repo.resolve("agrupacionterritorial", 1).await.unwrap(),
            Some(20)
        );
        assert_eq!(repo.resolve("cuotaaniosocio", 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_removes_only_one_table() {
        let repo = setup();
        repo.reserve_batch("miembro", &[(1, 10), (2, 20)])
            .await
            .unwrap();
        repo.reserve("agrupacionterritorial", 1, 30).await.unwrap();

        let removed = repo.clear("miembro").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.resolve("miembro", 1).await.unwrap(), None);
        assert_eq!(
            repo.resolve("agrupacionterritorial", 1).await.unwrap(),
            Some(30)
        );
    }
}

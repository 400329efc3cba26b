// ==========================================
// 遗留会员数据导入管道 - 目标库仓储
// ==========================================
// 职责: 目标表的批量写入 / 级联清空 / 行数查询
// 红线: 批量写入必须整批原子提交（全成或全无）
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::domain::row::SqlValue;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

// ==========================================
// DestinationStore Trait
// ==========================================
// 用途: 目标存储抽象（管道只依赖 rowid 生成与级联删除能力）
// 实现者: SqliteDestinationStore
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// 原子批量插入，按入参顺序返回新生成的目标 id
    ///
    /// 事务内任何一行失败则整批回滚。
    async fn insert_batch(
        &self,
        dest_table: &str,
        columns: &[String],
        rows: Vec<Vec<SqlValue>>,
    ) -> RepositoryResult<Vec<i64>>;

    /// 按给定顺序清空多张目标表（单事务；调用方负责给出反依赖顺序）
    async fn truncate(&self, dest_tables: &[String]) -> RepositoryResult<()>;

    /// 目标表行数
    async fn count_rows(&self, dest_table: &str) -> RepositoryResult<i64>;
}

// ==========================================
// SqliteDestinationStore
// ==========================================
pub struct SqliteDestinationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDestinationStore {
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

/// 表名/列名来自静态配置，拼接 SQL 前仍做白名单校验
fn check_identifier(name: &str) -> RepositoryResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(v) => rusqlite::types::Value::Integer(*v),
        SqlValue::Real(v) => rusqlite::types::Value::Real(*v),
        SqlValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

#[async_trait]
impl DestinationStore for SqliteDestinationStore {
    async fn insert_batch(
        &self,
        dest_table: &str,
        columns: &[String],
        rows: Vec<Vec<SqlValue>>,
    ) -> RepositoryResult<Vec<i64>> {
        check_identifier(dest_table)?;
        for col in columns {
            check_identifier(col)?;
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dest_table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let mut new_ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &rows {
                if row.len() != columns.len() {
                    return Err(RepositoryError::FieldValueError {
                        field: dest_table.to_string(),
                        message: format!(
                            "列数不一致: 期望 {}, 实际 {}",
                            columns.len(),
                            row.len()
                        ),
                    });
                }
                let params: Vec<rusqlite::types::Value> = row.iter().map(to_sql).collect();
                stmt.execute(rusqlite::params_from_iter(params))?;
                new_ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(new_ids)
    }

    async fn truncate(&self, dest_tables: &[String]) -> RepositoryResult<()> {
        for table in dest_tables {
            check_identifier(table)?;
        }
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for table in dest_tables {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    async fn count_rows(&self, dest_table: &str) -> RepositoryResult<i64> {
        check_identifier(dest_table)?;
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", dest_table),
            [],
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

    fn setup() -> SqliteDestinationStore {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_destination_schema(&conn).unwrap();
        SqliteDestinationStore::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_batch_returns_ids_in_order() {
        let store = setup();
        let ids = store
            .insert_batch(
                "agrupaciones",
                &cols(&["codigo", "nombre"]),
                vec![
                    vec![SqlValue::Text("12".into()), SqlValue::Text("Madrid".into())],
                    vec![SqlValue::Text("0".into()), SqlValue::Text("Estatal".into())],
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.count_rows("agrupaciones").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_batch_is_atomic_on_constraint_violation() {
        let store = setup();
        let miembro_ids = store
            .insert_batch(
                "miembros",
                &cols(&["nombre"]),
                vec![vec![SqlValue::Text("Ana".into())]],
            )
            .await
            .unwrap();
        // miembro_id 有 NOT NULL 约束，第二行违反 → 整批回滚
        let result = store
            .insert_batch(
                "cuotas_anuales",
                &cols(&["miembro_id", "ejercicio"]),
                vec![
                    vec![SqlValue::Integer(miembro_ids[0]), SqlValue::Integer(2020)],
                    vec![SqlValue::Null, SqlValue::Integer(2021)],
                ],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(store.count_rows("cuotas_anuales").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_truncate_multiple_tables() {
        let store = setup();
        store
            .insert_batch(
                "agrupaciones",
                &cols(&["nombre"]),
                vec![vec![SqlValue::Text("x".into())]],
            )
            .await
            .unwrap();
        store
            .insert_batch(
                "miembros",
                &cols(&["nombre"]),
                vec![vec![SqlValue::Text("Ana".into())]],
            )
            .await
            .unwrap();

        store
            .truncate(&cols(&["miembros", "agrupaciones"]))
            .await
            .unwrap();
        assert_eq!(store.count_rows("miembros").await.unwrap(), 0);
        assert_eq!(store.count_rows("agrupaciones").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_identifier() {
        let store = setup();
        let result = store.count_rows("miembros; DROP TABLE miembros").await;
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidIdentifier(_))
        ));
    }
}

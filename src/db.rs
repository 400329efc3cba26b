// ==========================================
// 遗留会员数据导入管道 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/超时一致）
// - 目标库 schema 引导集中在一处，避免各模块各建各表
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化目标库 schema（幂等）
///
/// 主键一律使用 rowid 别名（INTEGER PRIMARY KEY，不带 AUTOINCREMENT）:
/// 清空表后 id 从 1 重新分配，重导入回放才能得到确定性的 id 序列。
pub fn init_destination_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS agrupaciones (
            id INTEGER PRIMARY KEY,
            codigo TEXT,
            nombre TEXT,
            ambito TEXT,
            codigo_postal TEXT,
            email TEXT
        );

        CREATE TABLE IF NOT EXISTS miembros (
            id INTEGER PRIMARY KEY,
            nombre TEXT,
            apellidos TEXT,
            codigo TEXT,
            agrupacion_id INTEGER REFERENCES agrupaciones(id) ON DELETE CASCADE,
            fecha_alta TEXT,
            email TEXT
        );

        CREATE TABLE IF NOT EXISTS cuotas_anuales (
            id INTEGER PRIMARY KEY,
            miembro_id INTEGER NOT NULL REFERENCES miembros(id) ON DELETE CASCADE,
            agrupacion_id INTEGER REFERENCES agrupaciones(id) ON DELETE CASCADE,
            ejercicio INTEGER,
            importe REAL,
            estado TEXT
        );

        -- legacy id → 目标 id 的簿记表（导入管道私有，不对外暴露）
        CREATE TABLE IF NOT EXISTS id_mapping (
            source_table TEXT NOT NULL,
            legacy_id INTEGER NOT NULL,
            destination_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (source_table, legacy_id)
        );

        -- 导入运行历史
        CREATE TABLE IF NOT EXISTS import_run (
            run_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            summary_json TEXT
        );

        -- 配置键值表（global scope）
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )
}

/// 打开目标库连接并完成 schema 引导
pub fn open_destination_db(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_destination_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_destination_schema(&conn).unwrap();
        init_destination_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
                 ('agrupaciones','miembros','cuotas_anuales','id_mapping','import_run','config_kv')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_rowid_restarts_after_delete() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_destination_schema(&conn).unwrap();

        conn.execute("INSERT INTO agrupaciones (nombre) VALUES ('a')", [])
            .unwrap();
        conn.execute("INSERT INTO agrupaciones (nombre) VALUES ('b')", [])
            .unwrap();
        conn.execute("DELETE FROM agrupaciones", []).unwrap();
        conn.execute("INSERT INTO agrupaciones (nombre) VALUES ('c')", [])
            .unwrap();

        let id: i64 = conn
            .query_row("SELECT id FROM agrupaciones", [], |row| row.get(0))
            .unwrap();
        // 清空后 id 重新从 1 开始（重导入回放的确定性前提）
        assert_eq!(id, 1);
    }
}

// ==========================================
// 遗留会员数据导入管道 - 配置管理器
// ==========================================
// 职责: 导入调优参数的加载与覆写
// 存储: config_kv 表 (key-value, scope_id='global')
// 说明: 未配置的键回退到代码默认值
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::importer::table_importer::ImporterSettings;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// config_kv 中的键名
pub const KEY_BATCH_SIZE: &str = "import.batch_size";
pub const KEY_CHANNEL_CAPACITY: &str = "import.channel_capacity";
pub const KEY_SKIP_SAMPLE_LIMIT: &str = "import.skip_sample_limit";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入/覆写配置值（scope_id='global'）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) \
             VALUES ('global', ?1, ?2, datetime('now')) \
             ON CONFLICT(scope_id, key) DO UPDATE SET \
             value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_usize(&self, key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => {
                let parsed = raw.trim().parse::<usize>().map_err(|_| {
                    format!("配置值格式错误 (key: {}, value: {})", key, raw)
                })?;
                if parsed == 0 {
                    return Err(format!("配置值必须大于 0 (key: {})", key).into());
                }
                Ok(parsed)
            }
            None => Ok(default),
        }
    }

    /// 加载导入器调优参数（缺省键回退默认值）
    pub fn load_importer_settings(&self) -> Result<ImporterSettings, Box<dyn Error>> {
        let defaults = ImporterSettings::default();
        Ok(ImporterSettings {
            batch_size: self.get_usize(KEY_BATCH_SIZE, defaults.batch_size)?,
            channel_capacity: self
                .get_usize(KEY_CHANNEL_CAPACITY, defaults.channel_capacity)?,
            skip_sample_limit: self
                .get_usize(KEY_SKIP_SAMPLE_LIMIT, defaults.skip_sample_limit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_destination_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_destination_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let manager = setup();
        let settings = manager.load_importer_settings().unwrap();
        let defaults = ImporterSettings::default();
        assert_eq!(settings.batch_size, defaults.batch_size);
        assert_eq!(settings.skip_sample_limit, defaults.skip_sample_limit);
    }

    #[test]
    fn test_override_batch_size() {
        let manager = setup();
        manager.set_config_value(KEY_BATCH_SIZE, "50").unwrap();
        let settings = manager.load_importer_settings().unwrap();
        assert_eq!(settings.batch_size, 50);
    }

    #[test]
    fn test_invalid_value_is_error() {
        let manager = setup();
        manager.set_config_value(KEY_BATCH_SIZE, "abc").unwrap();
        assert!(manager.load_importer_settings().is_err());

        manager.set_config_value(KEY_BATCH_SIZE, "0").unwrap();
        assert!(manager.load_importer_settings().is_err());
    }
}

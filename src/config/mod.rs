// ==========================================
// 遗留会员数据导入管道 - 配置层
// ==========================================

pub mod config_manager;

pub use config_manager::ConfigManager;

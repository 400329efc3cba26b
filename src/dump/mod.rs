// ==========================================
// 遗留会员数据导入管道 - 转储解析层
// ==========================================
// 职责: 流式扫描 MySQL 风格转储文件，按表产出插入行
// 红线: 纯词法/语法层，不感知 schema 语义，无写访问
// ==========================================

pub mod error;
pub mod parser;

pub use error::{ParseError, ParseResult};
pub use parser::{DumpParser, DumpTableScan};

// ==========================================
// 遗留会员数据导入管道 - 转储解析错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 所有语法错误携带字节偏移，便于在超大转储中定位
// ==========================================

use thiserror::Error;

/// 转储解析错误类型
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("转储文件不存在: {0}")]
    FileNotFound(String),

    #[error("转储文件读取失败 (偏移 {offset}): {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("转储文件在偏移 {offset} 处意外结束: {context}")]
    UnexpectedEof { offset: u64, context: &'static str },

    #[error("转储语法错误 (偏移 {offset}): 期望 {expected}, 实际 '{found}'")]
    UnexpectedToken {
        offset: u64,
        expected: &'static str,
        found: char,
    },

    #[error("数值字面量非法 (偏移 {offset}): '{text}'")]
    BadNumber { offset: u64, text: String },
}

/// Result 类型别名
pub type ParseResult<T> = Result<T, ParseError>;

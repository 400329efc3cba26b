// ==========================================
// 遗留会员数据导入管道 - 数据清洗
// ==========================================
// 职责: 遗留数据缺陷的纯函数清洗规则
// 红线: 归一化后的 "0" 是合法编码，调用方禁止用
//       空串/falsy 真值判断“编码是否存在”
// ==========================================

use crate::domain::row::SqlValue;

/// 地域编码归一化
///
/// 规则（遗留库的已命名缺陷规则）:
/// 1. trim 空白；结果为空 → 视为缺失（None）
/// 2. 去掉前导零
/// 3. 去零后为空串（全零编码）→ 归一为字面 "0"
///
/// 全零编码是有含义的合法值，必须与“缺失”区分开。
pub fn normalize_territorial_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

/// 文本归一化: trim，空串归一为 None
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 按列类型将转储值清洗为文本（NULL 与空白串均归一为 None）
pub fn clean_text_value(value: &SqlValue) -> Option<String> {
    value.as_text().and_then(|s| normalize_text(&s))
}

/// 地域编码列的清洗入口（NULL/空白 → None，其余走编码规则）
pub fn clean_territorial_code(value: &SqlValue) -> Option<String> {
    value
        .as_text()
        .and_then(|s| normalize_territorial_code(&s))
}

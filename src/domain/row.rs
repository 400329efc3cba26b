// ==========================================
// 遗留会员数据导入管道 - 转储值域
// ==========================================
// 职责: 转储文件中单行插入值的内存表示
// 说明: DumpRow 为瞬态数据，产出后立即被导入器消费
// ==========================================

use std::sync::Arc;

/// 转储文件中的标量值
///
/// MySQL 转储的 VALUES 元组里只出现四类字面量：
/// NULL、整数、浮点数、带引号字符串。嵌套括号表达式
/// 按原始文本捕获为 Text（解析器不求值）。
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// 取整数值（Text 形式的数字也接受，转储中数字常被引号包裹）
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            SqlValue::Real(v) => Some(*v),
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// 取文本形式（NULL 返回 None）
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }
}

/// 转储文件中的一行插入值
///
/// - columns: 语句声明的列清单（同一语句的多个元组共享一份）；
///   语句未声明列时为 None，由 TableSpec 的默认列序对齐
/// - values: 与列清单位置对齐的原始字段值
/// - offset: 元组起始字节偏移，用于错误上下文
#[derive(Debug, Clone)]
pub struct DumpRow {
    pub columns: Option<Arc<[String]>>,
    pub values: Vec<SqlValue>,
    pub offset: u64,
}

impl DumpRow {
    /// 按列名取值（列清单缺失时用 fallback 列序）
    pub fn get<'a>(&'a self, column: &str, fallback: &[String]) -> Option<&'a SqlValue> {
        let idx = match &self.columns {
            Some(cols) => cols.iter().position(|c| c.eq_ignore_ascii_case(column)),
            None => fallback.iter().position(|c| c.eq_ignore_ascii_case(column)),
        }?;
        self.values.get(idx)
    }

    /// 行的列数与列清单是否对齐
    pub fn arity_matches(&self, fallback: &[String]) -> bool {
        let expected = match &self.columns {
            Some(cols) => cols.len(),
            None => fallback.len(),
        };
        self.values.len() == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_integer_accepts_quoted_numbers() {
        assert_eq!(SqlValue::Integer(7).as_integer(), Some(7));
        assert_eq!(SqlValue::Text(" 00012 ".to_string()).as_integer(), Some(12));
        assert_eq!(SqlValue::Null.as_integer(), None);
        assert_eq!(SqlValue::Text("abc".to_string()).as_integer(), None);
    }

    #[test]
    fn test_get_by_declared_columns() {
        let row = DumpRow {
            columns: Some(vec!["id".to_string(), "nombre".to_string()].into()),
            values: vec![SqlValue::Integer(1), SqlValue::Text("Ana".to_string())],
            offset: 0,
        };
        assert_eq!(row.get("NOMBRE", &[]), Some(&SqlValue::Text("Ana".to_string())));
        assert_eq!(row.get("codigo", &[]), None);
    }

    #[test]
    fn test_get_by_fallback_columns() {
        let fallback = vec!["id".to_string(), "nombre".to_string()];
        let row = DumpRow {
            columns: None,
            values: vec![SqlValue::Integer(1), SqlValue::Text("Bea".to_string())],
            offset: 0,
        };
        assert_eq!(row.get("nombre", &fallback), Some(&SqlValue::Text("Bea".to_string())));
        assert!(row.arity_matches(&fallback));
        assert!(!row.arity_matches(&fallback[..1].to_vec()));
    }
}

// ==========================================
// 遗留会员数据导入管道 - 转储文件解析器
// ==========================================
// 职责: 按目标表流式产出 INSERT 语句的值元组
// 算法: 单遍字节级状态机
//   - 识别 INSERT INTO <表名> 语句头（可带反引号/库名限定）
//   - 解析可选列清单与 VALUES 元组；仅在顶层逗号处切分
//   - 字符串内的转义、双写引号、嵌入逗号按词法处理
//   - 其他表的语句在引号感知下快速跳过，不做完整解析
// 红线: 非法/未终结的值清单直接报错（带偏移），不做中途恢复
// ==========================================

use crate::domain::row::{DumpRow, SqlValue};
use crate::dump::error::{ParseError, ParseResult};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ==========================================
// 字节流（带偏移跟踪与单字节回看）
// ==========================================
struct ByteStream {
    reader: BufReader<File>,
    offset: u64,
    /// 已预读/回退的字节（栈顶为下一个字节）
    pending: Vec<u8>,
}

impl ByteStream {
    fn open(path: &Path) -> ParseResult<Self> {
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.display().to_string()));
        }
        let file = File::open(path).map_err(|e| ParseError::Io {
            offset: 0,
            source: e,
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(64 * 1024, file),
            offset: 0,
            pending: Vec::with_capacity(2),
        })
    }

    /// 下一个未消费字节的偏移
    fn offset(&self) -> u64 {
        self.offset
    }

    fn next(&mut self) -> ParseResult<Option<u8>> {
        if let Some(b) = self.pending.pop() {
            self.offset += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.reader.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => {
                self.offset += 1;
                Ok(Some(buf[0]))
            }
            Err(e) => Err(ParseError::Io {
                offset: self.offset,
                source: e,
            }),
        }
    }

    fn peek(&mut self) -> ParseResult<Option<u8>> {
        if self.pending.is_empty() {
            let mut buf = [0u8; 1];
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => self.pending.push(buf[0]),
                Err(e) => {
                    return Err(ParseError::Io {
                        offset: self.offset,
                        source: e,
                    })
                }
            }
        }
        Ok(self.pending.last().copied())
    }

    /// 回退一个已消费的字节
    fn push_back(&mut self, b: u8) {
        self.pending.push(b);
        self.offset -= 1;
    }
}

// ==========================================
// DumpParser - 转储文件入口
// ==========================================
pub struct DumpParser {
    path: PathBuf,
}

impl DumpParser {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 为指定源表打开一次扫描（每次调用重新打开文件，可重启）
    pub fn scan_table(&self, table: &str) -> ParseResult<DumpTableScan> {
        let stream = ByteStream::open(&self.path)?;
        Ok(DumpTableScan {
            stream,
            target: table.to_ascii_lowercase(),
            columns: None,
            in_values: false,
            done: false,
        })
    }
}

// ==========================================
// DumpTableScan - 惰性行迭代器
// ==========================================
pub struct DumpTableScan {
    stream: ByteStream,
    target: String,
    /// 当前语句声明的列清单（同一语句的元组共享）
    columns: Option<Arc<[String]>>,
    /// 当前位于匹配语句的 VALUES 列表内
    in_values: bool,
    done: bool,
}

impl Iterator for DumpTableScan {
    type Item = ParseResult<DumpRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.in_values {
                match self.next_tuple() {
                    Ok(Some(row)) => return Some(Ok(row)),
                    Ok(None) => continue, // 语句结束，继续找下一条
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            match self.advance_to_target() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl DumpTableScan {
    // ===== 语句定位 =====

    /// 扫描到下一条目标表的 INSERT 语句头；其余语句快速跳过
    ///
    /// 返回 true 表示已进入 VALUES 列表；false 表示文件结束。
    fn advance_to_target(&mut self) -> ParseResult<bool> {
        loop {
            self.skip_ws_and_comments()?;
            match self.stream.peek()? {
                None => return Ok(false),
                Some(b) if !is_ident_start(b) => {
                    // 非标识符开头（孤立分号、括号等），按语句残片跳过
                    self.stream.next()?;
                    if b != b';' {
                        self.fast_skip_statement()?;
                    }
                    continue;
                }
                Some(_) => {}
            }

            let word = self.read_word()?;
            if !word.eq_ignore_ascii_case("INSERT") {
                self.fast_skip_statement()?;
                continue;
            }

            self.skip_ws_and_comments()?;
            let into = self.read_word()?;
            if !into.eq_ignore_ascii_case("INTO") {
                self.fast_skip_statement()?;
                continue;
            }

            self.skip_ws_and_comments()?;
            let table = self.read_table_name()?;
            if !table.eq_ignore_ascii_case(&self.target) {
                self.fast_skip_statement()?;
                continue;
            }

            // 可选列清单
            self.skip_ws_and_comments()?;
            self.columns = if self.stream.peek()? == Some(b'(') {
                Some(self.parse_column_list()?.into())
            } else {
                None
            };

            // VALUES 关键字
            self.skip_ws_and_comments()?;
            let offset = self.stream.offset();
            let keyword = self.read_word()?;
            if !keyword.eq_ignore_ascii_case("VALUES") && !keyword.eq_ignore_ascii_case("VALUE") {
                return Err(ParseError::UnexpectedToken {
                    offset,
                    expected: "VALUES",
                    found: keyword.chars().next().unwrap_or(' '),
                });
            }

            self.in_values = true;
            return Ok(true);
        }
    }

    /// 引号感知的语句快速跳过（消费到顶层 ';' 为止）
    fn fast_skip_statement(&mut self) -> ParseResult<()> {
        loop {
            match self.stream.next()? {
                None => return Ok(()), // 文件尾部的残余内容可容忍
                Some(b';') => return Ok(()),
                Some(q @ (b'\'' | b'"' | b'`')) => self.skip_quoted(q)?,
                Some(b'-') => {
                    if self.stream.peek()? == Some(b'-') {
                        self.skip_line()?;
                    }
                }
                Some(b'#') => self.skip_line()?,
                Some(b'/') => {
                    if self.stream.peek()? == Some(b'*') {
                        self.skip_block_comment()?;
                    }
                }
                Some(_) => {}
            }
        }
    }

    // ===== VALUES 元组解析 =====

    /// 取下一个元组；语句结束（';'）时返回 None
    fn next_tuple(&mut self) -> ParseResult<Option<DumpRow>> {
        self.skip_ws_and_comments()?;
        let offset = self.stream.offset();
        match self.stream.peek()? {
            None => Err(ParseError::UnexpectedEof {
                offset,
                context: "VALUES 列表未终结",
            }),
            Some(b',') => {
                self.stream.next()?;
                self.next_tuple()
            }
            Some(b';') => {
                self.stream.next()?;
                self.in_values = false;
                self.columns = None;
                Ok(None)
            }
            Some(b'(') => {
                let row = self.parse_tuple(offset)?;
                Ok(Some(row))
            }
            Some(b) => Err(ParseError::UnexpectedToken {
                offset,
                expected: "'(' / ',' / ';'",
                found: b as char,
            }),
        }
    }

    fn parse_tuple(&mut self, offset: u64) -> ParseResult<DumpRow> {
        self.stream.next()?; // 消费 '('
        let mut values = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            if self.stream.peek()? == Some(b')') {
                self.stream.next()?;
                break;
            }
            values.push(self.parse_value()?);

            self.skip_ws_and_comments()?;
            let sep_offset = self.stream.offset();
            match self.stream.next()? {
                Some(b',') => continue,
                Some(b')') => break,
                Some(b) => {
                    return Err(ParseError::UnexpectedToken {
                        offset: sep_offset,
                        expected: "',' 或 ')'",
                        found: b as char,
                    })
                }
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset: sep_offset,
                        context: "值元组未闭合",
                    })
                }
            }
        }
        Ok(DumpRow {
            columns: self.columns.clone(),
            values,
            offset,
        })
    }

    /// 解析单个标量值（仅在顶层逗号处返回，字符串/嵌套括号内不切分）
    fn parse_value(&mut self) -> ParseResult<SqlValue> {
        let offset = self.stream.offset();
        match self.stream.peek()? {
            None => Err(ParseError::UnexpectedEof {
                offset,
                context: "期望字段值",
            }),
            Some(q @ (b'\'' | b'"')) => {
                self.stream.next()?;
                let text = self.parse_quoted(q)?;
                Ok(SqlValue::Text(text))
            }
            Some(b'(') => {
                // 嵌套括号表达式按原始文本捕获，不求值
                let raw = self.capture_nested_parens()?;
                Ok(SqlValue::Text(raw))
            }
            Some(b) if is_ident_start(b) => {
                let word = self.read_word()?;
                if word.eq_ignore_ascii_case("NULL") {
                    Ok(SqlValue::Null)
                } else {
                    // CURRENT_TIMESTAMP 等裸关键字按文本透传
                    Ok(SqlValue::Text(word))
                }
            }
            Some(b) if b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.' => {
                self.parse_number(offset)
            }
            Some(b) => Err(ParseError::UnexpectedToken {
                offset,
                expected: "字段值",
                found: b as char,
            }),
        }
    }

    fn parse_number(&mut self, offset: u64) -> ParseResult<SqlValue> {
        let mut text = String::new();
        loop {
            match self.stream.peek()? {
                Some(b)
                    if b.is_ascii_digit()
                        || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E') =>
                {
                    self.stream.next()?;
                    text.push(b as char);
                }
                _ => break,
            }
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(SqlValue::Integer(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(SqlValue::Real(f));
        }
        Err(ParseError::BadNumber { offset, text })
    }

    /// 解析带引号字符串（起始引号已消费）
    ///
    /// 处理: 反斜杠转义、双写引号、嵌入逗号/括号/换行
    fn parse_quoted(&mut self, quote: u8) -> ParseResult<String> {
        let mut bytes = Vec::new();
        loop {
            let offset = self.stream.offset();
            match self.stream.next()? {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset,
                        context: "字符串未闭合",
                    })
                }
                Some(b'\\') => {
                    let escaped = self.stream.next()?.ok_or(ParseError::UnexpectedEof {
                        offset,
                        context: "转义序列未终结",
                    })?;
                    bytes.push(unescape(escaped));
                }
                Some(b) if b == quote => {
                    // 双写引号表示字面引号
                    if self.stream.peek()? == Some(quote) {
                        self.stream.next()?;
                        bytes.push(quote);
                    } else {
                        return Ok(String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                Some(b) => bytes.push(b),
            }
        }
    }

    /// 捕获嵌套括号表达式的原始文本（含引号内容）
    fn capture_nested_parens(&mut self) -> ParseResult<String> {
        let start = self.stream.offset();
        self.stream.next()?; // 消费 '('
        let mut bytes = vec![b'('];
        let mut depth: u32 = 1;
        loop {
            match self.stream.next()? {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset: start,
                        context: "嵌套括号未闭合",
                    })
                }
                Some(q @ (b'\'' | b'"')) => {
                    bytes.push(q);
                    self.copy_quoted(q, &mut bytes)?;
                }
                Some(b'(') => {
                    depth += 1;
                    bytes.push(b'(');
                }
                Some(b')') => {
                    bytes.push(b')');
                    depth -= 1;
                    if depth == 0 {
                        return Ok(String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                Some(b) => bytes.push(b),
            }
        }
    }

    /// 原样复制带引号字符串（用于嵌套括号捕获）
    fn copy_quoted(&mut self, quote: u8, out: &mut Vec<u8>) -> ParseResult<()> {
        loop {
            let offset = self.stream.offset();
            match self.stream.next()? {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset,
                        context: "字符串未闭合",
                    })
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    if let Some(next) = self.stream.next()? {
                        out.push(next);
                    }
                }
                Some(b) if b == quote => {
                    out.push(b);
                    if self.stream.peek()? == Some(quote) {
                        self.stream.next()?;
                        out.push(quote);
                    } else {
                        return Ok(());
                    }
                }
                Some(b) => out.push(b),
            }
        }
    }

    // ===== 词法辅助 =====

    fn parse_column_list(&mut self) -> ParseResult<Vec<String>> {
        self.stream.next()?; // 消费 '('
        let mut columns = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            let name = self.read_table_name()?; // 同为可反引号标识符
            columns.push(name);
            self.skip_ws_and_comments()?;
            let offset = self.stream.offset();
            match self.stream.next()? {
                Some(b',') => continue,
                Some(b')') => return Ok(columns),
                Some(b) => {
                    return Err(ParseError::UnexpectedToken {
                        offset,
                        expected: "',' 或 ')'",
                        found: b as char,
                    })
                }
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset,
                        context: "列清单未闭合",
                    })
                }
            }
        }
    }

    /// 读取标识符（支持反引号包裹与 `库.表` 限定，返回末段小写）
    fn read_table_name(&mut self) -> ParseResult<String> {
        let mut name = self.read_one_identifier()?;
        while self.stream.peek()? == Some(b'.') {
            self.stream.next()?;
            name = self.read_one_identifier()?;
        }
        Ok(name)
    }

    fn read_one_identifier(&mut self) -> ParseResult<String> {
        let offset = self.stream.offset();
        if self.stream.peek()? == Some(b'`') {
            self.stream.next()?;
            let mut bytes = Vec::new();
            loop {
                match self.stream.next()? {
                    None => {
                        return Err(ParseError::UnexpectedEof {
                            offset,
                            context: "反引号标识符未闭合",
                        })
                    }
                    Some(b'`') => {
                        // 双写反引号表示字面反引号
                        if self.stream.peek()? == Some(b'`') {
                            self.stream.next()?;
                            bytes.push(b'`');
                        } else {
                            return Ok(String::from_utf8_lossy(&bytes).to_lowercase());
                        }
                    }
                    Some(b) => bytes.push(b),
                }
            }
        }
        let word = self.read_word()?;
        if word.is_empty() {
            let found = self.stream.peek()?.map(|b| b as char).unwrap_or(' ');
            return Err(ParseError::UnexpectedToken {
                offset,
                expected: "标识符",
                found,
            });
        }
        Ok(word)
    }

    /// 读取一个裸标识符/关键字（小写返回）
    fn read_word(&mut self) -> ParseResult<String> {
        let mut word = String::new();
        loop {
            match self.stream.peek()? {
                Some(b) if is_ident_byte(b) => {
                    self.stream.next()?;
                    word.push(b.to_ascii_lowercase() as char);
                }
                _ => return Ok(word),
            }
        }
    }

    fn skip_ws_and_comments(&mut self) -> ParseResult<()> {
        loop {
            match self.stream.peek()? {
                Some(b) if b.is_ascii_whitespace() => {
                    self.stream.next()?;
                }
                Some(b'#') => {
                    self.stream.next()?;
                    self.skip_line()?;
                }
                Some(b'-') => {
                    // 只有 '--' 是注释，单个 '-' 可能是负数
                    self.stream.next()?;
                    if self.stream.peek()? == Some(b'-') {
                        self.skip_line()?;
                    } else {
                        self.stream.push_back(b'-');
                        return Ok(());
                    }
                }
                Some(b'/') => {
                    self.stream.next()?;
                    if self.stream.peek()? == Some(b'*') {
                        self.skip_block_comment()?;
                    } else {
                        self.stream.push_back(b'/');
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) -> ParseResult<()> {
        while let Some(b) = self.stream.next()? {
            if b == b'\n' {
                break;
            }
        }
        Ok(())
    }

    /// 跳过块注释（'/' 已消费，peek 为 '*'）
    fn skip_block_comment(&mut self) -> ParseResult<()> {
        self.stream.next()?; // 消费 '*'
        let mut prev = 0u8;
        while let Some(b) = self.stream.next()? {
            if prev == b'*' && b == b'/' {
                return Ok(());
            }
            prev = b;
        }
        Ok(())
    }

    /// 引号内容跳过（用于 fast_skip，起始引号已消费）
    fn skip_quoted(&mut self, quote: u8) -> ParseResult<()> {
        loop {
            match self.stream.next()? {
                None => return Ok(()),
                Some(b'\\') if quote != b'`' => {
                    self.stream.next()?;
                }
                Some(b) if b == quote => {
                    if self.stream.peek()? == Some(quote) {
                        self.stream.next()?;
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'`'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// MySQL 字符串转义映射
fn unescape(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'0' => 0,
        b'b' => 0x08,
        b'Z' => 0x1a,
        other => other,
    }
}

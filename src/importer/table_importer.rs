// ==========================================
// 遗留会员数据导入管道 - 单表导入器
// ==========================================
// 职责: 一张表的完整管道
//   解析 → 清洗 → 外键换算 → 批量写入 → 登记映射
// 并发: 解析在 spawn_blocking 生产者中进行，经有界通道
//       与批量写入流水线重叠
// 失败语义:
// - 悬空外键/必填外键为空 → 行级跳过，继续导入
// - 解析错误/类型错误/约束违反 → 本表硬失败中止
// - 批次整体原子提交；映射只在批次落库成功后登记
// ==========================================

use crate::domain::row::{DumpRow, SqlValue};
use crate::domain::run::{SkippedRow, TableOutcome};
use crate::domain::table_spec::{ColumnKind, TableSpec};
use crate::domain::types::{SkipReason, TableStatus};
use crate::dump::parser::DumpParser;
use crate::importer::data_cleaner;
use crate::importer::error::{ImportError, ImportTaskResult};
use crate::repository::destination_repo::DestinationStore;
use crate::repository::id_map_repo::IdentifierMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// 导入器调优参数
#[derive(Debug, Clone)]
pub struct ImporterSettings {
    /// 单批写入行数（事务开销 与 内存/锁持有时长 的权衡）
    pub batch_size: usize,
    /// 解析端→写入端有界通道容量
    pub channel_capacity: usize,
    /// 报表中保留的跳过原因采样条数
    pub skip_sample_limit: usize,
}

impl Default for ImporterSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            channel_capacity: 1024,
            skip_sample_limit: 5,
        }
    }
}

/// 单行转换结果
enum RowPlan {
    /// 可写入: legacy 主键 + 目标列值
    Ready { legacy_id: i64, values: Vec<SqlValue> },
    /// 行级跳过
    Skip { legacy_id: i64, reason: SkipReason },
}

// ==========================================
// TableImporter
// ==========================================
pub struct TableImporter {
    spec: TableSpec,
    dump_path: PathBuf,
    dest: Arc<dyn DestinationStore>,
    id_map: Arc<dyn IdentifierMap>,
    settings: ImporterSettings,
    abort: Arc<AtomicBool>,
}

impl TableImporter {
    pub fn new(
        spec: TableSpec,
        dump_path: PathBuf,
        dest: Arc<dyn DestinationStore>,
        id_map: Arc<dyn IdentifierMap>,
        settings: ImporterSettings,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            spec,
            dump_path,
            dest,
            id_map,
            settings,
            abort,
        }
    }

    /// 导入整张表
    ///
    /// 硬失败不向上抛错，而是折叠进 TableOutcome（计数得以保留），
    /// 由协调器根据 status 决定是否中止运行。
    pub async fn import(&self) -> TableOutcome {
        let mut outcome = TableOutcome::new(&self.spec.source_table, &self.spec.dest_table);
        tracing::info!(
            table = %self.spec.source_table,
            dest = %self.spec.dest_table,
            "开始导入"
        );

        if let Err(e) = self.import_inner(&mut outcome).await {
            outcome.status = TableStatus::Failed;
            if !matches!(e, ImportError::Aborted) {
                outcome.failed += 1;
            }
            outcome.error = Some(e.to_string());
            tracing::error!(table = %self.spec.source_table, error = %e, "表导入硬失败");
        } else {
            tracing::info!(
                table = %self.spec.source_table,
                imported = outcome.imported,
                skipped = outcome.skipped,
                "表导入完成"
            );
        }
        outcome
    }

    async fn import_inner(&self, outcome: &mut TableOutcome) -> ImportTaskResult<()> {
        let (tx, mut rx) = mpsc::channel::<Result<DumpRow, crate::dump::ParseError>>(
            self.settings.channel_capacity,
        );

        // 生产者: 阻塞式文件解析，推入有界通道
        let parser = DumpParser::new(self.dump_path.clone());
        let source_table = self.spec.source_table.clone();
        tokio::task::spawn_blocking(move || {
            let scan = match parser.scan_table(&source_table) {
                Ok(scan) => scan,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    return;
                }
            };
            for item in scan {
                let is_err = item.is_err();
                // 消费端关闭（硬失败提前退出）时停止解析
                if tx.blocking_send(item).is_err() || is_err {
                    return;
                }
            }
        });

        // 消费者: 转换、批量写入
        let dest_columns = self.spec.dest_column_names();
        let mut batch: Vec<(i64, Vec<SqlValue>)> =
            Vec::with_capacity(self.settings.batch_size);

        while let Some(item) = rx.recv().await {
            let row = item?;
            match self.transform_row(&row).await? {
                RowPlan::Ready { legacy_id, values } => {
                    batch.push((legacy_id, values));
                    if batch.len() >= self.settings.batch_size {
                        self.flush(&mut batch, &dest_columns, outcome).await?;
                    }
                }
                RowPlan::Skip { legacy_id, reason } => {
                    outcome.skipped += 1;
                    tracing::debug!(
                        table = %self.spec.source_table,
                        legacy_id,
                        reason = %reason,
                        "行已跳过"
                    );
                    if outcome.skip_samples.len() < self.settings.skip_sample_limit {
                        outcome.skip_samples.push(SkippedRow { legacy_id, reason });
                    }
                }
            }
        }
        self.flush(&mut batch, &dest_columns, outcome).await?;
        Ok(())
    }

    /// 提交一个批次: 原子写入目标表，成功后登记 legacy→目标 id 映射
    async fn flush(
        &self,
        batch: &mut Vec<(i64, Vec<SqlValue>)>,
        dest_columns: &[String],
        outcome: &mut TableOutcome,
    ) -> ImportTaskResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        // 中止只发生在批次边界，目标库与映射表不会出现半批状态
        if self.abort.load(Ordering::SeqCst) {
            return Err(ImportError::Aborted);
        }

        let rows: Vec<Vec<SqlValue>> = batch.iter().map(|(_, v)| v.clone()).collect();
        let new_ids = self
            .dest
            .insert_batch(&self.spec.dest_table, dest_columns, rows)
            .await?;

        let pairs: Vec<(i64, i64)> = batch
            .iter()
            .map(|(legacy_id, _)| *legacy_id)
            .zip(new_ids)
            .collect();
        self.id_map
            .reserve_batch(&self.spec.source_table, &pairs)
            .await?;

        outcome.imported += batch.len() as u64;
        tracing::debug!(
            table = %self.spec.source_table,
            batch_rows = batch.len(),
            total = outcome.imported,
            "批次已提交"
        );
        batch.clear();
        Ok(())
    }

    /// 单行转换: 清洗 + 外键换算
    async fn transform_row(&self, row: &DumpRow) -> ImportTaskResult<RowPlan> {
        if !row.arity_matches(&self.spec.default_columns) {
            return Err(ImportError::RowShape {
                offset: row.offset,
                message: format!(
                    "值个数与列清单不一致 (表 {})",
                    self.spec.source_table
                ),
            });
        }

        let legacy_id = self.extract_legacy_id(row)?;
        let mut values = Vec::with_capacity(self.spec.columns.len());

        for col in &self.spec.columns {
            let raw = row
                .get(&col.source, &self.spec.default_columns)
                .cloned()
                .unwrap_or(SqlValue::Null);

            let value = match &col.kind {
                ColumnKind::Text => match data_cleaner::clean_text_value(&raw) {
                    Some(s) => SqlValue::Text(s),
                    None => SqlValue::Null,
                },
                ColumnKind::TerritorialCode => {
                    match data_cleaner::clean_territorial_code(&raw) {
                        Some(code) => SqlValue::Text(code),
                        None => SqlValue::Null,
                    }
                }
                ColumnKind::Integer => {
                    if raw.is_null() {
                        SqlValue::Null
                    } else {
                        SqlValue::Integer(raw.as_integer().ok_or_else(|| {
                            ImportError::TypeConversion {
                                legacy_id,
                                column: col.source.clone(),
                                message: format!("无法转换为整数: {:?}", raw),
                            }
                        })?)
                    }
                }
                ColumnKind::Real => {
                    if raw.is_null() {
                        SqlValue::Null
                    } else {
                        SqlValue::Real(raw.as_real().ok_or_else(|| {
                            ImportError::TypeConversion {
                                legacy_id,
                                column: col.source.clone(),
                                message: format!("无法转换为数值: {:?}", raw),
                            }
                        })?)
                    }
                }
                ColumnKind::ForeignKey {
                    references,
                    required,
                } => {
                    match self
                        .resolve_foreign_key(legacy_id, col, references, *required, &raw)
                        .await?
                    {
                        Ok(value) => value,
                        Err(reason) => return Ok(RowPlan::Skip { legacy_id, reason }),
                    }
                }
            };
            values.push(value);
        }

        Ok(RowPlan::Ready { legacy_id, values })
    }

    /// 外键换算: NULL → 按必填性处理；悬空引用一律跳过
    async fn resolve_foreign_key(
        &self,
        legacy_id: i64,
        col: &crate::domain::table_spec::ColumnSpec,
        references: &str,
        required: bool,
        raw: &SqlValue,
    ) -> ImportTaskResult<Result<SqlValue, SkipReason>> {
        // 空白文本与 NULL 同义
        let cleaned = data_cleaner::clean_text_value(raw);
        let Some(text) = cleaned else {
            return Ok(if required {
                Err(SkipReason::MissingForeignKeyValue {
                    column: col.source.clone(),
                })
            } else {
                Ok(SqlValue::Null)
            });
        };

        let referenced_id =
            text.trim()
                .parse::<i64>()
                .map_err(|_| ImportError::TypeConversion {
                    legacy_id,
                    column: col.source.clone(),
                    message: format!("外键值非整数: '{}'", text),
                })?;

        match self.id_map.resolve(references, referenced_id).await? {
            Some(dest_id) => Ok(Ok(SqlValue::Integer(dest_id))),
            None => Ok(Err(SkipReason::MissingReference {
                column: col.source.clone(),
                referenced_table: references.to_string(),
                referenced_id,
            })),
        }
    }

    fn extract_legacy_id(&self, row: &DumpRow) -> ImportTaskResult<i64> {
        let value = row
            .get(&self.spec.legacy_id_column, &self.spec.default_columns)
            .ok_or_else(|| ImportError::RowShape {
                offset: row.offset,
                message: format!(
                    "缺少 legacy 主键列 {} (表 {})",
                    self.spec.legacy_id_column, self.spec.source_table
                ),
            })?;
        value.as_integer().ok_or_else(|| ImportError::RowShape {
            offset: row.offset,
            message: format!(
                "legacy 主键非整数: {:?} (列 {})",
                value, self.spec.legacy_id_column
            ),
        })
    }
}

// ==========================================
// 遗留会员数据导入管道 - 导入协调器
// ==========================================
// 职责: 按静态依赖顺序调度各表导入，聚合运行结果
// 调度: 依赖分波（wave）——同波表之间无依赖关系，可并发；
//       波与波之间严格串行，保证依赖表的映射先行可见
// 失败语义: 某表硬失败 → 运行中止，后续表不启动；
//           已完成的表保持已提交状态（无跨表回滚）
// ==========================================

use crate::domain::run::{ImportRun, TableOutcome};
use crate::domain::table_spec::TableSpec;
use crate::importer::error::{ImportError, ImportTaskResult};
use crate::importer::table_importer::{ImporterSettings, TableImporter};
use crate::repository::destination_repo::DestinationStore;
use crate::repository::id_map_repo::IdentifierMap;
use crate::repository::run_log_repo::RunLogRepository;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// ImportCoordinator
// ==========================================
pub struct ImportCoordinator {
    /// 全量表配置，按依赖顺序排列（静态配置数据）
    specs: Vec<TableSpec>,
    dump_path: PathBuf,
    dest: Arc<dyn DestinationStore>,
    id_map: Arc<dyn IdentifierMap>,
    run_log: Arc<dyn RunLogRepository>,
    settings: ImporterSettings,
    abort: Arc<AtomicBool>,
}

impl ImportCoordinator {
    pub fn new(
        specs: Vec<TableSpec>,
        dump_path: PathBuf,
        dest: Arc<dyn DestinationStore>,
        id_map: Arc<dyn IdentifierMap>,
        run_log: Arc<dyn RunLogRepository>,
        settings: ImporterSettings,
    ) -> Self {
        Self {
            specs,
            dump_path,
            dest,
            id_map,
            run_log,
            settings,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取中止句柄（在批次边界生效）
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// 全量/选表导入
    ///
    /// - tables 为空时导入全部配置表
    /// - 选表时假定未选中的依赖表已由此前的运行建立过映射
    pub async fn run(&self, tables: &[String]) -> ImportTaskResult<ImportRun> {
        let selected = self.select_specs(tables)?;
        let waves = compute_waves(&selected)?;

        let mut run = ImportRun::new(Uuid::new_v4().to_string());
        tracing::info!(
            run_id = %run.run_id,
            tables = selected.len(),
            waves = waves.len(),
            dump = %self.dump_path.display(),
            "导入运行开始"
        );
        self.run_log.insert_run(&run).await?;

        let mut halted = false;
        for wave in &waves {
            if halted {
                // 前序硬失败: 剩余表标记为未启动
                for spec in wave {
                    run.outcomes
                        .push(TableOutcome::not_started(&spec.source_table, &spec.dest_table));
                }
                continue;
            }

            // 同波表无依赖关系，各自独立并发导入
            let importers: Vec<TableImporter> = wave
                .iter()
                .map(|spec| {
                    TableImporter::new(
                        (*spec).clone(),
                        self.dump_path.clone(),
                        self.dest.clone(),
                        self.id_map.clone(),
                        self.settings.clone(),
                        self.abort.clone(),
                    )
                })
                .collect();
            let outcomes = join_all(importers.iter().map(|imp| imp.import())).await;

            for outcome in outcomes {
                if outcome.is_hard_failure() {
                    halted = true;
                }
                run.outcomes.push(outcome);
            }
            if self.abort.load(Ordering::SeqCst) {
                halted = true;
            }
        }

        run.finalize();
        self.run_log.finalize_run(&run).await?;
        tracing::info!(
            run_id = %run.run_id,
            status = %run.status,
            imported = run.total_imported(),
            skipped = run.total_skipped(),
            "导入运行结束"
        );
        Ok(run)
    }

    /// 单表重导入: 级联清空 + 清除映射 + 依赖顺序重跑
    ///
    /// 受影响集合 = 该表 + 全部传递依赖它的表；清空按反依赖
    /// 顺序单事务执行，保证不会留下指向旧 id 的残余行。
    pub async fn reimport(&self, table: &str) -> ImportTaskResult<ImportRun> {
        let affected = self.affected_set(table)?;

        let dest_tables_reverse: Vec<String> = affected
            .iter()
            .rev()
            .map(|spec| spec.dest_table.clone())
            .collect();
        tracing::info!(
            table,
            affected = ?affected.iter().map(|s| s.source_table.as_str()).collect::<Vec<_>>(),
            "重导入: 清空目标表与映射"
        );
        self.dest.truncate(&dest_tables_reverse).await?;
        for spec in &affected {
            self.id_map.clear(&spec.source_table).await?;
        }

        let names: Vec<String> = affected
            .iter()
            .map(|spec| spec.source_table.clone())
            .collect();
        self.run(&names).await
    }

    // ===== 内部辅助 =====

    fn select_specs(&self, tables: &[String]) -> ImportTaskResult<Vec<&TableSpec>> {
        if tables.is_empty() {
            return Ok(self.specs.iter().collect());
        }
        let mut selected = Vec::new();
        for name in tables {
            let spec = self
                .specs
                .iter()
                .find(|s| s.source_table.eq_ignore_ascii_case(name))
                .ok_or_else(|| ImportError::UnknownTable(name.clone()))?;
            if !selected
                .iter()
                .any(|s: &&TableSpec| s.source_table == spec.source_table)
            {
                selected.push(spec);
            }
        }
        // 保持配置文件中的依赖顺序，与入参顺序无关
        selected.sort_by_key(|spec| {
            self.specs
                .iter()
                .position(|s| s.source_table == spec.source_table)
        });
        Ok(selected)
    }

    /// 该表及传递依赖它的所有表，按配置顺序
    fn affected_set(&self, table: &str) -> ImportTaskResult<Vec<&TableSpec>> {
        if !self
            .specs
            .iter()
            .any(|s| s.source_table.eq_ignore_ascii_case(table))
        {
            return Err(ImportError::UnknownTable(table.to_string()));
        }
        let mut affected: Vec<&str> = Vec::new();
        for spec in &self.specs {
            let hit = spec.source_table.eq_ignore_ascii_case(table)
                || spec
                    .depends_on
                    .iter()
                    .any(|dep| affected.iter().any(|a| a.eq_ignore_ascii_case(dep)));
            if hit {
                affected.push(spec.source_table.as_str());
            }
        }
        Ok(self
            .specs
            .iter()
            .filter(|s| affected.contains(&s.source_table.as_str()))
            .collect())
    }
}

/// 依赖分波: 每波只含依赖已全部满足的表
///
/// 只考虑选中集合内的依赖；选中集合外的依赖视为已满足。
fn compute_waves<'a>(selected: &[&'a TableSpec]) -> ImportTaskResult<Vec<Vec<&'a TableSpec>>> {
    let mut waves: Vec<Vec<&TableSpec>> = Vec::new();
    let mut placed: Vec<&str> = Vec::new();
    let mut remaining: Vec<&TableSpec> = selected.to_vec();

    while !remaining.is_empty() {
        let (ready, rest): (Vec<&TableSpec>, Vec<&TableSpec>) =
            remaining.iter().copied().partition(|spec| {
                spec.depends_on.iter().all(|dep| {
                    placed.iter().any(|p| p.eq_ignore_ascii_case(dep))
                        || !remaining
                            .iter()
                            .any(|r| r.source_table.eq_ignore_ascii_case(dep))
                })
            });
        if ready.is_empty() {
            let names: Vec<&str> = rest.iter().map(|s| s.source_table.as_str()).collect();
            return Err(ImportError::DependencyCycle(names.join(", ")));
        }
        for spec in &ready {
            placed.push(spec.source_table.as_str());
        }
        waves.push(ready);
        remaining = rest;
    }
    Ok(waves)
}

// ==========================================
// 遗留会员数据导入管道 - 命令行入口
// ==========================================
// 用法:
//   socios-import import <volcado.sql> [表名...] [--db <路径>] [--json]
//   socios-import reimport <volcado.sql> <表名> [--db <路径>] [--json]
//
// 退出码: 任一表硬失败或运行中止 → 1
// ==========================================

use socios_import::db::open_destination_db;
use socios_import::domain::default_table_specs;
use socios_import::domain::run::ImportRun;
use socios_import::domain::types::RunStatus;
use socios_import::importer::ImportCoordinator;
use socios_import::repository::{
    IdMapRepositoryImpl, RunLogRepositoryImpl, SqliteDestinationStore,
};
use socios_import::{logging, ConfigManager};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

struct CliArgs {
    command: String,
    dump_path: PathBuf,
    tables: Vec<String>,
    db_path: String,
    json: bool,
}

fn print_usage() {
    println!("{} v{}", socios_import::APP_NAME, socios_import::VERSION);
    println!();
    println!("用法:");
    println!("  socios-import import <volcado.sql> [表名...] [--db <路径>] [--json]");
    println!("  socios-import reimport <volcado.sql> <表名> [--db <路径>] [--json]");
    println!();
    println!("说明:");
    println!("  import    按依赖顺序导入指定表（不指定表名时导入全部配置表）");
    println!("  reimport  清空指定表及其级联依赖表后重新导入");
    println!("  --db      目标 SQLite 库路径（默认取 SOCIOS_IMPORT_DB_PATH 或用户数据目录）");
    println!("  --json    以 JSON 输出运行报告");
}

/// 目标库默认路径
///
/// 优先级: SOCIOS_IMPORT_DB_PATH 环境变量 > 用户数据目录 > 当前目录
fn default_db_path() -> String {
    if let Ok(path) = std::env::var("SOCIOS_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./socios_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        path = data_dir.join("socios-import");
        if std::fs::create_dir_all(&path).is_ok() {
            path = path.join("socios_import.db");
        } else {
            path = PathBuf::from("./socios_import.db");
        }
    }
    path.display().to_string()
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or("缺少子命令")?;
    if command != "import" && command != "reimport" {
        return Err(format!("未知子命令: {}", command));
    }

    let mut dump_path: Option<PathBuf> = None;
    let mut tables = Vec::new();
    let mut db_path: Option<String> = None;
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = Some(args.next().ok_or("--db 缺少参数")?);
            }
            "--json" => json = true,
            _ if dump_path.is_none() => dump_path = Some(PathBuf::from(arg)),
            _ => tables.push(arg.to_lowercase()),
        }
    }

    let dump_path = dump_path.ok_or("缺少转储文件路径")?;
    if command == "reimport" && tables.len() != 1 {
        return Err("reimport 需要且只需要一个表名".to_string());
    }

    Ok(CliArgs {
        command,
        dump_path,
        tables,
        db_path: db_path.unwrap_or_else(default_db_path),
        json,
    })
}

fn print_report(run: &ImportRun, json: bool) {
    if json {
        match serde_json::to_string_pretty(run) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("报告序列化失败: {}", e),
        }
        return;
    }

    println!();
    println!("==================================================");
    println!("导入运行报告  run_id={}", run.run_id);
    println!("状态: {}", run.status);
    println!("==================================================");
    for outcome in &run.outcomes {
        println!(
            "[{}] {} → {}: 导入 {} / 跳过 {} / 失败 {}",
            outcome.status,
            outcome.source_table,
            outcome.dest_table,
            outcome.imported,
            outcome.skipped,
            outcome.failed
        );
        for sample in &outcome.skip_samples {
            println!("    - legacy_id={}: {}", sample.legacy_id, sample.reason);
        }
        if let Some(error) = &outcome.error {
            println!("    ! {}", error);
        }
    }
    println!(
        "合计: 导入 {} / 跳过 {}",
        run.total_imported(),
        run.total_skipped()
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("参数错误: {}", msg);
            println!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("==================================================");
    tracing::info!("{}", socios_import::APP_NAME);
    tracing::info!("系统版本: {}", socios_import::VERSION);
    tracing::info!("==================================================");
    tracing::info!("转储文件: {}", cli.dump_path.display());
    tracing::info!("目标库: {}", cli.db_path);

    let conn = match open_destination_db(&cli.db_path) {
        Ok(conn) => Arc::new(Mutex::new(conn)),
        Err(e) => {
            eprintln!("无法打开目标库 {}: {}", cli.db_path, e);
            return ExitCode::FAILURE;
        }
    };

    let result = async {
        let dest = Arc::new(SqliteDestinationStore::from_connection(conn.clone())?);
        let id_map = Arc::new(IdMapRepositoryImpl::from_connection(conn.clone())?);
        let run_log = Arc::new(RunLogRepositoryImpl::from_connection(conn.clone())?);
        let settings = ConfigManager::from_connection(conn.clone())
            .and_then(|m| m.load_importer_settings())
            .map_err(|e| anyhow::anyhow!("配置加载失败: {}", e))?;

        let coordinator = ImportCoordinator::new(
            default_table_specs(),
            cli.dump_path.clone(),
            dest,
            id_map,
            run_log,
            settings,
        );

        // Ctrl+C → 在批次边界安全中止
        let abort = coordinator.abort_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("收到中止信号，将在批次边界停止");
                abort.store(true, Ordering::SeqCst);
            }
        });

        let run = match cli.command.as_str() {
            "import" => coordinator.run(&cli.tables).await?,
            _ => coordinator.reimport(&cli.tables[0]).await?,
        };
        Ok::<ImportRun, anyhow::Error>(run)
    }
    .await;

    match result {
        Ok(run) => {
            print_report(&run, cli.json);
            if run.status == RunStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("导入失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

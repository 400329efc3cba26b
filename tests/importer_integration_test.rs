// ==========================================
// 遗留会员数据导入管道 - 单表导入器集成测试
// ==========================================
// 覆盖: 编码归一化、外键跳过语义、批量提交、硬失败中止
// ==========================================


use socios_import::domain::types::{SkipReason, TableStatus};
use socios_import::importer::{ImporterSettings, TableImporter};
use socios_import::repository::{IdMapRepositoryImpl, IdentifierMap, SqliteDestinationStore};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

struct Fixture {
    _db: tempfile::NamedTempFile,
    conn: std::sync::Arc<std::sync::Mutex<rusqlite::Connection>>,
    dest: Arc<SqliteDestinationStore>,
    id_map: Arc<IdMapRepositoryImpl>,
}

fn setup() -> Fixture {
    let (_db, conn) = test_helpers::create_test_db().expect("创建测试数据库失败");
    let dest = Arc::new(SqliteDestinationStore::from_connection(conn.clone()).unwrap());
    let id_map = Arc::new(IdMapRepositoryImpl::from_connection(conn.clone()).unwrap());
    Fixture {
        _db,
        conn,
        dest,
        id_map,
    }
}

fn importer_for(
    fixture: &Fixture,
    table: &str,
    dump_path: &std::path::Path,
    settings: ImporterSettings,
) -> TableImporter {
    TableImporter::new(
        test_helpers::spec_for(table),
        dump_path.to_path_buf(),
        fixture.dest.clone(),
        fixture.id_map.clone(),
        settings,
        Arc::new(AtomicBool::new(false)),
    )
}

// ==========================================
// 规范场景: miembro 两行，编码 '00012' / '00000'
// ==========================================
#[tokio::test]
async fn test_miembro_codes_normalized_and_mappings_recorded() {
    let fixture = setup();
    let dump = test_helpers::write_dump(
        "INSERT INTO miembro (id, nombre, codigo) VALUES (1,'Ana','00012'),(2,'Bea','00000');",
    )
    .unwrap();

    let importer = importer_for(&fixture, "miembro", dump.path(), ImporterSettings::default());
    let outcome = importer.import().await;

    assert_eq!(outcome.status, TableStatus::Success);
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.skipped, 0);

    // 编码归一: '00012' → "12"，全零 '00000' → "0"（不是空串，不是 NULL）
    let rows = test_helpers::list_rows(&fixture.conn, "miembros", "codigo");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].1.as_deref(), Some("12"));
    assert_eq!(rows[1].1.as_deref(), Some("0"));

    // 映射登记: (miembro,1)→新id1, (miembro,2)→新id2
    let dest1 = fixture.id_map.resolve("miembro", 1).await.unwrap().unwrap();
    let dest2 = fixture.id_map.resolve("miembro", 2).await.unwrap().unwrap();
    assert_eq!(dest1, rows[0].0);
    assert_eq!(dest2, rows[1].0);
}

// ==========================================
// 外键跳过语义
// ==========================================
#[tokio::test]
async fn test_dangling_fk_skips_row_without_aborting_table() {
    let fixture = setup();
    // 依赖表先导入，建立 miembro 映射
    let miembro_dump = test_helpers::write_dump(
        "INSERT INTO miembro (id, nombre) VALUES (1,'Ana'),(2,'Bea');",
    )
    .unwrap();
    importer_for(&fixture, "miembro", miembro_dump.path(), ImporterSettings::default())
        .import()
        .await;

    let cuota_dump = test_helpers::write_dump(
        "INSERT INTO cuotaaniosocio (id, coduser, ejercicio, importe) VALUES \
         (10,1,2020,24.5),(11,99,2020,24.5),(12,2,2021,30),(13,NULL,2021,30);",
    )
    .unwrap();
    let outcome = importer_for(
        &fixture,
        "cuotaaniosocio",
        cuota_dump.path(),
        ImporterSettings::default(),
    )
    .import()
    .await;

    assert_eq!(outcome.status, TableStatus::Success);
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.failed, 0);

    // 跳过原因携带 legacy id，可诊断
    assert_eq!(outcome.skip_samples.len(), 2);
    assert_eq!(outcome.skip_samples[0].legacy_id, 11);
    assert!(matches!(
        outcome.skip_samples[0].reason,
        SkipReason::MissingReference { referenced_id: 99, .. }
    ));
    assert_eq!(outcome.skip_samples[1].legacy_id, 13);
    assert!(matches!(
        outcome.skip_samples[1].reason,
        SkipReason::MissingForeignKeyValue { .. }
    ));

    // 被跳过的行不产生映射
    assert!(fixture
        .id_map
        .resolve("cuotaaniosocio", 11)
        .await
        .unwrap()
        .is_none());
    assert!(fixture
        .id_map
        .resolve("cuotaaniosocio", 10)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_optional_fk_null_passes_through() {
    let fixture = setup();
    let dump = test_helpers::write_dump(
        "INSERT INTO miembro (id, nombre, codagrupacion) VALUES (1,'Ana',NULL);",
    )
    .unwrap();
    let outcome = importer_for(&fixture, "miembro", dump.path(), ImporterSettings::default())
        .import()
        .await;
    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.skipped, 0);

    let rows = test_helpers::list_rows(&fixture.conn, "miembros", "agrupacion_id");
    assert_eq!(rows[0].1, None);
}

// ==========================================
// 批量提交
// ==========================================
#[tokio::test]
async fn test_small_batch_size_flushes_multiple_batches() {
    let fixture = setup();
    let mut content = String::from("INSERT INTO miembro (id, nombre) VALUES ");
    for i in 1..=7 {
        if i > 1 {
            content.push(',');
        }
        content.push_str(&format!("({},'socio {}')", i, i));
    }
    content.push(';');
    let dump = test_helpers::write_dump(&content).unwrap();

    let settings = ImporterSettings {
        batch_size: 2,
        ..ImporterSettings::default()
    };
    let outcome = importer_for(&fixture, "miembro", dump.path(), settings)
        .import()
        .await;

    assert_eq!(outcome.imported, 7);
    assert_eq!(test_helpers::count_rows(&fixture.conn, "miembros"), 7);
    assert_eq!(fixture.id_map.count("miembro").await.unwrap(), 7);
}

// ==========================================
// 硬失败语义
// ==========================================
#[tokio::test]
async fn test_type_error_aborts_table_but_keeps_committed_batches() {
    let fixture = setup();
    importer_for(
        &fixture,
        "miembro",
        test_helpers::write_dump("INSERT INTO miembro (id, nombre) VALUES (1,'Ana');")
            .unwrap()
            .path(),
        ImporterSettings::default(),
    )
    .import()
    .await;

    // 第三行 ejercicio 非整数 → 硬失败；batch_size=1 使前两行已提交
    let dump = test_helpers::write_dump(
        "INSERT INTO cuotaaniosocio (id, coduser, ejercicio) VALUES \
         (10,1,2020),(11,1,2021),(12,1,'dosmil');",
    )
    .unwrap();
    let settings = ImporterSettings {
        batch_size: 1,
        ..ImporterSettings::default()
    };
    let outcome = importer_for(&fixture, "cuotaaniosocio", dump.path(), settings)
        .import()
        .await;

    assert_eq!(outcome.status, TableStatus::Failed);
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.error.is_some());

    // 已提交批次保留；失败批次不产生行也不产生映射
    assert_eq!(test_helpers::count_rows(&fixture.conn, "cuotas_anuales"), 2);
    assert_eq!(fixture.id_map.count("cuotaaniosocio").await.unwrap(), 2);
}

#[tokio::test]
async fn test_non_integer_legacy_id_is_hard_failure() {
    let fixture = setup();
    let dump = test_helpers::write_dump(
        "INSERT INTO miembro (id, nombre) VALUES ('abc','Ana');",
    )
    .unwrap();
    let outcome = importer_for(&fixture, "miembro", dump.path(), ImporterSettings::default())
        .import()
        .await;
    assert_eq!(outcome.status, TableStatus::Failed);
    assert_eq!(outcome.imported, 0);
    assert_eq!(test_helpers::count_rows(&fixture.conn, "miembros"), 0);
}

#[tokio::test]
async fn test_skip_sample_limit_caps_samples_not_counts() {
    let fixture = setup();
    let mut content = String::from("INSERT INTO cuotaaniosocio (id, coduser) VALUES ");
    for i in 1..=10 {
        if i > 1 {
            content.push(',');
        }
        content.push_str(&format!("({},{})", i, 900 + i)); // 全部悬空
    }
    content.push(';');
    let dump = test_helpers::write_dump(&content).unwrap();

    let settings = ImporterSettings {
        skip_sample_limit: 3,
        ..ImporterSettings::default()
    };
    let outcome = importer_for(&fixture, "cuotaaniosocio", dump.path(), settings)
        .import()
        .await;

    assert_eq!(outcome.skipped, 10);
    assert_eq!(outcome.skip_samples.len(), 3);
}

// ==========================================
// 遗留会员数据导入管道 - 表映射配置
// ==========================================
// 职责: 源表 → 目标表的静态映射（列类型、外键、依赖）
// 红线: 依赖顺序是静态配置数据，不做运行时反射推导
// ==========================================

/// 列的转换类型
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// 文本: trim 后空串归一为 NULL
    Text,
    /// 整数
    Integer,
    /// 浮点数
    Real,
    /// 地域编码: 去前导零，全零归一为 "0"（见 data_cleaner）
    TerritorialCode,
    /// 外键: 引用另一源表的 legacy id，经映射表换算为目标 id
    ForeignKey {
        /// 被引用的源表名
        references: String,
        /// 必填时 NULL 值导致该行跳过；悬空引用无论必填与否都跳过
        required: bool,
    },
}

/// 一个目标列的来源与转换方式
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// 源列名（转储语句中的列名，大小写不敏感）
    pub source: String,
    /// 目标列名
    pub dest: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(source: &str, dest: &str, kind: ColumnKind) -> Self {
        Self {
            source: source.to_string(),
            dest: dest.to_string(),
            kind,
        }
    }
}

/// 一张表的完整映射配置
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// 转储中的源表名
    pub source_table: String,
    /// 目标库表名
    pub dest_table: String,
    /// legacy 主键所在的源列名
    pub legacy_id_column: String,
    /// 语句未声明列清单时使用的默认列序
    pub default_columns: Vec<String>,
    /// 目标列映射
    pub columns: Vec<ColumnSpec>,
    /// 依赖的源表名（外键目标表，必须先于本表导入）
    pub depends_on: Vec<String>,
}

impl TableSpec {
    pub fn dest_column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.dest.clone()).collect()
    }
}

/// 默认表映射：遗留 MySQL 库的三张核心表，按依赖顺序排列
///
/// - agrupacionterritorial → agrupaciones（无依赖）
/// - miembro → miembros（可选外键 → agrupacionterritorial）
/// - cuotaaniosocio → cuotas_anuales（必填外键 → miembro）
pub fn default_table_specs() -> Vec<TableSpec> {
    vec![
        TableSpec {
            source_table: "agrupacionterritorial".to_string(),
            dest_table: "agrupaciones".to_string(),
            legacy_id_column: "codagrupacion".to_string(),
            default_columns: vec![
                "codagrupacion".to_string(),
                "nomagrupacion".to_string(),
                "ambito".to_string(),
                "cp".to_string(),
                "email".to_string(),
            ],
            columns: vec![
                // CODAGRUPACION 既是 legacy 主键又是带前导零的地域编码
                ColumnSpec::new("codagrupacion", "codigo", ColumnKind::TerritorialCode),
                ColumnSpec::new("nomagrupacion", "nombre", ColumnKind::Text),
                ColumnSpec::new("ambito", "ambito", ColumnKind::Text),
                ColumnSpec::new("cp", "codigo_postal", ColumnKind::Text),
                ColumnSpec::new("email", "email", ColumnKind::Text),
            ],
            depends_on: vec![],
        },
        TableSpec {
            source_table: "miembro".to_string(),
            dest_table: "miembros".to_string(),
            legacy_id_column: "id".to_string(),
            default_columns: vec![
                "id".to_string(),
                "nombre".to_string(),
                "apellidos".to_string(),
                "codigo".to_string(),
                "codagrupacion".to_string(),
                "fecha_alta".to_string(),
                "email".to_string(),
            ],
            columns: vec![
                ColumnSpec::new("nombre", "nombre", ColumnKind::Text),
                ColumnSpec::new("apellidos", "apellidos", ColumnKind::Text),
                ColumnSpec::new("codigo", "codigo", ColumnKind::TerritorialCode),
                ColumnSpec::new(
                    "codagrupacion",
                    "agrupacion_id",
                    ColumnKind::ForeignKey {
                        references: "agrupacionterritorial".to_string(),
                        required: false,
                    },
                ),
                ColumnSpec::new("fecha_alta", "fecha_alta", ColumnKind::Text),
                ColumnSpec::new("email", "email", ColumnKind::Text),
            ],
            depends_on: vec!["agrupacionterritorial".to_string()],
        },
        TableSpec {
            source_table: "cuotaaniosocio".to_string(),
            dest_table: "cuotas_anuales".to_string(),
            legacy_id_column: "id".to_string(),
            default_columns: vec![
                "id".to_string(),
                "coduser".to_string(),
                "codagrupacion".to_string(),
                "ejercicio".to_string(),
                "importe".to_string(),
                "estado".to_string(),
            ],
            columns: vec![
                ColumnSpec::new(
                    "coduser",
                    "miembro_id",
                    ColumnKind::ForeignKey {
                        references: "miembro".to_string(),
                        required: true,
                    },
                ),
                ColumnSpec::new(
                    "codagrupacion",
                    "agrupacion_id",
                    ColumnKind::ForeignKey {
                        references: "agrupacionterritorial".to_string(),
                        required: false,
                    },
                ),
                ColumnSpec::new("ejercicio", "ejercicio", ColumnKind::Integer),
                ColumnSpec::new("importe", "importe", ColumnKind::Real),
                ColumnSpec::new("estado", "estado", ColumnKind::Text),
            ],
            depends_on: vec![
                "miembro".to_string(),
                "agrupacionterritorial".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_specs_respect_dependency_order() {
        let specs = default_table_specs();
        for (i, spec) in specs.iter().enumerate() {
            for dep in &spec.depends_on {
                let dep_pos = specs
                    .iter()
                    .position(|s| &s.source_table == dep)
                    .expect("依赖表必须在默认配置中");
                assert!(dep_pos < i, "{} 必须排在 {} 之前", dep, spec.source_table);
            }
        }
    }

    #[test]
    fn test_default_specs_column_consistency() {
        for spec in default_table_specs() {
            // legacy 主键列必须出现在默认列序里
            assert!(spec
                .default_columns
                .iter()
                .any(|c| c == &spec.legacy_id_column));
            // 每个映射列的源列都要能按默认列序定位
            for col in &spec.columns {
                assert!(
                    spec.default_columns.iter().any(|c| c == &col.source),
                    "{}.{} 不在默认列序中",
                    spec.source_table,
                    col.source
                );
            }
        }
    }
}

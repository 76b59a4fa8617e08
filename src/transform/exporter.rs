// ==========================================
// EKAP 招标数据采集系统 - CSV 导出器
// ==========================================
// 输出: exports/projects.csv        扁平表（id + 全部字段键的有序并集）
//       exports/graph/*.csv         图数据库导入表（neo4j-admin 头格式）
// 规则: 节点按名称去重; 空表也写出表头
// ==========================================

use crate::domain::{DetailRecord, FieldValue};
use crate::transform::cleaner::{self, parsed_key};
use crate::transform::error::{TransformError, TransformResult};
use crate::transform::filter::{PROCEDURE_LABEL, STATUS_LABEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PROJECTS_FILE: &str = "projects.csv";
pub const GRAPH_DIR: &str = "graph";

// ===== 图关系使用的标签 =====
pub const WORK_NAME_LABEL: &str = "İşin Adı";
pub const ADMINISTRATION_LABEL: &str = "İdare Adı";
pub const SUPERVISING_LABEL: &str = "Bağlı Olduğu En Üst İdare";
pub const INTERMEDIATE_LABEL: &str = "Bağlı Olduğu İdare";

/// 导出清单（导出阶段的产物）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub generated_at: DateTime<Utc>,
    pub records: usize,
    /// 相对导出目录的文件路径
    pub files: Vec<String>,
}

/// 一张待写出的表
struct Table {
    name: &'static str,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &'static str, header: &[&str]) -> Self {
        Self {
            name,
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

// ==========================================
// CsvExporter - 导出器
// ==========================================
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    /// # 参数
    /// - dir: 导出目录（通常为 `<dataDir>/exports`）
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 导出全部表
    pub fn export(&self, records: &[DetailRecord]) -> TransformResult<ExportManifest> {
        let graph_dir = self.dir.join(GRAPH_DIR);
        fs::create_dir_all(&graph_dir).map_err(|e| TransformError::DirectoryError {
            path: graph_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();

        let projects = project_table(records);
        write_table(&self.dir.join(PROJECTS_FILE), &projects)?;
        files.push(PROJECTS_FILE.to_string());

        for table in graph_tables(records) {
            let file = format!("{}.csv", table.name);
            write_table(&graph_dir.join(&file), &table)?;
            files.push(format!("{}/{}", GRAPH_DIR, file));
        }

        info!(records = records.len(), files = files.len(), dir = %self.dir.display(), "导出完成");
        Ok(ExportManifest {
            generated_at: Utc::now(),
            records: records.len(),
            files,
        })
    }
}

fn write_table(path: &Path, table: &Table) -> TransformResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| TransformError::csv(path, e))?;
    writer
        .write_record(&table.header)
        .map_err(|e| TransformError::csv(path, e))?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| TransformError::csv(path, e))?;
    }
    writer.flush().map_err(|e| TransformError::csv(path, e))?;
    debug!(path = %path.display(), rows = table.rows.len(), "写出 CSV");
    Ok(())
}

/// 扁平表: id + 所有记录字段键的有序并集, 缺失单元为空
fn project_table(records: &[DetailRecord]) -> Table {
    let keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();

    let mut table = Table::new("projects", &["id"]);
    table.header.extend(keys.iter().map(|k| k.to_string()));
    table.rows = records
        .iter()
        .map(|r| {
            let mut row = Vec::with_capacity(keys.len() + 1);
            row.push(r.id.to_string());
            row.extend(
                keys.iter()
                    .map(|k| r.get(k).map(FieldValue::to_cell).unwrap_or_default()),
            );
            row
        })
        .collect();
    table
}

fn text(record: &DetailRecord, label: &str) -> Option<String> {
    record
        .find_text(label)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn cell(record: &DetailRecord, key: &str) -> String {
    record.get(key).map(FieldValue::to_cell).unwrap_or_default()
}

/// 图导入表: 节点 + 关系
fn graph_tables(records: &[DetailRecord]) -> Vec<Table> {
    let mut projects = Table::new(
        "projects",
        &[
            "ikn:ID(Project)",
            "name",
            "status",
            "estimate:float",
            "lowest_bid:float",
            "highest_bid:float",
            "location",
            "datetime",
            ":LABEL",
        ],
    );
    let mut administrations = BTreeSet::new();
    let mut supervising = BTreeSet::new();
    let mut intermediate = BTreeSet::new();
    let mut procedures = BTreeSet::new();
    let mut supervises = BTreeSet::new();
    let mut delegates = BTreeSet::new();
    let mut awards = BTreeSet::new();
    let mut uses_procedure = BTreeSet::new();

    for record in records {
        let ikn = record.id.to_string();
        projects.rows.push(vec![
            ikn.clone(),
            text(record, WORK_NAME_LABEL)
                .or_else(|| text(record, "title"))
                .unwrap_or_default(),
            text(record, STATUS_LABEL).unwrap_or_default(),
            cell(record, &parsed_key(cleaner::ESTIMATE)),
            cell(record, &parsed_key(cleaner::LOWEST_BID)),
            cell(record, &parsed_key(cleaner::HIGHEST_BID)),
            cell(record, cleaner::LOCATION),
            cell(record, cleaner::DATETIME),
            "Project".to_string(),
        ]);

        let admin = text(record, ADMINISTRATION_LABEL).or_else(|| text(record, "admin"));
        let top = text(record, SUPERVISING_LABEL);
        let middle = text(record, INTERMEDIATE_LABEL);

        if let Some(admin) = &admin {
            administrations.insert(admin.clone());
            awards.insert((admin.clone(), ikn.clone()));
        }
        if let Some(top) = &top {
            supervising.insert(top.clone());
        }
        if let Some(middle) = &middle {
            intermediate.insert(middle.clone());
        }
        if let (Some(top), Some(middle)) = (&top, &middle) {
            supervises.insert((top.clone(), middle.clone()));
        }
        if let (Some(middle), Some(admin)) = (&middle, &admin) {
            delegates.insert((middle.clone(), admin.clone()));
        }
        if let Some(procedure) = text(record, PROCEDURE_LABEL) {
            procedures.insert(procedure.clone());
            uses_procedure.insert((ikn.clone(), procedure));
        }
    }

    vec![
        projects,
        node_table("administrations", "Administration", administrations),
        node_table("supervising_administrations", "SupervisingAdministration", supervising),
        node_table(
            "intermediate_administrations",
            "IntermediateAdministration",
            intermediate,
        ),
        node_table("procedures", "Procedure", procedures),
        edge_table(
            "supervises",
            ("SupervisingAdministration", "IntermediateAdministration"),
            "SUPERVISES",
            supervises,
        ),
        edge_table(
            "delegates",
            ("IntermediateAdministration", "Administration"),
            "DELEGATES",
            delegates,
        ),
        edge_table("awards", ("Administration", "Project"), "AWARDS", awards),
        edge_table(
            "uses_procedure",
            ("Project", "Procedure"),
            "USES_PROCEDURE",
            uses_procedure,
        ),
    ]
}

fn node_table(name: &'static str, label: &str, names: BTreeSet<String>) -> Table {
    let id_header = format!("name:ID({})", label);
    let mut table = Table::new(name, &[id_header.as_str(), ":LABEL"]);
    table.rows = names
        .into_iter()
        .map(|n| vec![n, label.to_string()])
        .collect();
    table
}

/// 关系表, `ends` 为 (起点 ID 空间, 终点 ID 空间)
fn edge_table(
    name: &'static str,
    ends: (&str, &str),
    kind: &str,
    edges: BTreeSet<(String, String)>,
) -> Table {
    let (start, end) = ends;
    let start_header = format!(":START_ID({})", start);
    let end_header = format!(":END_ID({})", end);
    let mut table = Table::new(name, &[start_header.as_str(), end_header.as_str(), ":TYPE"]);
    table.rows = edges
        .into_iter()
        .map(|(s, e)| vec![s, e, kind.to_string()])
        .collect();
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordIdentifier, SectionKind, SentinelKind};
    use tempfile::TempDir;

    fn record(id: &str, admin: &str) -> DetailRecord {
        let mut r = DetailRecord::new(RecordIdentifier::parse(id).unwrap());
        r.insert(SectionKind::Administrative, ADMINISTRATION_LABEL, FieldValue::text(admin));
        r.insert(
            SectionKind::Administrative,
            SUPERVISING_LABEL,
            FieldValue::text("ÇEVRE, ŞEHİRCİLİK VE İKLİM DEĞİŞİKLİĞİ BAKANLIĞI"),
        );
        r.insert(
            SectionKind::Administrative,
            INTERMEDIATE_LABEL,
            FieldValue::text("HATAY VALİLİĞİ"),
        );
        r.insert(
            SectionKind::General,
            PROCEDURE_LABEL,
            FieldValue::text("Yapım - Pazarlık - Pazarlık (MD 21 B)"),
        );
        r
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_export_writes_all_tables_and_dedupes_nodes() {
        let dir = TempDir::new().unwrap();
        let exporter = CsvExporter::new(dir.path().join("exports"));
        let mut contractless = record("2023/2", "ANTAKYA BELEDİYESİ");
        contractless.mark_section(SectionKind::Contract, SentinelKind::SectionAbsent);
        let records = vec![record("2023/1", "ANTAKYA BELEDİYESİ"), contractless];

        let manifest = exporter.export(&records).unwrap();
        assert_eq!(manifest.records, 2);
        assert_eq!(manifest.files.len(), 10);
        assert!(manifest.files.contains(&"graph/awards.csv".to_string()));

        let admins = read_lines(&exporter.dir().join("graph/administrations.csv"));
        assert_eq!(admins.len(), 2);
        assert_eq!(admins[0], "name:ID(Administration),:LABEL");

        let awards = read_lines(&exporter.dir().join("graph/awards.csv"));
        assert_eq!(awards.len(), 3);

        let projects = read_lines(&exporter.dir().join(PROJECTS_FILE));
        assert!(projects[0].starts_with("id,"));
        assert!(projects[0].contains("contract"));
        assert!(projects[2].contains("N/A"));
    }

    #[test]
    fn test_empty_input_still_writes_headers() {
        let dir = TempDir::new().unwrap();
        let exporter = CsvExporter::new(dir.path());
        exporter.export(&[]).unwrap();

        let procedures = read_lines(&dir.path().join("graph/procedures.csv"));
        assert_eq!(procedures, vec!["name:ID(Procedure),:LABEL".to_string()]);
        let projects = read_lines(&dir.path().join(PROJECTS_FILE));
        assert_eq!(projects, vec!["id".to_string()]);
    }
}

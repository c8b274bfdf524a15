// ==========================================
// 设备预防性维护排程系统 - 设备台账 CSV 导入
// ==========================================
// 用途: 初始化/同步设备台账（CLI import-equipment）
// 流程: 读取 CSV → 逐行解析 → 文件内去重 → 单事务写入
// 说明: 无效行记入 rejected，不中断导入
// ==========================================

use crate::domain::equipment::Equipment;
use crate::domain::types::{EquipmentStatus, PriorityClass};
use crate::importer::error::ImportError;
use crate::repository::row_utils::{parse_date_text, parse_datetime_text};
use crate::repository::EquipmentRepository;
use chrono::{Local, NaiveDateTime};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// CSV 行（列名与 equipment 表一致）
#[derive(Debug, Clone, Deserialize)]
struct EquipmentCsvRow {
    bfm_equipment_no: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    monthly_pm: Option<String>,
    #[serde(default)]
    annual_pm: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_monthly_pm: Option<String>,
    #[serde(default)]
    last_annual_pm: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRejection {
    /// 数据行号（表头后从 1 起）
    pub row: usize,
    pub equipment_id: Option<String>,
    pub reason: String,
}

/// 导入汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<ImportRejection>,
}

// ==========================================
// EquipmentCsvImporter
// ==========================================
pub struct EquipmentCsvImporter {
    equipment_repo: Arc<EquipmentRepository>,
}

impl EquipmentCsvImporter {
    pub fn new(equipment_repo: Arc<EquipmentRepository>) -> Self {
        Self { equipment_repo }
    }

    /// 从文件导入
    pub fn import_file(&self, path: &Path) -> Result<ImportSummary, ImportError> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
            }
        }

        let file = File::open(path)?;
        self.import_reader(file)
    }

    /// 从任意输入流导入
    pub fn import_reader<R: Read>(&self, reader: R) -> Result<ImportSummary, ImportError> {
        let imported_at = Local::now().naive_local();
        let (equipment, rejected, total_rows) = Self::parse(reader, imported_at)?;

        let imported = self.equipment_repo.batch_upsert(&equipment)?;
        tracing::info!(
            total_rows,
            imported,
            rejected = rejected.len(),
            "设备台账导入完成"
        );

        Ok(ImportSummary {
            total_rows,
            imported,
            rejected,
        })
    }

    /// 解析 CSV，返回 (有效设备, 拒绝行, 数据行数)
    fn parse<R: Read>(
        reader: R,
        imported_at: NaiveDateTime,
    ) -> Result<(Vec<Equipment>, Vec<ImportRejection>, usize), ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if !headers.iter().any(|h| h == "bfm_equipment_no") {
            return Err(ImportError::MissingColumn("bfm_equipment_no".to_string()));
        }

        let mut equipment = Vec::new();
        let mut rejected = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut total_rows = 0;

        for (idx, result) in reader.deserialize::<EquipmentCsvRow>().enumerate() {
            let row_no = idx + 1;
            total_rows += 1;

            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    rejected.push(ImportRejection {
                        row: row_no,
                        equipment_id: None,
                        reason: format!("行解析失败: {}", e),
                    });
                    continue;
                }
            };

            let equipment_id = row.bfm_equipment_no.clone().unwrap_or_default();
            match Self::convert(row, imported_at) {
                Ok(e) if !seen.insert(e.equipment_id.clone()) => rejected.push(ImportRejection {
                    row: row_no,
                    equipment_id: Some(e.equipment_id),
                    reason: "文件内设备编号重复".to_string(),
                }),
                Ok(e) => equipment.push(e),
                Err(reason) => rejected.push(ImportRejection {
                    row: row_no,
                    equipment_id: Some(equipment_id).filter(|id| !id.is_empty()),
                    reason,
                }),
            }
        }

        Ok((equipment, rejected, total_rows))
    }

    fn convert(row: EquipmentCsvRow, imported_at: NaiveDateTime) -> Result<Equipment, String> {
        let equipment_id = row.bfm_equipment_no.unwrap_or_default().trim().to_string();
        if equipment_id.is_empty() {
            return Err("设备编号为空".to_string());
        }

        let priority = PriorityClass::from(row.priority.as_deref().unwrap_or(""));
        let status = match row.status.as_deref().map(str::trim) {
            None | Some("") => EquipmentStatus::Active,
            Some(raw) => raw.parse::<EquipmentStatus>()?,
        };

        let created_at = match row.created_at.as_deref().map(str::trim) {
            None | Some("") => imported_at,
            Some(raw) => parse_datetime_text(raw).ok_or_else(|| format!("建档时间无法解析: {}", raw))?,
        };

        Ok(Equipment {
            equipment_id,
            description: row.description.filter(|d| !d.trim().is_empty()),
            priority,
            supports_monthly: parse_flag(row.monthly_pm.as_deref())?,
            supports_annual: parse_flag(row.annual_pm.as_deref())?,
            status,
            last_monthly_date: row.last_monthly_pm.as_deref().and_then(parse_date_text),
            last_annual_date: row.last_annual_pm.as_deref().and_then(parse_date_text),
            created_at,
        })
    }
}

/// 能力标志: 1/0, Y/N, yes/no, true/false, x/空
fn parse_flag(raw: Option<&str>) -> Result<bool, String> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("n") | Some("no") | Some("false") => Ok(false),
        Some("1") | Some("y") | Some("yes") | Some("true") | Some("x") => Ok(true),
        Some(other) => Err(format!("PM 标志无法识别: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use rusqlite::Connection;
    use std::io::Write;
    use std::sync::Mutex;

    fn setup() -> (Arc<EquipmentRepository>, EquipmentCsvImporter) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = Arc::new(EquipmentRepository::new(Arc::new(Mutex::new(conn))));
        (repo.clone(), EquipmentCsvImporter::new(repo))
    }

    #[test]
    fn test_import_valid_and_rejected_rows() {
        let (repo, importer) = setup();
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "bfm_equipment_no,description,priority,monthly_pm,annual_pm,status,last_monthly_pm").unwrap();
        writeln!(file, "BFM-001,Chiller,P1,Y,Y,Active,2026-09-01").unwrap();
        writeln!(file, "BFM-002,Pump,2,1,0,,").unwrap();
        writeln!(file, "BFM-003,Fan,Critical,maybe,0,Active,").unwrap();
        writeln!(file, ",Orphan,P1,1,0,Active,").unwrap();
        writeln!(file, "BFM-001,Chiller again,P1,1,1,Active,").unwrap();

        let summary = importer.import_file(file.path()).unwrap();

        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.rejected.len(), 3);
        assert_eq!(summary.rejected[0].row, 3);
        assert!(summary.rejected[0].reason.contains("PM 标志"));
        assert!(summary.rejected[2].reason.contains("重复"));

        let chiller = repo.find_by_id("BFM-001").unwrap().unwrap();
        assert!(chiller.supports_annual);
        assert_eq!(chiller.description.as_deref(), Some("Chiller"));
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_unlisted_priority_imported_as_other() {
        let (repo, importer) = setup();
        let summary = importer
            .import_reader("bfm_equipment_no,priority,monthly_pm\nBFM-010,Low,1\nBFM-011,P4,1\n".as_bytes())
            .unwrap();

        assert_eq!(summary.imported, 2);
        assert!(summary.rejected.is_empty());
        let low = repo.find_by_id("BFM-010").unwrap().unwrap();
        assert_eq!(low.priority, PriorityClass::Other);
    }

    #[test]
    fn test_missing_id_column_rejected() {
        let (_repo, importer) = setup();
        let err = importer
            .import_reader("id,priority\nE1,P1\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let (_repo, importer) = setup();
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(matches!(
            importer.import_file(file.path()),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag(Some("x")), Ok(true));
        assert_eq!(parse_flag(None), Ok(false));
        assert!(parse_flag(Some("maybe")).is_err());
    }
}

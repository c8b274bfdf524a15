// ==========================================
// 设备预防性维护排程系统 - 命令行主入口
// ==========================================
// 子命令: init / import-equipment / generate / complete / history / stats / entries / config
// 输出: 结果 JSON 打印到 stdout，日志写 stderr
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use pm_scheduler::api::validator::week_containing;
use pm_scheduler::api::{ApiError, ScheduleApi};
use pm_scheduler::config::ConfigManager;
use pm_scheduler::db::{default_db_path, init_schema, open_shared_connection, DB_PATH_ENV};
use pm_scheduler::domain::Week;
use pm_scheduler::importer::EquipmentCsvImporter;
use pm_scheduler::repository::EquipmentRepository;
use pm_scheduler::{logging, APP_NAME, VERSION};

/// 设备预防性维护 (PM) 周排程工具
#[derive(Parser)]
#[command(name = "pm-scheduler", version)]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 初始化数据库表结构（幂等）
    Init,

    /// 从 CSV 导入设备台账
    ImportEquipment {
        /// CSV 文件路径
        file: PathBuf,
    },

    /// 重新生成指定周的排程
    Generate {
        /// 周起始日（周一，YYYY-MM-DD）；缺省为本周
        #[arg(long)]
        week: Option<String>,
    },

    /// 登记完工
    Complete {
        #[arg(long)]
        equipment: String,
        /// Monthly / Annual
        #[arg(long)]
        pm_type: String,
        /// 完工日期或日期时间
        #[arg(long)]
        date: String,
        #[arg(long)]
        technician: String,
    },

    /// 设备完工历史
    History {
        #[arg(long)]
        equipment: String,
    },

    /// 周完成率统计
    Stats {
        #[arg(long)]
        week: Option<String>,
    },

    /// 查询某周已落库的条目
    Entries {
        #[arg(long)]
        week: Option<String>,
    },

    /// 排程参数
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 打印全部 global 配置
    Show,
    /// 写入 global 配置
    Set { key: String, value: String },
}

/// 缺省周：今天所在周
fn resolve_week(raw: Option<String>) -> Result<String, ApiError> {
    match raw {
        Some(week) => Ok(week),
        None => {
            let today = Local::now().date_naive().format(Week::DATE_FORMAT).to_string();
            Ok(week_containing(&today)?.to_db_string())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    info!(version = VERSION, db_path = %db_path, "{}", APP_NAME);

    let conn = open_shared_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    {
        let guard = conn
            .lock()
            .map_err(|e| anyhow::anyhow!("数据库锁获取失败: {}", e))?;
        init_schema(&guard).context("schema 初始化失败")?;
    }

    match cli.command {
        Command::Init => {
            print_json(&json!({ "db_path": db_path, "initialized": true }))?;
        }
        Command::ImportEquipment { file } => {
            let importer = EquipmentCsvImporter::new(Arc::new(EquipmentRepository::new(conn)));
            let summary = importer.import_file(&file)?;
            print_json(&summary)?;
        }
        Command::Generate { week } => {
            let api = ScheduleApi::from_connection(conn)?;
            let report = api.generate_weekly_schedule(&resolve_week(week)?).await?;
            print_json(&report)?;
        }
        Command::Complete {
            equipment,
            pm_type,
            date,
            technician,
        } => {
            let api = ScheduleApi::from_connection(conn)?;
            let outcome = api.record_completion(&equipment, &pm_type, &date, &technician)?;
            print_json(&json!({
                "completion_id": outcome.completion_id,
                "retired_entry_id": outcome.retired_entry_id,
            }))?;
        }
        Command::History { equipment } => {
            let api = ScheduleApi::from_connection(conn)?;
            print_json(&api.completion_history(&equipment)?)?;
        }
        Command::Stats { week } => {
            let api = ScheduleApi::from_connection(conn)?;
            let stats = api.week_stats(&resolve_week(week)?)?;
            print_json(&json!({
                "stats": stats,
                "completion_rate": stats.completion_rate(),
            }))?;
        }
        Command::Entries { week } => {
            let api = ScheduleApi::from_connection(conn)?;
            print_json(&api.week_entries(&resolve_week(week)?)?)?;
        }
        Command::Config { action } => {
            let manager = ConfigManager::from_connection(conn)
                .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?;
            match action {
                ConfigAction::Show => {
                    let snapshot = manager
                        .get_config_snapshot()
                        .map_err(|e| anyhow::anyhow!("读取配置失败: {}", e))?;
                    println!("{}", snapshot);
                }
                ConfigAction::Set { key, value } => {
                    manager
                        .set_global_value(&key, &value)
                        .map_err(|e| anyhow::anyhow!("写入配置失败: {}", e))?;
                    info!(key = %key, "配置已更新");
                }
            }
        }
    }

    Ok(())
}

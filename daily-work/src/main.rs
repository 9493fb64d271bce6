use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use daily_work::console::{ConsoleCommand, HELP, execute, parse_command};
use daily_work::logger::init_logger;
use daily_work::{AutoSaveConfig, AutoSaveEngine, EngineEvent, NoticeLevel};
use report_client::{ClientConfig, InMemoryReportStore, ReportStore};
use shared::EmployeeProfile;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "daily-work", version, about = "Edit a daily work plan with auto-save")]
struct Args {
    /// Employee whose report is edited
    #[arg(long, env = "DAILY_WORK_EMPLOYEE_ID")]
    employee_id: i64,

    #[arg(long, env = "DAILY_WORK_DEPARTMENT_ID")]
    department_id: Option<i64>,

    #[arg(long, env = "DAILY_WORK_DEPARTMENT_CODE")]
    department_code: Option<String>,

    #[arg(long, env = "DAILY_WORK_GROUP_CODE")]
    group_code: Option<String>,

    /// Report date (yyyy-mm-dd), defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<NaiveDate>,

    /// Keep reports in memory instead of the hosted table
    #[arg(long)]
    memory: bool,

    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for daily-rolling log files; logs go to stderr otherwise
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<String>,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    shared::util::parse_date(value).ok_or_else(|| format!("invalid date `{value}`, expected yyyy-mm-dd"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logger(args.log_level.as_deref(), args.log_dir.as_deref());

    let store: Arc<dyn ReportStore> = if args.memory {
        tracing::info!("Using in-memory report store");
        Arc::new(InMemoryReportStore::new())
    } else {
        let config = ClientConfig::from_env().context("report store configuration")?;
        tracing::info!(table = %config.table, "Using hosted report store");
        Arc::new(config.build_rest_store()?)
    };

    let employee = EmployeeProfile::new(args.employee_id)
        .with_department(args.department_id, args.department_code)
        .with_group(args.group_code);
    let date = args.date.unwrap_or_else(shared::util::today);

    let (handle, worker) = AutoSaveEngine::spawn(store, employee, date, AutoSaveConfig::from_env());
    let printer = tokio::spawn(print_events(handle.subscribe()));

    println!("Editing {date}. Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit = false;
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        quit = command == ConsoleCommand::Quit;
        match execute(&handle, command).await {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
        if quit {
            break;
        }
    }

    // Stdin closed without `quit`
    if !quit {
        handle.shutdown().await?;
    }
    drop(handle);
    worker.await.context("auto-save worker panicked")?;
    printer.abort();
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::Status { status }) => println!("[status] {status:?}"),
            Ok(EngineEvent::Notice(notice)) => {
                let tag = match notice.level {
                    NoticeLevel::Error => "error",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Info => "info",
                };
                println!("[{tag}] {}", notice.message);
            }
            Ok(EngineEvent::FocusLink { key }) => {
                println!("[focus] slot {} link {}", key.item + 1, key.link + 1)
            }
            Ok(EngineEvent::Loaded { date, record_id }) => match record_id {
                Some(id) => println!("[loaded] {date}, report #{id}"),
                None => println!("[loaded] {date}, no report yet"),
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("Event printer lagged {n} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

//! Line-oriented console front end
//!
//! Slots and links are 1-based at the prompt and converted to 0-based edits.

use std::fmt::Write as _;

use thiserror::Error;

use crate::editor::{DateTarget, Edit};
use crate::engine::{DateSwitch, EngineHandle};
use crate::error::SaveResult;
use crate::state::SessionSnapshot;

pub const HELP: &str = "\
commands:
  plan <slot> <text>          set the plan of a slot (1-10)
  result <slot> <text>        set the result of a slot
  link <slot> <n> <url>       set link n (1-3) of a slot
  add-link <slot>             append an empty link
  remove-link <slot> <n>      remove link n
  blur                        leave the current field (saves immediately)
  save                        save now
  date <yyyy-mm-dd> [--discard]
  prev | next | today [--discard]
                              switch date, saving unsaved edits unless --discard
  refresh                     reload the selected date
  hide | show                 editor hidden / visible again
  leave                       navigate away (forced save)
  status                      show the current report
  quit                        flush and exit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("unknown command: {0} (type `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid date: {0} (expected yyyy-mm-dd)")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Edit(Edit),
    Blur,
    Save,
    SwitchDate { target: DateTarget, mode: DateSwitch },
    Refresh,
    Hide,
    Show,
    Leave,
    Status,
    Help,
    Quit,
}

/// 1-based index at the prompt to 0-based
fn index(value: Option<&str>, usage: &'static str) -> Result<usize, ConsoleError> {
    let value = value.ok_or(ConsoleError::Usage(usage))?;
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ConsoleError::InvalidNumber(value.to_string())),
    }
}

fn switch_mode(rest: &str) -> DateSwitch {
    if rest.split_whitespace().any(|arg| arg == "--discard") {
        DateSwitch::Discard
    } else {
        DateSwitch::SaveFirst
    }
}

/// Parse one input line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match name {
        "plan" | "result" => {
            const USAGE: &str = "plan|result <slot> <text>";
            let (slot, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let slot = index(Some(slot).filter(|s| !s.is_empty()), USAGE)?;
            let text = text.trim().to_string();
            ConsoleCommand::Edit(if name == "plan" {
                Edit::Plan { slot, text }
            } else {
                Edit::Result { slot, text }
            })
        }
        "link" => {
            const USAGE: &str = "link <slot> <n> <url>";
            let mut args = rest.splitn(3, char::is_whitespace);
            let slot = index(args.next().filter(|s| !s.is_empty()), USAGE)?;
            let link = index(args.next(), USAGE)?;
            let url = args.next().unwrap_or("").trim().to_string();
            ConsoleCommand::Edit(Edit::Link { slot, link, url })
        }
        "add-link" => {
            let slot = index(rest.split_whitespace().next(), "add-link <slot>")?;
            ConsoleCommand::Edit(Edit::AddLink { slot })
        }
        "remove-link" => {
            const USAGE: &str = "remove-link <slot> <n>";
            let mut args = rest.split_whitespace();
            let slot = index(args.next(), USAGE)?;
            let link = index(args.next(), USAGE)?;
            ConsoleCommand::Edit(Edit::RemoveLink { slot, link })
        }
        "date" => {
            let value = rest
                .split_whitespace()
                .next()
                .ok_or(ConsoleError::Usage("date <yyyy-mm-dd> [--discard]"))?;
            let date = shared::util::parse_date(value)
                .ok_or_else(|| ConsoleError::InvalidDate(value.to_string()))?;
            ConsoleCommand::SwitchDate {
                target: DateTarget::Exact(date),
                mode: switch_mode(rest),
            }
        }
        "prev" | "next" | "today" => ConsoleCommand::SwitchDate {
            target: match name {
                "prev" => DateTarget::Previous,
                "next" => DateTarget::Next,
                _ => DateTarget::Today,
            },
            mode: switch_mode(rest),
        },
        "blur" => ConsoleCommand::Blur,
        "save" => ConsoleCommand::Save,
        "refresh" => ConsoleCommand::Refresh,
        "hide" => ConsoleCommand::Hide,
        "show" => ConsoleCommand::Show,
        "leave" => ConsoleCommand::Leave,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Run a command against the engine, returning text to print
pub async fn execute(handle: &EngineHandle, command: ConsoleCommand) -> SaveResult<Option<String>> {
    match command {
        ConsoleCommand::Edit(edit) => handle.edit(edit).await?,
        ConsoleCommand::Blur => handle.blur().await?,
        ConsoleCommand::Save => {
            let record = handle.save_now().await?;
            return Ok(Some(match record {
                Some(r) => format!("saved report #{} ({} items)", r.id, r.items.len()),
                None => "nothing to save".to_string(),
            }));
        }
        ConsoleCommand::SwitchDate { target, mode } => {
            let date = match target {
                DateTarget::Exact(date) => handle.select_date(date, mode).await?,
                DateTarget::Previous => handle.previous_day(mode).await?,
                DateTarget::Next => handle.next_day(mode).await?,
                DateTarget::Today => handle.today(mode).await?,
            };
            return Ok(Some(format!("now editing {date}")));
        }
        ConsoleCommand::Refresh | ConsoleCommand::Show => handle.refresh().await?,
        ConsoleCommand::Hide => handle.hidden().await?,
        ConsoleCommand::Leave => handle.navigate_away().await?,
        ConsoleCommand::Status => return Ok(Some(render_snapshot(&handle.snapshot().await?))),
        ConsoleCommand::Help => return Ok(Some(HELP.to_string())),
        ConsoleCommand::Quit => handle.shutdown().await?,
    }
    Ok(None)
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let record = snapshot
        .record_id
        .map_or_else(|| "not saved yet".to_string(), |id| format!("report #{id}"));
    let _ = writeln!(
        out,
        "{} (employee {}), {record}, status {:?}{}",
        snapshot.date,
        snapshot.employee_id,
        snapshot.status,
        if snapshot.dirty { ", unsaved changes" } else { "" },
    );
    if !snapshot.loaded {
        let _ = writeln!(out, "  not loaded; `refresh` to retry");
    }

    for (slot, item) in snapshot.items.iter().enumerate() {
        if item.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {:>2}. plan:   {}", slot + 1, item.plan);
        let _ = writeln!(out, "      result: {}", item.result);
        for (link, url) in item.links.iter().enumerate() {
            let flag = if snapshot
                .link_errors
                .iter()
                .any(|key| key.item == slot && key.link == link)
            {
                " (invalid)"
            } else {
                ""
            };
            let _ = writeln!(out, "      link {}: {url}{flag}", link + 1);
        }
    }

    let m = snapshot.metrics;
    let _ = write!(
        out,
        "  saves: {} total, {} ok, {} failed, {} retries",
        m.total, m.successful, m.failed, m.retries
    );
    out
}

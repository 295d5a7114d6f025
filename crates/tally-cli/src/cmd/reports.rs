//! `tally report`: submit, edit and review daily reports.

use std::io::{self, Write};

use clap::{Args, Subcommand};
use serde_json::json;
use tally_core::Session;
use tally_core::filter::Predicates;
use tally_core::model::{EntityId, Report};
use tally_core::reports::Submitted;
use tally_core::workflow::ReportStatus;

use super::{Context, parse_bound, parse_state};
use crate::output::{Renderable, clip, pretty_kv, pretty_section, render, render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    #[command(
        about = "List your reports, newest first",
        after_help = "EXAMPLES:\n    # Everything you have submitted\n    tally report list\n\n    # Completed reports since the first of the month\n    tally report list --status completed --from 2024-05-01"
    )]
    List(ListArgs),

    #[command(
        about = "Submit a new report",
        after_help = "EXAMPLES:\n    tally report submit \"Fixed the login redirect\""
    )]
    Submit(SubmitArgs),

    #[command(
        about = "Replace a report's content",
        after_help = "EXAMPLES:\n    tally report edit rpt-3f2a9c01de \"Fixed the login redirect and its test\""
    )]
    Edit(EditArgs),

    #[command(
        about = "Move a report to another status",
        after_help = "EXAMPLES:\n    tally report status rpt-3f2a9c01de \"in progress\""
    )]
    Status(StatusArgs),

    #[command(
        about = "Set the remark on a report",
        after_help = "EXAMPLES:\n    # Review a teammate's report\n    tally report remark rpt-3f2a9c01de \"Looks good\" --of alice"
    )]
    Remark(RemarkArgs),

    #[command(
        about = "Delete a report",
        after_help = "EXAMPLES:\n    tally report delete rpt-3f2a9c01de"
    )]
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only reports in this status: todo, "in progress", completed, maintaining.
    #[arg(short, long)]
    pub status: Option<String>,

    /// Submitted at or after this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub from: Option<String>,

    /// Submitted at or before this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Report text.
    pub content: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Report ID.
    pub id: String,

    /// Replacement text.
    pub content: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Report ID.
    pub id: String,

    /// Target status.
    pub status: String,
}

#[derive(Args, Debug)]
pub struct RemarkArgs {
    /// Report ID.
    pub id: String,

    /// Remark text. An empty string clears the remark.
    pub text: String,

    /// Owner of the report, when it is not your own.
    #[arg(long, value_name = "USER")]
    pub of: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Report ID.
    pub id: String,
}

impl Renderable for Report {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("{}  [{}]", self.id, self.status.get()))?;
        pretty_kv(w, "Submitted", submitted_at(self))?;
        pretty_kv(w, "Remark", self.display_remark())?;
        writeln!(w)?;
        writeln!(w, "{}", self.content)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id,
            self.status.get(),
            submitted_at(self),
            clip(&self.content, 48),
            clip(self.display_remark(), 32)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATUS", "SUBMITTED", "CONTENT", "REMARK"]
    }
}

fn submitted_at(report: &Report) -> String {
    report
        .timestamp()
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Dispatch one `tally report` subcommand.
///
/// # Errors
///
/// Returns the first core or argument error; the caller renders it.
pub async fn run_report(command: &ReportCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        ReportCommand::List(args) => run_list(args, ctx).await,
        ReportCommand::Submit(args) => run_submit(args, ctx).await,
        ReportCommand::Edit(args) => run_edit(args, ctx).await,
        ReportCommand::Status(args) => run_status(args, ctx).await,
        ReportCommand::Remark(args) => run_remark(args, ctx).await,
        ReportCommand::Delete(args) => run_delete(args, ctx).await,
    }
}

async fn open(ctx: &Context, owner: Option<&str>) -> anyhow::Result<Session> {
    let user_id = match owner {
        Some(owner) => owner.to_string(),
        None => ctx.require_user()?,
    };
    let session = ctx.session(user_id);
    session.reports().fetch().await?;
    Ok(session)
}

fn current(session: &Session, id: &EntityId) -> Option<Report> {
    session.view().read(|state| state.report(id).cloned())
}

fn render_current(session: &Session, id: &EntityId, ctx: &Context) -> anyhow::Result<()> {
    match current(session, id) {
        Some(report) => render_item(&report, ctx.output),
        None => Ok(()),
    }
}

async fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let predicates = Predicates {
        start_date: parse_bound(args.from.as_deref())?,
        end_date: parse_bound(args.to.as_deref())?,
        state: args
            .status
            .as_deref()
            .map(parse_state::<ReportStatus>)
            .transpose()?,
    };

    let session = open(ctx, None).await?;
    let board = session.reports();
    board.set_filters(predicates);
    let reports = board.visible();

    let empty = if predicates.is_empty() {
        "No reports yet."
    } else {
        predicates.no_match_message()
    };
    render_list(&reports, ctx.output, empty)
}

async fn run_submit(args: &SubmitArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open(ctx, None).await?;
    let board = session.reports();
    board.set_content(args.content.as_str());
    match board.submit().await? {
        Submitted::Created(report) => render_item(&report, ctx.output),
        Submitted::Updated(id) => render_current(&session, &id, ctx),
    }
}

async fn run_edit(args: &EditArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open(ctx, None).await?;
    let board = session.reports();
    let id = EntityId::new(args.id.as_str());
    board.begin_edit(&id)?;
    board.set_content(args.content.as_str());
    board.submit().await?;
    render_current(&session, &id, ctx)
}

async fn run_status(args: &StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    let status = parse_state::<ReportStatus>(&args.status)?;
    let session = open(ctx, None).await?;
    let id = EntityId::new(args.id.as_str());
    session.reports().change_status(&id, status).await?;
    render_current(&session, &id, ctx)
}

async fn run_remark(args: &RemarkArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open(ctx, args.of.as_deref()).await?;
    let id = EntityId::new(args.id.as_str());
    session
        .reports()
        .remarks()
        .submit_remark(&id, args.text.as_str())
        .await?;
    render_current(&session, &id, ctx)
}

async fn run_delete(args: &DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open(ctx, None).await?;
    let id = EntityId::new(args.id.as_str());
    session.reports().delete(&id).await?;
    render(ctx.output, &json!({ "ok": true, "id": id }), |_, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn list_args_defaults() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ListArgs,
        }
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.status.is_none());
        assert!(w.args.from.is_none());
        assert!(w.args.to.is_none());
    }

    #[test]
    fn table_row_is_one_line() {
        let report = Report::new("r1", "u1", "line one\nline two")
            .with_created_at(Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap());
        let mut buf = Vec::new();
        report.render_table(&mut buf).unwrap();
        let row = String::from_utf8(buf).unwrap();
        assert_eq!(row, "r1\tTodo\t2024-05-02 09:30\tline one line two\tNo remark yet\n");
    }

    #[test]
    fn human_block_shows_remark_placeholder() {
        let report = Report::new("r1", "u1", "standup");
        let mut buf = Vec::new();
        report.render_human(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("r1  [Todo]\n"));
        assert!(text.contains("Submitted:   -"));
        assert!(text.contains("Remark:      No remark yet"));
    }
}

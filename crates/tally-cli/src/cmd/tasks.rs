//! `tally task`: browse team tasks, move stages, trash.

use std::io::{self, Write};

use clap::{Args, Subcommand};
use serde_json::json;
use tally_core::Session;
use tally_core::filter::Predicates;
use tally_core::model::{EntityId, MemberSummary, Task};
use tally_core::workflow::Stage;
use tracing::info;

use super::{Context, confirm, parse_bound, parse_state};
use crate::output::{Renderable, clip, pretty_kv, pretty_section, render, render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(
        about = "List tasks that are not in the trash",
        after_help = "EXAMPLES:\n    # Everything still in play\n    tally task list\n\n    # Work in progress assigned since Monday\n    tally task list --stage \"in progress\" --from 2024-05-06"
    )]
    List(ListArgs),

    #[command(
        about = "Move a task to another stage",
        after_help = "EXAMPLES:\n    tally task stage 66a1 completed"
    )]
    Stage(StageArgs),

    #[command(
        about = "Move a task to the trash",
        after_help = "EXAMPLES:\n    # Asks for confirmation on a terminal\n    tally task trash 66a1\n\n    # Skip the prompt\n    tally task trash 66a1 --force"
    )]
    Trash(TrashArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only tasks in this stage: todo, "in progress", completed.
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Assigned at or after this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub from: Option<String>,

    /// Assigned at or before this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug)]
pub struct StageArgs {
    /// Task ID.
    pub id: String,

    /// Target stage.
    pub stage: String,
}

#[derive(Args, Debug)]
pub struct TrashArgs {
    /// Task ID.
    pub id: String,

    /// Skip interactive confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

impl Renderable for Task {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, self.display_title())?;
        pretty_kv(w, "ID", self.id.as_str())?;
        pretty_kv(w, "Stage", self.stage.to_string())?;
        pretty_kv(w, "Assigned", day(self.created_at))?;
        pretty_kv(w, "Due", day(self.date))?;
        if !self.team.is_empty() {
            let names: Vec<&str> = self.team.iter().map(|m| m.name.as_str()).collect();
            pretty_kv(w, "Team", names.join(", "))?;
        }
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let initials: Vec<String> = self.team.iter().map(MemberSummary::initials).collect();
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id,
            self.stage.get(),
            day(self.created_at),
            clip(self.display_title(), 48),
            initials.join(" ")
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STAGE", "ASSIGNED", "TITLE", "TEAM"]
    }
}

fn day(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string())
}

/// Dispatch one `tally task` subcommand.
///
/// # Errors
///
/// Returns the first core or argument error; the caller renders it.
pub async fn run_task(command: &TaskCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        TaskCommand::List(args) => run_list(args, ctx).await,
        TaskCommand::Stage(args) => run_stage(args, ctx).await,
        TaskCommand::Trash(args) => run_trash(args, ctx).await,
    }
}

async fn open(ctx: &Context) -> anyhow::Result<Session> {
    let session = ctx.session(ctx.user_or_anonymous());
    session.tasks().fetch().await?;
    Ok(session)
}

async fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let predicates = Predicates {
        start_date: parse_bound(args.from.as_deref())?,
        end_date: parse_bound(args.to.as_deref())?,
        state: args
            .stage
            .as_deref()
            .map(parse_state::<Stage>)
            .transpose()?,
    };

    let session = open(ctx).await?;
    let board = session.tasks();
    board.set_filters(predicates);
    let tasks = board.visible();

    let empty = if predicates.is_empty() {
        "No tasks yet."
    } else {
        predicates.no_match_message()
    };
    render_list(&tasks, ctx.output, empty)
}

async fn run_stage(args: &StageArgs, ctx: &Context) -> anyhow::Result<()> {
    let stage = parse_state::<Stage>(&args.stage)?;
    let session = open(ctx).await?;
    let id = EntityId::new(args.id.as_str());
    session.tasks().change_stage(&id, stage).await?;
    match session.view().read(|state| state.task(&id).cloned()) {
        Some(task) => render_item(&task, ctx.output),
        None => Ok(()),
    }
}

async fn run_trash(args: &TrashArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open(ctx).await?;
    let trash = session.tasks().trash();
    let id = EntityId::new(args.id.as_str());
    trash.request_trash(id.clone());

    let ask = ctx.config.project.session.confirm_trash && !args.force;
    if ask {
        let title = session
            .view()
            .read(|state| state.task(&id).map(|task| task.display_title().to_string()))
            .unwrap_or_default();
        if !confirm(&format!("Move {id} '{title}' to the trash?"))? {
            trash.cancel();
            info!(task = %id, "trash cancelled at prompt");
            return render(
                ctx.output,
                &json!({ "ok": false, "id": id, "cancelled": true }),
                |_, w| writeln!(w, "Trash cancelled."),
            );
        }
    }

    trash.confirm().await?;
    render(ctx.output, &json!({ "ok": true, "id": id }), |_, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn trash_args_default_to_prompting() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: TrashArgs,
        }
        let w = Wrapper::parse_from(["test", "66a1"]);
        assert_eq!(w.args.id, "66a1");
        assert!(!w.args.force);
    }

    #[test]
    fn table_row_uses_placeholders() {
        let mut task = Task::new("t1").with_stage(Stage::InProgress);
        task.team.push(MemberSummary {
            id: EntityId::from("m1"),
            name: "Ada Lovelace".to_string(),
            title: None,
            role: None,
        });
        let mut buf = Vec::new();
        task.render_table(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "t1\tin progress\t-\tNo title\tAL\n"
        );
    }

    #[test]
    fn human_block_lists_dates() {
        let task = Task::new("t1")
            .with_title("Ship onboarding")
            .with_created_at(Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap());
        let mut buf = Vec::new();
        task.render_human(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Ship onboarding\n"));
        assert!(text.contains("Assigned:    2024-01-03"));
        assert!(text.contains("Due:         -"));
    }
}

use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::StoreError;
use crate::datetime;
use crate::filter::ViewMode;
use crate::render::Renderer;
use crate::session::Session;
use crate::ticker::{DEFAULT_STOP_TIMEOUT, ReminderTicker, TickerEvent};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "today", "future", "done", "cancel", "rate", "watch", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(session, cfg, renderer, inv))]
pub fn dispatch(
    session: &mut Session,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(session, &inv.command_args),
        "today" => cmd_list(session, renderer, ViewMode::Today),
        "future" => cmd_list(session, renderer, ViewMode::Future),
        "done" => cmd_done(session, renderer, &inv.command_args),
        "cancel" => cmd_cancel(session, &inv.command_args),
        "rate" => cmd_rate(session, renderer),
        "watch" => cmd_watch(session, cfg, renderer, &inv.command_args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Split a `date:VALUE` attribute token out of the argument words; the
/// remainder joins into the task text. The last attribute wins.
fn split_date_attr(args: &[String]) -> (String, Option<String>) {
    let mut words = Vec::new();
    let mut date = None;

    for arg in args {
        if let Some(value) = arg.strip_prefix("date:") {
            date = Some(value.to_string());
        } else {
            words.push(arg.as_str());
        }
    }

    (words.join(" "), date)
}

#[instrument(skip(session, args))]
fn cmd_add(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let (text, date_attr) = split_date_attr(args);
    let date = match date_attr {
        Some(raw) => datetime::normalize_selected_date(&raw),
        None => session.today().to_string(),
    };

    match session.add(&text, &date) {
        Ok(()) => {
            println!("Added \"{}\" for {date}.", text.trim());
            Ok(())
        }
        Err(StoreError::EmptyInput) => {
            // Recovered locally: no record, no failure exit.
            debug!("empty task text; nothing added");
            println!("No task text given; nothing added.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip(session, renderer))]
fn cmd_list(session: &mut Session, renderer: &mut Renderer, mode: ViewMode) -> anyhow::Result<()> {
    info!(mode = mode.label(), "command list");

    session.set_mode(mode)?;
    match mode {
        ViewMode::Today => renderer.print_today_list(&session.list_today()?),
        ViewMode::Future => renderer.print_future_table(&session.list_future()?),
    }
}

#[instrument(skip(session, renderer, args))]
fn cmd_done(session: &mut Session, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command done");

    if args.is_empty() {
        bail!("done requires the task text");
    }
    let text = args.join(" ");

    session.set_mode(ViewMode::Today)?;
    let removed = session.remove_today(&text)?;
    if removed == 0 {
        println!("No task \"{text}\" scheduled for today.");
        return Ok(());
    }

    println!("Great job, you completed: {text}");
    match session.list_today()?.first() {
        Some(next) => println!("Your next task is: {next}"),
        None => println!("There's nothing next."),
    }

    renderer.print_completion(session.completion()?)
}

#[instrument(skip(session, args))]
fn cmd_cancel(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    info!("command cancel");

    if args.is_empty() {
        bail!("cancel requires the task text");
    }
    let (text, date_attr) = split_date_attr(args);

    session.set_mode(ViewMode::Future)?;
    let removed = match date_attr {
        Some(raw) => {
            let date = datetime::normalize_selected_date(&raw);
            session.remove_future(&text, &date)?
        }
        // Without an explicit date the text is taken as a raw display
        // row, the form a selection widget hands back.
        None => session.remove_display_row(&text)?,
    };

    if removed == 0 {
        println!("No matching future task; give its date as date:YYYY-MM-DD.");
    } else {
        println!("The task has been cancelled.");
    }
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_rate(session: &mut Session, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command rate");
    renderer.print_completion(session.completion()?)
}

/// Run the ticker in the foreground, printing clock and reminder lines.
/// With a numeric argument the watch ends after that many seconds;
/// otherwise it runs until interrupted.
#[instrument(skip(session, cfg, renderer, args))]
fn cmd_watch(
    session: &mut Session,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command watch");

    let seconds = match args.first() {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| anyhow!("watch takes a duration in seconds, got: {raw}"))?,
        ),
        None => None,
    };

    let period = Duration::from_millis(cfg.get_u64("tick.period.ms").unwrap_or(1000));
    let reminder_every = cfg.get_u64("reminder.interval").unwrap_or(3600);

    let mut ticker = ReminderTicker::with_timing(session.display_handle(), period, reminder_every);
    let events = ticker.start()?;
    debug!(?seconds, "watching");

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    loop {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            break;
        }

        match events.recv_timeout(period) {
            Ok(TickerEvent::Clock(time)) => renderer.print_clock(&time)?,
            Ok(TickerEvent::Reminder(task)) => renderer.print_reminder(&task)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    ticker.stop(DEFAULT_STOP_TIMEOUT);
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("daymark - a date-partitioned personal task tracker");
    println!();
    println!("usage: daymark [flags] <command> [args]");
    println!();
    println!("  add <text>... [date:DATE]    add a task (default date: today)");
    println!("  today                        list today's tasks");
    println!("  future                       list upcoming tasks");
    println!("  done <text>...               complete a task scheduled for today");
    println!("  cancel <text>... [date:DATE] drop an upcoming task");
    println!("  rate                         show today's completion percentage");
    println!("  watch [seconds]              run the clock and hourly reminders");
    println!("  version                      print the version");
    println!();
    println!("flags: -v/-q verbosity, --rc KEY=VALUE, --config FILE, --data DIR");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand_only_when_unique() {
        let known = known_command_names();

        assert_eq!(expand_command_abbrev("today", &known), Some("today"));
        assert_eq!(expand_command_abbrev("f", &known), Some("future"));
        assert_eq!(expand_command_abbrev("w", &known), Some("watch"));
        assert_eq!(expand_command_abbrev("zz", &known), None);

        let clashing = vec!["add", "append"];
        assert_eq!(expand_command_abbrev("a", &clashing), None);
        assert_eq!(expand_command_abbrev("ad", &clashing), Some("add"));
    }

    #[test]
    fn date_attribute_splits_off_the_text() {
        let args: Vec<String> = ["call", "bank", "date:2024-06-03"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let (text, date) = split_date_attr(&args);

        assert_eq!(text, "call bank");
        assert_eq!(date.as_deref(), Some("2024-06-03"));
    }

    #[test]
    fn missing_date_attribute_yields_none() {
        let args: Vec<String> = ["buy", "milk"].iter().map(ToString::to_string).collect();
        let (text, date) = split_date_attr(&args);

        assert_eq!(text, "buy milk");
        assert_eq!(date, None);
    }
}

use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::filter;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Print the today partition: one task text per line, or a quiet
    /// placeholder when empty.
    #[tracing::instrument(skip(self, rows))]
    pub fn print_today_list(&mut self, rows: &[String]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if rows.is_empty() {
            writeln!(out, "Nothing scheduled for today.")?;
            return Ok(());
        }

        for row in rows {
            writeln!(out, "{row}")?;
        }
        Ok(())
    }

    /// Print the future partition as a task/date table. The rows arrive
    /// as rendered display strings and are split back at the separator.
    #[tracing::instrument(skip(self, rows))]
    pub fn print_future_table(&mut self, rows: &[String]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if rows.is_empty() {
            writeln!(out, "Nothing scheduled beyond today.")?;
            return Ok(());
        }

        let headers = vec!["Task".to_string(), "Date".to_string()];
        let table_rows = rows
            .iter()
            .map(|row| match filter::split_display_row(row) {
                Some((task, date)) => vec![task.to_string(), date.to_string()],
                None => vec![row.clone(), String::new()],
            })
            .collect();

        write_table(&mut out, headers, table_rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn print_completion(&mut self, percent: Option<u8>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        match percent {
            None => writeln!(out, "No tasks scheduled for today.")?,
            Some(100) => {
                let done = self.paint("100%", "32");
                writeln!(out, "Today's completion: {done} - all done!")?;
            }
            Some(p) => writeln!(out, "Today's completion: {p}%")?,
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, time))]
    pub fn print_clock(&mut self, time: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{time}")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_reminder(&mut self, task: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let line = format!("remember, your task is: \"{task}\"");
        writeln!(out, "{}", self.paint(&line, "33"))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let padding = widths[idx].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

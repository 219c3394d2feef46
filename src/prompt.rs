//! Interactive terminal prompts
//!
//! Numbered select-from-list and yes/no questions, line-oriented over any
//! `BufRead`/`Write` pair so the re-prompt loop is testable without a tty.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

pub trait Prompt {
    /// Present a numbered list and return the index of the chosen item.
    /// Re-prompts until the answer is a number in `[1, items.len()]`.
    fn select(&mut self, title: &str, items: &[String]) -> Result<usize>;
    /// Ask a yes/no question. `default_yes` controls both the hint shown
    /// and the meaning of an empty answer.
    fn confirm(&mut self, question: &str, default_yes: bool) -> Result<bool>;
}

pub struct TermPrompt<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> TermPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        TermPrompt { reader, writer }
    }

    fn read_answer(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .context("reading answer from terminal")?;
        if n == 0 {
            bail!("input closed while waiting for an answer");
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompt for TermPrompt<R, W> {
    fn select(&mut self, title: &str, items: &[String]) -> Result<usize> {
        writeln!(self.writer, "{}", title)?;
        for (i, item) in items.iter().enumerate() {
            writeln!(self.writer, "  {}) {}", i + 1, item)?;
        }
        loop {
            write!(self.writer, "Select [1-{}]: ", items.len())?;
            self.writer.flush()?;
            let answer = self.read_answer()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.writer, "invalid choice '{}'", answer)?,
            }
        }
    }

    fn confirm(&mut self, question: &str, default_yes: bool) -> Result<bool> {
        let hint = if default_yes { "[Y/n]" } else { "[n/y]" };
        write!(self.writer, "{} {} ", question, hint)?;
        self.writer.flush()?;
        let answer = self.read_answer()?.to_lowercase();
        if default_yes {
            Ok(!matches!(answer.as_str(), "n" | "no"))
        } else {
            Ok(matches!(answer.as_str(), "y" | "yes"))
        }
    }
}

//! Indented output buffer

use std::fmt::{self, Write};

use crate::error::Result;

const INDENT: &str = "    ";

/// Line-oriented text sink with a current indentation depth
#[derive(Debug, Default)]
pub struct CodeBuffer {
    out: String,
    depth: usize,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth
    pub fn line(&mut self, text: impl fmt::Display) -> Result<()> {
        let text = text.to_string();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
        }
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    pub fn blank(&mut self) -> Result<()> {
        writeln!(self.out)?;
        Ok(())
    }

    /// Write a line, then indent what follows
    pub fn open(&mut self, text: impl fmt::Display) -> Result<()> {
        self.line(text)?;
        self.depth += 1;
        Ok(())
    }

    /// Dedent, then write a line
    pub fn close(&mut self, text: impl fmt::Display) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.line(text)
    }

    /// Dedent, write a line, then indent again (`} else {`)
    pub fn reopen(&mut self, text: impl fmt::Display) -> Result<()> {
        self.close(text)?;
        self.depth += 1;
        Ok(())
    }

    pub fn lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        for line in lines {
            self.line(line)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use atty::Stream;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use pastegate_common::driver::Host;
use pastegate_common::linkify::{lines, Segment};
use pastegate_common::Paste;

/// Runs the flow's side effects in a terminal.
pub struct Terminal {
    hyperlinks: bool,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            hyperlinks: atty::is(Stream::Stdout),
        }
    }

    /// Prints a paste: metadata to stderr, content to stdout.
    pub fn print_paste(&self, paste: &Paste) -> Result<()> {
        eprintln!("{}", paste.display_title());
        let mut meta = vec![paste.syntax.clone(), format!("{} views", paste.views_count)];
        if let Some(created_at) = paste.created_at {
            meta.push(created_at.format("%B %-d, %Y").to_string());
        }
        eprintln!("{}\n", meta.join(" · "));

        let mut stdout = std::io::stdout().lock();
        if !self.hyperlinks {
            stdout.write_all(paste.content.as_bytes())?;
            return Ok(stdout.flush()?);
        }

        for line in lines(&paste.content) {
            for segment in line {
                match segment {
                    Segment::Text(text) => write!(stdout, "{text}")?,
                    // OSC 8 makes the URL clickable in terminals that support it.
                    Segment::Link(url) => write!(stdout, "\x1b]8;;{url}\x1b\\{url}\x1b]8;;\x1b\\")?,
                }
            }
            writeln!(stdout)?;
        }
        Ok(stdout.flush()?)
    }
}

#[async_trait(?Send)]
impl Host for Terminal {
    fn open_url(&self, url: &str) {
        eprintln!("Open this link to continue: {url}");
    }

    async fn sleep(&self, duration: Duration) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Processing...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        tokio::time::sleep(duration).await;
        spinner.finish_and_clear();
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Prints `prompt` to stderr and reads one trimmed line from stdin.
pub fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        bail!("Input closed before the paste was unlocked.");
    }
    Ok(line.trim().to_string())
}

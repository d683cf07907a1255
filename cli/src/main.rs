#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

// Pastegate CLI Client
// Copyright (C) 2024  The Pastegate Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use pastegate_common::driver::Viewer;
use pastegate_common::flow::{EXPIRED_MESSAGE, LOAD_FAILED_MESSAGE};
use pastegate_common::gate::Progress;
use pastegate_common::{
    code_from_link, navigate, HttpApi, MemoryStore, ProgressStore, State, Unlock, Url,
    VerificationSession, DEFAULT_API_BASE,
};
use rpassword::prompt_password;
use tracing_subscriber::EnvFilter;

use crate::store::FileStore;
use crate::terminal::{prompt_line, Terminal};

mod store;
mod terminal;

type TerminalViewer = Viewer<HttpApi, Terminal, FileStore, MemoryStore>;

#[derive(Parser)]
#[clap(version, about = "Unlock and read gated pastes")]
struct Opts {
    /// The paste API to talk to.
    #[clap(long, env = "PASTEGATE_API", default_value = DEFAULT_API_BASE)]
    api: Url,
    /// Where action progress is kept between runs. Defaults to
    /// `~/.pastegate.json`.
    #[clap(long, env = "PASTEGATE_STATE")]
    state: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Unlock a paste and print it.
    View {
        /// The paste's share link or short code.
        link: String,
    },
    /// Show which actions of a paste were already completed.
    Progress { link: String },
    /// Forget everything stored about a paste.
    Forget { link: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let state = opts.state.unwrap_or_else(default_state_path);

    match opts.command {
        Command::View { link } => handle_view(opts.api, &state, &link).await,
        Command::Progress { link } => handle_progress(&state, &link),
        Command::Forget { link } => handle_forget(&state, &link),
    }
}

fn default_state_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".pastegate.json")
}

fn parse_code(link: &str) -> Result<String> {
    code_from_link(link).ok_or_else(|| anyhow!("Invalid paste link: {link}"))
}

fn open_progress(state: &Path) -> Result<ProgressStore<FileStore>> {
    let store = FileStore::open(state)
        .with_context(|| format!("Failed to open state file {}", state.display()))?;
    Ok(ProgressStore::new(store))
}

async fn handle_view(api: Url, state: &Path, link: &str) -> Result<()> {
    let code = parse_code(link)?;

    // Every run is its own verification session.
    let mut progress = open_progress(state)?;
    let mut session = VerificationSession::new(MemoryStore::new());
    navigate(&code, &mut progress, &mut session).context("Failed to remember the paste")?;
    let unlock = Unlock::new(code, progress, session);

    let mut viewer = Viewer::new(HttpApi::new(api), Terminal::new(), unlock);
    eprintln!("Loading paste...");
    viewer.load().await;

    loop {
        match viewer.state().clone() {
            State::Loading => bail!("The paste never finished loading."),
            state @ (State::Error(_) | State::Expired) => bail!(exit_message(&state)),
            State::PasswordGate { error } => {
                if let Some(error) = error {
                    eprintln!("{error}");
                }
                let password =
                    prompt_password("Password Protected. Enter password to unlock: ")?;
                viewer.submit_password(&password).await;
            }
            State::ActionGate { .. } => {
                if !run_action_gate(&mut viewer).await? {
                    return Ok(());
                }
            }
            State::HumanCheck { .. } => {
                prompt_line("Security Check. Press Enter to confirm you are not a robot.")?;
                eprintln!("Verifying...");
                viewer.confirm_human().await?;
            }
            State::Revealed => break,
        }
    }

    let (_, terminal, unlock) = viewer.into_parts();
    let paste = unlock
        .paste()
        .context("The paste was revealed without any content")?;
    terminal.print_paste(paste)
}

/// What a paste that can't be shown exits with.
fn exit_message(state: &State) -> String {
    let reason = match state {
        State::Expired => format!("Paste Expired. {EXPIRED_MESSAGE}"),
        State::Error(message) => message.clone(),
        _ => LOAD_FAILED_MESSAGE.to_string(),
    };
    format!("{reason} Return to home to try another paste.")
}

/// One round of the action gate. Returns `false` if the reader quit.
async fn run_action_gate(viewer: &mut TerminalViewer) -> Result<bool> {
    let unlock = viewer.unlock();
    let (paste, completed) = match (unlock.paste(), unlock.state()) {
        (Some(paste), State::ActionGate { completed, .. }) => (paste, completed),
        _ => return Ok(true),
    };
    let total = paste.actions.len();

    eprintln!("\nUnlock Link. Complete actions to continue:");
    for (i, action) in paste.actions.iter().enumerate() {
        let status = if completed.contains(&i) {
            "Completed"
        } else {
            action.label()
        };
        eprintln!("  [{}] {:<10} {status}", i + 1, action.action_type);
    }

    let progress = Progress::of(paste, completed);
    eprintln!("{progress} ({}%)", progress.percent());

    let answer = if progress.is_complete() {
        prompt_line("Press Enter to unlock the content, or q to quit: ")?
    } else {
        prompt_line(&format!("Choose an action [1-{total}], or q to quit: "))?
    };

    match answer.as_str() {
        "q" | "quit" => return Ok(false),
        "" if viewer.unlock().can_continue() => viewer.continue_from_actions().await?,
        "" => eprintln!("Complete Actions to Unlock."),
        choice => match choice.parse::<usize>() {
            Ok(n) if (1..=total).contains(&n) => {
                if let Err(e) = viewer.complete_action(n - 1).await {
                    eprintln!("{e}");
                }
            }
            _ => eprintln!("Please pick a number between 1 and {total}."),
        },
    }

    Ok(true)
}

fn handle_progress(state: &Path, link: &str) -> Result<()> {
    let code = parse_code(link)?;
    let progress = open_progress(state)?;

    let completed = progress.load(&code);
    if completed.is_empty() {
        println!("No actions completed for {code}.");
    } else {
        let numbers: Vec<_> = completed.iter().map(|i| (i + 1).to_string()).collect();
        println!("Completed actions for {code}: {}", numbers.join(", "));
    }

    if let Some(viewed_at) = progress.viewed_at(&code) {
        println!("View recorded on {}", viewed_at.format("%A, %B %-d, %Y at %T %Z"));
    }

    Ok(())
}

fn handle_forget(state: &Path, link: &str) -> Result<()> {
    let code = parse_code(link)?;
    let mut progress = open_progress(state)?;
    progress
        .forget(&code)
        .context("Failed to update the state file")?;

    eprintln!("Forgot {code} in {}", progress.into_inner().path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use pastegate_common::flow::NOT_FOUND_MESSAGE;

    use super::*;

    #[test]
    fn unreadable_pastes_point_back_home() {
        let expired = exit_message(&State::Expired);
        assert!(expired.starts_with("Paste Expired. "));
        assert!(expired.contains(EXPIRED_MESSAGE));
        assert!(expired.ends_with("Return to home to try another paste."));

        assert_eq!(
            exit_message(&State::Error(NOT_FOUND_MESSAGE.to_string())),
            "Paste not found. Return to home to try another paste."
        );
    }
}

use std::{
    io::Write,
    time::{Duration, Instant},
};

use dashboard_common::{view::led_accent, ColorTween, DashboardView};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::{host::AppState, store::StateStore};

const FRAME: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "t" | "toggle" => Some(Self::Toggle),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Redraws the dashboard on every state change, and every frame while the
/// LED accent is still fading.
pub async fn run_terminal(store: StateStore) {
    let mut receiver = store.subscribe();
    let initial = led_accent(receiver.borrow().led_on);
    let mut tween = ColorTween::new(initial, dashboard_common::view::LED_TWEEN);

    loop {
        let state = receiver.borrow_and_update().clone();
        let now = Instant::now();
        tween.retarget(led_accent(state.led_on), now);
        draw(&DashboardView::build(&state, tween.sample(now)));

        if tween.is_running(now) {
            tokio::select! {
                changed = receiver.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(FRAME) => {}
            }
        } else if receiver.changed().await.is_err() {
            return;
        }
    }
}

fn draw(view: &DashboardView) {
    let mut stdout = std::io::stdout().lock();
    let frame = format!("\x1b[2J\x1b[H{view}\n\n[t] toggle LED  [q] quit\n");
    if let Err(err) = stdout
        .write_all(frame.as_bytes())
        .and_then(|_| stdout.flush())
    {
        warn!("terminal write failed: {err}");
    }
}

/// Reads commands from stdin until `quit`. A closed stdin leaves the
/// dashboard running.
pub async fn read_commands(app: AppState) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Some(Command::Toggle) => {
                app.toggle_led();
            }
            Some(Command::Quit) => return Ok(()),
            None if line.trim().is_empty() => {}
            None => warn!("unknown command '{}'", line.trim()),
        }
    }
    std::future::pending().await
}

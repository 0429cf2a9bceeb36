use std::{
    io::{Stdout, Write},
    time::{Duration, Instant},
};

use chrono::Local;
use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use crate::{cli::Settings, collector::Collector, render_once, style::RenderParams, terminal_width};

/// Redraws the tree every interval on the alternate screen until `q`, `Esc` or
/// `Ctrl-C`. The terminal is restored even when a pass fails.
pub fn run(
    collector: &dyn Collector,
    settings: &Settings,
    params: &RenderParams,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    let result = watch_loop(&mut stdout, collector, settings, params);

    // restore terminal
    let restored = execute!(stdout, LeaveAlternateScreen).and(disable_raw_mode());
    result?;
    restored?;
    Ok(())
}

fn watch_loop(
    stdout: &mut Stdout,
    collector: &dyn Collector,
    settings: &Settings,
    params: &RenderParams,
) -> anyhow::Result<()> {
    loop {
        //width can change between frames
        let params = RenderParams {
            max_width: terminal_width(),
            ..params.clone()
        };
        let tree = render_once(collector, settings, &params)?;

        let header = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        queue!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        stdout.write_all(frame(&header, &tree).as_bytes())?;
        stdout.flush()?;

        if wait_for_quit(settings.interval)? {
            return Ok(());
        }
    }
}

///raw mode does not turn \n into \r\n for us
fn frame(header: &str, tree: &str) -> String {
    format!("{header}\n\n{tree}").replace('\n', "\r\n")
}

/// Waits out the interval, returning early with `true` on a quit key and with
/// `false` on resize so the next frame fits.
fn wait_for_quit(interval: Duration) -> std::io::Result<bool> {
    let deadline = Instant::now() + interval;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Ok(false);
        }
        if event::poll(left)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press && is_quit(&key) => {
                    return Ok(true)
                }
                Event::Resize(..) => return Ok(false),
                _ => {}
            }
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

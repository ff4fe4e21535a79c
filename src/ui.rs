use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_watch::monitor::{StatusLevel, StatusMessage, StatusSink};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Operator-facing output on stderr. Stdout stays free for `--json`.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    /// Announce a stage; its duration is printed when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.use_pretty() {
            Some(stage_spinner(name))
        } else {
            eprintln!("==> {}", name);
            None
        };
        StageGuard {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
        }
    }

    pub fn render(&self, status: &StatusMessage) -> String {
        let marker = if self.use_pretty() {
            match status.level {
                StatusLevel::Info => "ℹ",
                StatusLevel::Success => "✔",
                StatusLevel::Warning => "⚠",
                StatusLevel::Error => "✖",
            }
        } else {
            match status.level {
                StatusLevel::Info => "[info]",
                StatusLevel::Success => "[ok]",
                StatusLevel::Warning => "[warn]",
                StatusLevel::Error => "[alert]",
            }
        };
        format!("{} {}", marker, status.message)
    }
}

impl StatusSink for Ui {
    fn status(&mut self, status: &StatusMessage) {
        eprintln!("{}", self.render(status));
    }
}

fn stage_spinner(name: &str) -> ProgressBar {
    let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("{name}…"));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

pub struct StageGuard {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.started.elapsed());
        let done = format!("✔ {} ({})", self.name, elapsed);
        match self.spinner.take() {
            Some(spinner) => spinner.finish_with_message(done),
            None => eprintln!("{done}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_uses_text_markers() {
        let ui = Ui::from_args(Some("plain"), true, false);
        let status = StatusMessage {
            level: StatusLevel::Warning,
            message: "Unknown vehicle detected".to_string(),
        };
        assert_eq!(ui.render(&status), "[warn] Unknown vehicle detected");
    }

    #[test]
    fn non_tty_never_renders_pretty() {
        let ui = Ui::from_args(Some("pretty"), false, false);
        let status = StatusMessage {
            level: StatusLevel::Error,
            message: "sms alert failed".to_string(),
        };
        assert!(ui.render(&status).starts_with("[alert]"));
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}

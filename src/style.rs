use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Box drawing characters used for the tree prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Glyphs {
    /// continuation bar, tee, elbow
    pub vertical: [char; 3],
    /// dash, dash with a down tee
    pub horizontal: [char; 2],
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            vertical: ['│', '├', '└'],
            horizontal: ['─', '┬'],
        }
    }
}

impl Glyphs {
    pub fn bar(&self) -> char {
        self.vertical[0]
    }
    pub fn tee(&self) -> char {
        self.vertical[1]
    }
    pub fn elbow(&self) -> char {
        self.vertical[2]
    }
    pub fn dash(&self) -> char {
        self.horizontal[0]
    }
    pub fn down_tee(&self) -> char {
        self.horizontal[1]
    }
}

/// ANSI escape sequences per field. An empty string leaves the field unstyled.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Styles {
    pub lines: String,
    pub pid: String,
    pub pgid: String,
    pub rss: String,
    pub user: String,
    pub cmd: String,
    pub started: String,
    pub reset: String,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            lines: "\x1b[2;34m".to_string(),
            pid: "\x1b[2;35m".to_string(),
            pgid: "\x1b[2;34m".to_string(),
            rss: "\x1b[2m".to_string(),
            user: "\x1b[33m".to_string(),
            cmd: "\x1b[37m".to_string(),
            started: "\x1b[2;36m".to_string(),
            reset: "\x1b[0m".to_string(),
        }
    }
}

impl Styles {
    /// No escapes at all, handy for comparing output in tests.
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            lines: String::new(),
            pid: String::new(),
            pgid: String::new(),
            rss: String::new(),
            user: String::new(),
            cmd: String::new(),
            started: String::new(),
            reset: String::new(),
        }
    }
}

/// Everything that shapes the output of one render pass.
#[derive(Clone, Debug)]
pub struct RenderParams {
    /// glyph columns per depth level
    pub indent: usize,
    pub glyphs: Glyphs,
    pub styles: Styles,
    pub max_width: Option<usize>,
    /// snapshot time; when set each row also shows the process start time,
    /// derived from it for processes without an absolute one
    pub show_started: Option<NaiveDateTime>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            indent: 4,
            glyphs: Glyphs::default(),
            styles: Styles::default(),
            max_width: None,
            show_started: None,
        }
    }
}

use std::env;

use nu_ansi_term::{Color, Style};

/// Styles applied to the individual parts of rendered help text.
///
/// A scheme is plain configuration data held by the owning
/// [`ParserConfig`](crate::ParserConfig); nothing here is process-global.
/// Styling only decorates already rendered strings and has no effect on
/// parsing.
#[derive(Debug, Clone, Default)]
pub struct ColorScheme {
    pub usage: Style,
    pub description: Style,
    pub group_title: Style,
    pub command: Style,
    pub argument: Style,
    pub meta: Style,
    pub epilog: Style,
}

impl ColorScheme {
    /// A scheme that leaves every string untouched.
    pub fn plain() -> ColorScheme {
        ColorScheme::default()
    }

    /// The stock colorful scheme: bold white usage and epilog, bold green
    /// group titles, bold yellow command names, cyan argument names.
    pub fn standard() -> ColorScheme {
        ColorScheme {
            usage: Style::new().fg(Color::White).bold(),
            description: Style::new(),
            group_title: Style::new().fg(Color::Green).bold(),
            command: Style::new().fg(Color::Yellow).bold(),
            argument: Style::new().fg(Color::Cyan),
            meta: Style::new(),
            epilog: Style::new().fg(Color::White).bold(),
        }
    }
}

/// Whether the terminal advertises color support through `$TERM`.
pub(crate) fn terminal_supports_color() -> bool {
    env::var("TERM").map(|term| term.contains("color")).unwrap_or(false)
}

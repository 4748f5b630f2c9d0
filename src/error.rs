use thiserror::Error;

/// Declaration-time error raised while registering arguments or sub-commands.
///
/// These are programming mistakes, not user input problems: the registration
/// that triggered one is aborted entirely and the parser is left unchanged.
/// They are never meant to be recovered from at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeclarationError {
    /// Neither a short nor a long name was given.
    #[error("argument name is empty")]
    EmptyName,

    /// An argument name contains whitespace.
    #[error("argument name '{0}' contains whitespace")]
    NameWithSpace(String),

    /// Names are registered bare; the `-`/`--` prefixes are added internally.
    #[error("argument name '{0}' must not carry a '-' prefix")]
    NameWithPrefix(String),

    /// The short and the long name are identical.
    #[error("argument short name equals its long name '{0}'")]
    ShortEqualsLong(String),

    /// A positional argument cannot be a flag.
    #[error("a positional argument cannot be a flag")]
    PositionalFlag,

    /// A flag was declared with a setting that only makes sense for
    /// value-taking arguments.
    #[error("a flag cannot carry {0}")]
    FlagWith(&'static str),

    /// Two arguments compete for the same `-`/`--` token in one parser.
    #[error("conflicting entry '{entry}', already taken by: '{help}'")]
    Conflict { entry: String, help: String },

    /// A sub-command name must not be empty.
    #[error("sub-command name is empty")]
    EmptyCommand,

    /// A sub-command name must be a single token.
    #[error("sub-command name '{0}' contains whitespace")]
    CommandWithSpace(String),

    /// Two sub-commands with the same name under one parent.
    #[error("conflicting sub-command '{name}', desc: '{help}'")]
    CommandConflict { name: String, help: String },
}

/// Parse-time error returned to the caller for display.
///
/// The first error encountered anywhere in the token walk or the
/// finalization pass aborts the whole parse. [`ParseError::HelpShown`] and
/// [`ParseError::CompletionShown`] are not real errors but early-exit
/// signals sharing the same channel; both render as an empty message and
/// can be told apart with [`ParseError::is_break`].
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// Help text was rendered; stop processing.
    #[error("")]
    HelpShown,

    /// A shell completion script was rendered; stop processing.
    #[error("")]
    CompletionShown,

    /// A value-taking argument was matched with no value token after it.
    #[error("argument {0} expects a value")]
    ExpectValue(String),

    /// Built-in type coercion failed for one raw token.
    #[error("invalid {kind} value: {raw}")]
    InvalidValue { kind: &'static str, raw: String },

    /// A formatter hook produced a value of the wrong type.
    #[error("formatter result does not match the {0} argument type")]
    FormatterType(&'static str),

    /// A coerced value is not a member of the declared choice set.
    #[error("args must be one|some of [{0}]")]
    InvalidChoice(String),

    /// A validate, formatter or action hook rejected the input.
    #[error("{0}")]
    Hook(String),

    /// A required argument ended the parse unassigned.
    #[error("{0} is required")]
    Required(String),

    /// A token matched nothing; dash-prefixed tokens come with edit-distance
    /// suggestions when any registered name is close enough.
    #[error("unrecognized arguments: {token}{}", render_suggestions(.suggestions))]
    Unrecognized {
        token: String,
        suggestions: Vec<String>,
    },
}

impl ParseError {
    /// True for the early-exit signals (help or completion script shown),
    /// which callers usually treat as a clean stop rather than a failure.
    pub fn is_break(&self) -> bool {
        matches!(self, ParseError::HelpShown | ParseError::CompletionShown)
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    format!("\ndo you mean?: {}", suggestions.join("\nor "))
}

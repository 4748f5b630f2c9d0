use std::cell::RefCell;
use std::process;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::arg::{Arg, Binding, Opts, ValueKind, SHORT_PREFIX};
use crate::color::{terminal_supports_color, ColorScheme};
use crate::error::{DeclarationError, ParseError};

/// Parser-level behavior switches. Every field defaults to off; fill the
/// ones you need:
///
/// ```
/// use argwalk::{Parser, ParserConfig};
///
/// let parser = Parser::new("demo", "a demo program", ParserConfig {
///     with_hint: true,
///     ..ParserConfig::default()
/// });
/// # let _ = parser;
/// ```
#[derive(Default)]
pub struct ParserConfig {
    /// Manual usage line, replacing the generated one.
    pub usage: String,
    /// Text appended after all help sections.
    pub epilog: String,
    /// Skip registering the built-in `-h/--help` flag.
    pub disable_help: bool,
    /// After printing help, keep parsing instead of breaking out.
    pub continue_on_help: bool,
    /// Do not treat an empty command line as a help request.
    pub disable_default_show_help: bool,
    /// Called instead of the help fallback when the command line is empty.
    pub default_action: Option<Box<dyn Fn()>>,
    /// Register a `--completion` flag that prints a bash/zsh completion
    /// script.
    pub add_shell_completion: bool,
    /// Append generated default/choices/required hints to help lines.
    pub with_hint: bool,
    /// Cap the help header column; longer headers wrap onto their own line.
    pub max_header_length: usize,
    /// Colorize help output when the terminal advertises color support.
    pub with_color: bool,
    /// Colorize help output unconditionally.
    pub ensure_color: bool,
    /// Palette override used when color is active.
    pub color_scheme: Option<ColorScheme>,
}

pub(crate) struct Registered {
    pub(crate) arg: Rc<RefCell<Arg>>,
    inherited: bool,
}

/// The argument registry and matcher.
///
/// Declare arguments through the typed factory methods, then call
/// [`Parser::parse`] (or [`Parser::parse_args`] with explicit tokens) and
/// read results back through the returned [`Binding`] handles:
///
/// ```
/// use argwalk::{Opts, Parser, ParserConfig};
///
/// let mut parser = Parser::new("greet", "print a greeting", ParserConfig::default());
/// let name = parser.string("n", "name", Opts::default()).unwrap();
/// let loud = parser.flag("l", "loud", Opts::default()).unwrap();
/// parser.parse_args(&["--name", "ferris"]).unwrap();
/// assert_eq!(name.get(), "ferris");
/// assert!(!loud.get());
/// ```
pub struct Parser {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) config: Rc<ParserConfig>,
    invoked: bool,
    invoke_action: Option<Box<dyn FnMut(bool)>>,
    show_help: Option<Binding<bool>>,
    show_completion: Option<Binding<bool>>,
    pub(crate) entries: Vec<Rc<RefCell<Arg>>>,
    pub(crate) entry_map: IndexMap<String, Registered>,
    pub(crate) positionals: Vec<Registered>,
    pub(crate) sub_map: IndexMap<String, Rc<RefCell<Parser>>>,
    pub(crate) parents: Vec<String>,
}

impl Parser {
    /// Create a top-level parser. An empty `name` falls back to the running
    /// program's file name.
    pub fn new(name: &str, description: &str, config: ParserConfig) -> Parser {
        Parser::with_config(name, description, Rc::new(config), false)
    }

    fn with_config(name: &str, description: &str, config: Rc<ParserConfig>, is_sub: bool) -> Parser {
        let name = if name.is_empty() {
            program_name()
        } else {
            name.to_string()
        };
        let mut parser = Parser {
            name,
            description: description.to_string(),
            invoked: false,
            invoke_action: None,
            show_help: None,
            show_completion: None,
            entries: Vec::new(),
            entry_map: IndexMap::new(),
            positionals: Vec::new(),
            sub_map: IndexMap::new(),
            parents: Vec::new(),
            config,
        };
        if !parser.config.disable_help {
            parser.show_help = Some(parser.builtin_flag("h", "help", "show this help message"));
        }
        if parser.config.add_shell_completion && !is_sub {
            parser.show_completion =
                Some(parser.builtin_flag("", "completion", "show command completion script"));
        }
        parser
    }

    // built-ins register into a parser that has no entries yet, so the
    // conflict checks in install() cannot fire
    fn builtin_flag(&mut self, short: &str, long: &str, help: &str) -> Binding<bool> {
        let arg = Rc::new(RefCell::new(Arg::new(
            short,
            long,
            ValueKind::Flag,
            Opts {
                help: help.to_string(),
                ..Opts::default()
            },
        )));
        for watch in arg.borrow().watchers() {
            self.entry_map.insert(
                watch,
                Registered {
                    arg: Rc::clone(&arg),
                    inherited: false,
                },
            );
        }
        self.entries.push(Rc::clone(&arg));
        Binding::new(arg)
    }

    fn add_arg<T>(
        &mut self,
        short: &str,
        long: &str,
        kind: ValueKind,
        opts: Opts,
    ) -> Result<Binding<T>, DeclarationError> {
        let arg = Rc::new(RefCell::new(Arg::new(short, long, kind, opts)));
        self.install(Rc::clone(&arg), false)?;
        Ok(Binding::new(arg))
    }

    /// Declare a boolean flag.
    pub fn flag(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<bool>, DeclarationError> {
        self.add_arg(short, long, ValueKind::Flag, opts)
    }

    /// Declare a single string argument.
    pub fn string(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<String>, DeclarationError> {
        self.add_arg(short, long, ValueKind::Str, opts)
    }

    /// Declare a greedy string list argument.
    pub fn strings(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<Vec<String>>, DeclarationError> {
        self.add_arg(short, long, ValueKind::StrList, opts)
    }

    /// Declare a single integer argument.
    pub fn int(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<i64>, DeclarationError> {
        self.add_arg(short, long, ValueKind::Int, opts)
    }

    /// Declare a greedy integer list argument.
    pub fn ints(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<Vec<i64>>, DeclarationError> {
        self.add_arg(short, long, ValueKind::IntList, opts)
    }

    /// Declare a single float argument.
    pub fn float(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<f64>, DeclarationError> {
        self.add_arg(short, long, ValueKind::Float, opts)
    }

    /// Declare a greedy float list argument.
    pub fn floats(
        &mut self,
        short: &str,
        long: &str,
        opts: Opts,
    ) -> Result<Binding<Vec<f64>>, DeclarationError> {
        self.add_arg(short, long, ValueKind::FloatList, opts)
    }

    /// Register an argument declared on another parser, sharing its
    /// storage. Both parsers bind into the same slot, so whichever one
    /// parses last decides the value.
    pub fn attach<T>(&mut self, binding: &Binding<T>) -> Result<(), DeclarationError> {
        self.install(Rc::clone(binding.arg()), false)
    }

    pub(crate) fn install(
        &mut self,
        arg: Rc<RefCell<Arg>>,
        inherited: bool,
    ) -> Result<(), DeclarationError> {
        arg.borrow().validate()?;
        if arg.borrow().opts.positional {
            let id = arg.borrow().identifier().to_string();
            if let Some(existing) = self
                .positionals
                .iter_mut()
                .find(|r| r.arg.borrow().identifier() == id)
            {
                if inherited {
                    // the parser's own declaration wins over the inherited one
                    return Ok(());
                }
                if existing.inherited {
                    existing.arg = arg;
                    existing.inherited = false;
                    return Ok(());
                }
                let help = existing.arg.borrow().opts.help.clone();
                return Err(DeclarationError::Conflict { entry: id, help });
            }
            self.positionals.push(Registered { arg, inherited });
            return Ok(());
        }
        let watchers = arg.borrow().watchers();
        for watch in &watchers {
            if let Some(existing) = self.entry_map.get(watch) {
                if inherited {
                    return Ok(());
                }
                if !existing.inherited {
                    let help = existing.arg.borrow().opts.help.clone();
                    return Err(DeclarationError::Conflict {
                        entry: watch.clone(),
                        help,
                    });
                }
            }
        }
        for watch in &watchers {
            let replaced = self.entry_map.insert(
                watch.clone(),
                Registered {
                    arg: Rc::clone(&arg),
                    inherited,
                },
            );
            if let Some(old) = replaced {
                // an overridden inherited entry may have lost its last
                // watcher; drop it from the display list if so
                if !self
                    .entry_map
                    .values()
                    .any(|r| Rc::ptr_eq(&r.arg, &old.arg))
                {
                    self.entries.retain(|e| !Rc::ptr_eq(e, &old.arg));
                }
            }
        }
        self.entries.push(arg);
        Ok(())
    }

    /// Create a sub-command with its own registry. Tokens starting with the
    /// sub-command's name are handed to it wholesale; inheritable arguments
    /// declared so far are shared into it, and so is the parent's config
    /// unless `config` overrides it.
    pub fn add_command(
        &mut self,
        name: &str,
        description: &str,
        config: Option<ParserConfig>,
    ) -> Result<Rc<RefCell<Parser>>, DeclarationError> {
        if name.is_empty() {
            return Err(DeclarationError::EmptyCommand);
        }
        if name.contains(char::is_whitespace) {
            return Err(DeclarationError::CommandWithSpace(name.to_string()));
        }
        if let Some(existing) = self.sub_map.get(name) {
            let help = existing.borrow().description.clone();
            return Err(DeclarationError::CommandConflict {
                name: name.to_string(),
                help,
            });
        }
        let config = config
            .map(Rc::new)
            .unwrap_or_else(|| Rc::clone(&self.config));
        let mut sub = Parser::with_config(name, description, config, true);
        sub.parents = self.parents.clone();
        sub.parents.push(self.name.clone());
        for entry in &self.entries {
            if entry.borrow().opts.inheritable {
                sub.install(Rc::clone(entry), true)?;
            }
        }
        for reg in &self.positionals {
            if reg.arg.borrow().opts.inheritable {
                sub.install(Rc::clone(&reg.arg), true)?;
            }
        }
        let sub = Rc::new(RefCell::new(sub));
        self.sub_map.insert(name.to_string(), Rc::clone(&sub));
        Ok(sub)
    }

    /// Parse the process command line, skipping the program name.
    pub fn parse(&mut self) -> Result<(), ParseError> {
        let tokens: Vec<String> = std::env::args().skip(1).collect();
        self.parse_tokens(&tokens)
    }

    /// Parse the process command line; on failure print the error with the
    /// usage line and exit, on a help/completion break exit silently.
    pub fn parse_or_exit(&mut self) {
        if let Err(e) = self.parse() {
            if e.is_break() {
                process::exit(0);
            }
            eprintln!("{}", e);
            eprintln!("{}", self.format_usage());
            process::exit(1);
        }
    }

    /// Parse an explicit token list.
    pub fn parse_args<T: ToString>(&mut self, args: &[T]) -> Result<(), ParseError> {
        let tokens: Vec<String> = args.iter().map(T::to_string).collect();
        self.parse_tokens(&tokens)
    }

    fn parse_tokens(&mut self, tokens: &[String]) -> Result<(), ParseError> {
        if let Some(first) = tokens.first() {
            if let Some(sub) = self.sub_map.get(first) {
                debug!("{}: dispatching to sub-command '{}'", self.name, first);
                let sub = Rc::clone(sub);
                // the dispatching parser stays un-invoked and skips its own
                // default and required handling
                sub.borrow_mut().parse_tokens(&tokens[1..])?;
                if let Some(action) = self.invoke_action.as_mut() {
                    action(false);
                }
                return Ok(());
            }
        }
        self.invoked = !tokens.is_empty();
        if tokens.is_empty() {
            if let Some(action) = &self.config.default_action {
                action();
            } else if !self.config.disable_default_show_help {
                if let Some(help) = &self.show_help {
                    Rc::clone(help.arg()).borrow_mut().bind(&[])?;
                }
            }
        } else {
            self.consume(tokens)?;
        }
        self.finalize()?;
        if let Some(action) = self.invoke_action.as_mut() {
            action(self.invoked);
        }
        Ok(())
    }

    fn consume(&mut self, tokens: &[String]) -> Result<(), ParseError> {
        let mut position = 0usize;
        let mut i = 0usize;
        while i < tokens.len() {
            let token = &tokens[i];
            if let Some(reg) = self.entry_map.get(token.as_str()) {
                let arg = Rc::clone(&reg.arg);
                let kind = arg.borrow().kind;
                if kind.is_flag() {
                    arg.borrow_mut().bind(&[])?;
                    i += 1;
                    continue;
                }
                let run = self.value_run(&tokens[i + 1..]);
                if run == 0 {
                    let watchers = arg.borrow().watchers().join("/");
                    return Err(ParseError::ExpectValue(watchers));
                }
                if kind.is_multi() {
                    arg.borrow_mut().bind(&tokens[i + 1..i + 1 + run])?;
                    i += 1 + run;
                } else {
                    arg.borrow_mut().bind(&tokens[i + 1..i + 2])?;
                    i += 2;
                }
                continue;
            }
            if position >= self.positionals.len() {
                return Err(self.unrecognized(token));
            }
            let arg = Rc::clone(&self.positionals[position].arg);
            if arg.borrow().kind.is_multi() {
                let run = self.value_run(&tokens[i..]);
                arg.borrow_mut().bind(&tokens[i..i + run])?;
                i += run;
            } else {
                arg.borrow_mut().bind(&tokens[i..i + 1])?;
                i += 1;
            }
            position += 1;
        }
        Ok(())
    }

    // length of the value run: consecutive tokens up to the next registered
    // watcher
    fn value_run(&self, rest: &[String]) -> usize {
        rest.iter()
            .take_while(|t| !self.entry_map.contains_key(t.as_str()))
            .count()
    }

    // only dash-prefixed tokens look like misspelled argument names;
    // anything else gets a plain failure without correction hints
    fn unrecognized(&self, token: &str) -> ParseError {
        let mut suggestions = Vec::new();
        if token.starts_with(SHORT_PREFIX) {
            let names: Vec<&str> = self.entry_map.keys().map(String::as_str).collect();
            suggestions = crate::suggest::suggest(token, &names)
                .into_iter()
                .map(|name| {
                    let help = self
                        .entry_map
                        .get(name)
                        .map(|r| r.arg.borrow().opts.help.clone())
                        .unwrap_or_default();
                    if help.is_empty() {
                        name.to_string()
                    } else {
                        format!("{} ({})", name, help)
                    }
                })
                .collect();
        }
        ParseError::Unrecognized {
            token: token.to_string(),
            suggestions,
        }
    }

    fn finalize(&mut self) -> Result<(), ParseError> {
        if let Some(help) = &self.show_help {
            if help.get() {
                self.print_help();
                if !self.config.continue_on_help {
                    return Err(ParseError::HelpShown);
                }
            }
        }
        if let Some(completion) = &self.show_completion {
            if completion.get() {
                println!("{}", self.format_completion_script());
                return Err(ParseError::CompletionShown);
            }
        }
        let args = self.all_args();
        for arg in &args {
            let wants_default = {
                let a = arg.borrow();
                !a.assigned && !a.kind.is_flag() && a.opts.default.is_some()
            };
            if wants_default {
                arg.borrow_mut().bind(&[])?;
            }
        }
        for arg in &args {
            let a = arg.borrow();
            if a.opts.required && !a.assigned {
                return Err(ParseError::Required(a.meta_name()));
            }
        }
        Ok(())
    }

    fn all_args(&self) -> Vec<Rc<RefCell<Arg>>> {
        self.entries
            .iter()
            .cloned()
            .chain(self.positionals.iter().map(|r| Rc::clone(&r.arg)))
            .collect()
    }

    /// True once this parser actually consumed tokens on the last parse.
    /// False when input was empty or a sub-command took the tokens instead.
    pub fn invoked(&self) -> bool {
        self.invoked
    }

    /// Run `action` right after this parser's parse pass succeeds. The
    /// argument is the parser's own invoked state: `true` when it consumed
    /// tokens itself, `false` when it dispatched to a sub-command or saw no
    /// input at all.
    pub fn set_invoke_action(&mut self, action: impl FnMut(bool) + 'static) {
        self.invoke_action = Some(Box::new(action));
    }

    pub(crate) fn palette(&self) -> ColorScheme {
        if self.config.ensure_color || (self.config.with_color && terminal_supports_color()) {
            self.config
                .color_scheme
                .clone()
                .unwrap_or_else(ColorScheme::standard)
        } else {
            ColorScheme::plain()
        }
    }

    /// Print the full help text to stdout.
    pub fn print_help(&self) {
        println!("{}", self.format_help());
    }
}

fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arg::Value;

    fn parser() -> Parser {
        Parser::new("test", "this is a test program", ParserConfig::default())
    }

    #[test]
    fn test_basic_types() {
        let mut p = parser();
        let verbose = p.flag("v", "verbose", Opts::default()).unwrap();
        let name = p.string("n", "name", Opts::default()).unwrap();
        let count = p.int("c", "count", Opts::default()).unwrap();
        let ratio = p.float("r", "ratio", Opts::default()).unwrap();
        p.parse_args(&["-v", "--name", "tom", "--count", "3", "-r", "0.5"])
            .unwrap();
        assert!(verbose.get());
        assert_eq!(name.get(), "tom");
        assert_eq!(count.get(), 3);
        assert_eq!(ratio.get(), 0.5);
    }

    #[test]
    fn test_multi_value_greedy_run() {
        let mut p = parser();
        let files = p.strings("f", "files", Opts::default()).unwrap();
        let verbose = p.flag("v", "verbose", Opts::default()).unwrap();
        p.parse_args(&["--files", "a.txt", "b.txt", "c.txt", "-v"])
            .unwrap();
        assert_eq!(files.get(), vec!["a.txt", "b.txt", "c.txt"]);
        assert!(verbose.get());
    }

    #[test]
    fn test_single_value_takes_exactly_one() {
        let mut p = parser();
        let name = p.string("n", "name", Opts::default()).unwrap();
        let rest = p
            .string(
                "",
                "tail",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["--name", "tom", "jerry"]).unwrap();
        assert_eq!(name.get(), "tom");
        assert_eq!(rest.get(), "jerry");
    }

    #[test]
    fn test_multi_positional_run_stops_at_flag() {
        let mut p = parser();
        let files = p
            .strings(
                "",
                "file",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        let force = p.flag("", "ff", Opts::default()).unwrap();
        p.parse_args(&["a", "b", "c", "--ff"]).unwrap();
        assert_eq!(files.get(), vec!["a", "b", "c"]);
        assert!(force.get());
    }

    #[test]
    fn test_expect_value() {
        let mut p = parser();
        p.string("n", "name", Opts::default()).unwrap();
        let err = p.parse_args(&["--name"]).unwrap_err();
        assert_eq!(err.to_string(), "argument --name/-n expects a value");

        let mut p = parser();
        p.string("n", "name", Opts::default()).unwrap();
        p.flag("v", "verbose", Opts::default()).unwrap();
        let err = p.parse_args(&["--name", "-v"]).unwrap_err();
        assert_eq!(err, ParseError::ExpectValue("--name/-n".to_string()));
    }

    #[test]
    fn test_positionals_in_order() {
        let mut p = parser();
        let src = p
            .string(
                "",
                "src",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        let dests = p
            .strings(
                "",
                "dest",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["from", "to1", "to2"]).unwrap();
        assert_eq!(src.get(), "from");
        assert_eq!(dests.get(), vec!["to1", "to2"]);
    }

    #[test]
    fn test_dash_prefixed_value_binds_to_positional() {
        let mut p = parser();
        let offset = p
            .int(
                "",
                "offset",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["-5"]).unwrap();
        assert_eq!(offset.get(), -5);

        // with every positional slot spent, a dash token is unrecognized
        let mut p = parser();
        p.int(
            "",
            "offset",
            Opts {
                positional: true,
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.parse_args(&["-5", "-6"]).unwrap_err();
        assert!(matches!(err, ParseError::Unrecognized { token, .. } if token == "-6"));
    }

    #[test]
    fn test_unrecognized_with_suggestions() {
        let mut p = parser();
        p.flag(
            "v",
            "verbose",
            Opts {
                help: "talk more".to_string(),
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.parse_args(&["--verbos"]).unwrap_err();
        match &err {
            ParseError::Unrecognized { token, suggestions } => {
                assert_eq!(token, "--verbos");
                assert_eq!(suggestions, &vec!["--verbose (talk more)".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err
            .to_string()
            .contains("do you mean?: --verbose (talk more)"));
    }

    #[test]
    fn test_plain_token_gets_no_suggestions() {
        let mut p = parser();
        p.add_command("install", "install a package", None).unwrap();
        let err = p.parse_args(&["instal"]).unwrap_err();
        match err {
            ParseError::Unrecognized { token, suggestions } => {
                assert_eq!(token, "instal");
                assert!(suggestions.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_choices() {
        let mut p = parser();
        p.string(
            "",
            "mode",
            Opts {
                choices: vec!["fast".into(), "slow".into()],
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.parse_args(&["--mode", "medium"]).unwrap_err();
        assert_eq!(err.to_string(), "args must be one|some of [fast, slow]");

        let mut p = parser();
        let mode = p
            .string(
                "",
                "mode",
                Opts {
                    choices: vec!["fast".into(), "slow".into()],
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["--mode", "slow"]).unwrap();
        assert_eq!(mode.get(), "slow");
    }

    #[test]
    fn test_validate_hook() {
        let mut p = parser();
        p.string(
            "",
            "host",
            Opts {
                validate: Some(Box::new(|raw| {
                    if raw.contains('.') {
                        Ok(())
                    } else {
                        Err(format!("{} is not a host name", raw))
                    }
                })),
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.parse_args(&["--host", "localhost"]).unwrap_err();
        assert_eq!(err.to_string(), "localhost is not a host name");
    }

    #[test]
    fn test_formatter_hook() {
        let mut p = parser();
        let name = p
            .string(
                "",
                "name",
                Opts {
                    formatter: Some(Box::new(|raw| Ok(Value::Str(raw.to_uppercase())))),
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["--name", "tom"]).unwrap();
        assert_eq!(name.get(), "TOM");
    }

    #[test]
    fn test_required() {
        let mut p = parser();
        p.string(
            "",
            "out",
            Opts {
                required: true,
                ..Opts::default()
            },
        )
        .unwrap();
        p.flag("v", "verbose", Opts::default()).unwrap();
        let err = p.parse_args(&["-v"]).unwrap_err();
        assert_eq!(err.to_string(), "OUT is required");
    }

    #[test]
    fn test_default_satisfies_required() {
        let mut p = parser();
        let out = p
            .string(
                "",
                "out",
                Opts {
                    required: true,
                    default: Some("a.out".to_string()),
                    ..Opts::default()
                },
            )
            .unwrap();
        p.flag("v", "verbose", Opts::default()).unwrap();
        p.parse_args(&["-v"]).unwrap();
        assert!(out.is_assigned());
        assert_eq!(out.get(), "a.out");
    }

    #[test]
    fn test_malformed_default_surfaces_at_parse() {
        let mut p = parser();
        p.float(
            "",
            "ratio",
            Opts {
                default: Some("x".to_string()),
                ..Opts::default()
            },
        )
        .unwrap();
        p.flag("v", "verbose", Opts::default()).unwrap();
        let err = p.parse_args(&["-v"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid float value: x");
    }

    #[test]
    fn test_explicit_value_skips_default() {
        let mut p = parser();
        let count = p
            .int(
                "",
                "count",
                Opts {
                    default: Some("10".to_string()),
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["--count", "3"]).unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_sub_command_dispatch() {
        let mut p = parser();
        let root_flag = p.flag("v", "verbose", Opts::default()).unwrap();
        let sub = p.add_command("install", "install a package", None).unwrap();
        let package = sub
            .borrow_mut()
            .string(
                "",
                "package",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["install", "ripgrep"]).unwrap();
        assert!(!p.invoked());
        assert!(sub.borrow().invoked());
        assert_eq!(package.get(), "ripgrep");
        assert!(!root_flag.get());
    }

    #[test]
    fn test_uninvoked_sub_skips_defaults_and_required() {
        let mut p = parser();
        p.flag("v", "verbose", Opts::default()).unwrap();
        let sub = p.add_command("install", "install a package", None).unwrap();
        let target = sub
            .borrow_mut()
            .string(
                "",
                "target",
                Opts {
                    default: Some("here".to_string()),
                    ..Opts::default()
                },
            )
            .unwrap();
        sub.borrow_mut()
            .string(
                "",
                "package",
                Opts {
                    required: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        // sibling path: the sub-command is never reached, so neither its
        // default nor its required check may fire
        p.parse_args(&["-v"]).unwrap();
        assert!(!target.is_assigned());
        assert_eq!(target.get(), "");
    }

    #[test]
    fn test_dispatching_parent_skips_required() {
        let mut p = parser();
        p.string(
            "",
            "out",
            Opts {
                required: true,
                ..Opts::default()
            },
        )
        .unwrap();
        let sub = p
            .add_command(
                "version",
                "print the version",
                Some(ParserConfig {
                    disable_default_show_help: true,
                    ..ParserConfig::default()
                }),
            )
            .unwrap();
        p.parse_args(&["version"]).unwrap();
        assert!(!p.invoked());
        assert!(!sub.borrow().invoked());
    }

    #[test]
    fn test_invoke_action() {
        let hits = Rc::new(RefCell::new(0));
        let mut p = parser();
        let sub = p.add_command("run", "run the thing", None).unwrap();
        sub.borrow_mut().flag("", "fast", Opts::default()).unwrap();
        let counter = Rc::clone(&hits);
        sub.borrow_mut().set_invoke_action(move |invoked| {
            assert!(invoked);
            *counter.borrow_mut() += 1;
        });
        p.parse_args(&["run", "--fast"]).unwrap();
        assert!(sub.borrow().invoked());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_invoke_action_on_dispatching_parent() {
        let seen = Rc::new(RefCell::new(None));
        let mut p = parser();
        p.add_command(
            "run",
            "run the thing",
            Some(ParserConfig {
                disable_default_show_help: true,
                ..ParserConfig::default()
            }),
        )
        .unwrap();
        let sink = Rc::clone(&seen);
        p.set_invoke_action(move |invoked| *sink.borrow_mut() = Some(invoked));
        p.parse_args(&["run"]).unwrap();
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn test_add_command_errors() {
        let mut p = parser();
        assert_eq!(
            p.add_command("", "x", None).err(),
            Some(DeclarationError::EmptyCommand)
        );
        assert_eq!(
            p.add_command("a b", "x", None).err(),
            Some(DeclarationError::CommandWithSpace("a b".to_string()))
        );
        p.add_command("install", "install a package", None).unwrap();
        assert_eq!(
            p.add_command("install", "again", None).err(),
            Some(DeclarationError::CommandConflict {
                name: "install".to_string(),
                help: "install a package".to_string(),
            })
        );
    }

    #[test]
    fn test_option_conflict() {
        let mut p = parser();
        p.flag(
            "v",
            "verbose",
            Opts {
                help: "talk more".to_string(),
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.flag("v", "version", Opts::default()).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::Conflict {
                entry: "-v".to_string(),
                help: "talk more".to_string(),
            }
        );
    }

    #[test]
    fn test_positional_conflict() {
        let mut p = parser();
        p.string(
            "",
            "file",
            Opts {
                positional: true,
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p
            .string(
                "",
                "file",
                Opts {
                    positional: true,
                    ..Opts::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DeclarationError::Conflict { entry, .. } if entry == "file"));
    }

    #[test]
    fn test_inheritable_shared_into_sub() {
        let mut p = parser();
        let verbose = p
            .flag(
                "v",
                "verbose",
                Opts {
                    inheritable: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        let sub = p.add_command("run", "run the thing", None).unwrap();
        p.parse_args(&["run", "-v"]).unwrap();
        assert!(verbose.get());
        assert!(sub.borrow().invoked());
    }

    #[test]
    fn test_inheritable_overridden_by_own_declaration() {
        let mut p = parser();
        let parent_verbose = p
            .flag(
                "v",
                "verbose",
                Opts {
                    inheritable: true,
                    ..Opts::default()
                },
            )
            .unwrap();
        let sub = p.add_command("run", "run the thing", None).unwrap();
        let own_verbose = sub.borrow_mut().flag("v", "verbose", Opts::default()).unwrap();
        p.parse_args(&["run", "-v"]).unwrap();
        assert!(own_verbose.get());
        assert!(!parent_verbose.get());
    }

    #[test]
    fn test_non_inheritable_not_shared() {
        let mut p = parser();
        p.flag("v", "verbose", Opts::default()).unwrap();
        p.add_command("run", "run the thing", None).unwrap();
        let err = p.parse_args(&["run", "-v"]).unwrap_err();
        assert!(matches!(err, ParseError::Unrecognized { token, .. } if token == "-v"));
    }

    #[test]
    fn test_attach_shares_storage() {
        let mut root = parser();
        let level = root.int("", "level", Opts::default()).unwrap();
        let mut other = Parser::new("other", "another entry point", ParserConfig::default());
        other.attach(&level).unwrap();
        other.parse_args(&["--level", "9"]).unwrap();
        assert_eq!(level.get(), 9);
    }

    #[test]
    fn test_attach_conflict() {
        let mut root = parser();
        let level = root.int("", "level", Opts::default()).unwrap();
        let mut other = parser();
        other.int("", "level", Opts::default()).unwrap();
        assert!(matches!(
            other.attach(&level),
            Err(DeclarationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_action_collects_raw_tokens() {
        let total = Rc::new(RefCell::new(0i64));
        let sink = Rc::clone(&total);
        let mut p = parser();
        p.ints(
            "",
            "num",
            Opts {
                positional: true,
                action: Some(Box::new(move |raws| {
                    for raw in raws {
                        let n: i64 = raw.parse().map_err(|_| format!("bad number {}", raw))?;
                        *sink.borrow_mut() += n;
                    }
                    Ok(())
                })),
                ..Opts::default()
            },
        )
        .unwrap();
        p.parse_args(&["1", "2", "3"]).unwrap();
        assert_eq!(*total.borrow(), 6);
    }

    #[test]
    fn test_flag_action_error_propagates() {
        let mut p = parser();
        p.flag(
            "x",
            "",
            Opts {
                action: Some(Box::new(|_| Err("refused".to_string()))),
                ..Opts::default()
            },
        )
        .unwrap();
        let err = p.parse_args(&["-x"]).unwrap_err();
        assert_eq!(err, ParseError::Hook("refused".to_string()));
    }

    #[test]
    fn test_empty_args_shows_help() {
        let mut p = parser();
        let err = p.parse_args::<&str>(&[]).unwrap_err();
        assert_eq!(err, ParseError::HelpShown);
        assert!(err.is_break());
        assert_eq!(err.to_string(), "");
    }

    #[test]
    fn test_continue_on_help() {
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                continue_on_help: true,
                ..ParserConfig::default()
            },
        );
        let name = p
            .string(
                "",
                "name",
                Opts {
                    default: Some("tom".to_string()),
                    ..Opts::default()
                },
            )
            .unwrap();
        p.parse_args(&["--help"]).unwrap();
        assert_eq!(name.get(), "tom");
    }

    #[test]
    fn test_disable_default_show_help() {
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                disable_default_show_help: true,
                ..ParserConfig::default()
            },
        );
        // no tokens were consumed, so the parser does not count as invoked
        p.parse_args::<&str>(&[]).unwrap();
        assert!(!p.invoked());
    }

    #[test]
    fn test_invoke_action_sees_empty_input_as_not_invoked() {
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                disable_default_show_help: true,
                ..ParserConfig::default()
            },
        );
        p.set_invoke_action(move |invoked| *sink.borrow_mut() = Some(invoked));
        p.parse_args::<&str>(&[]).unwrap();
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn test_flag_default_is_inert() {
        let mut p = parser();
        let verbose = p
            .flag(
                "v",
                "verbose",
                Opts {
                    default: Some("yes".to_string()),
                    ..Opts::default()
                },
            )
            .unwrap();
        p.string(
            "",
            "file",
            Opts {
                positional: true,
                ..Opts::default()
            },
        )
        .unwrap();
        p.parse_args(&["a.txt"]).unwrap();
        assert!(!verbose.is_assigned());
        assert!(!verbose.get());
    }

    #[test]
    fn test_disable_help_frees_the_names() {
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                disable_help: true,
                disable_default_show_help: true,
                ..ParserConfig::default()
            },
        );
        let hostname = p.string("h", "help", Opts::default()).unwrap();
        p.parse_args(&["-h", "somewhere"]).unwrap();
        assert_eq!(hostname.get(), "somewhere");
    }

    #[test]
    fn test_default_action_on_empty_args() {
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                default_action: Some(Box::new(move || *counter.borrow_mut() += 1)),
                ..ParserConfig::default()
            },
        );
        p.parse_args::<&str>(&[]).unwrap();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_default_action_in_sub_command() {
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let mut p = parser();
        p.add_command(
            "run",
            "run the thing",
            Some(ParserConfig {
                default_action: Some(Box::new(move || *counter.borrow_mut() += 1)),
                ..ParserConfig::default()
            }),
        )
        .unwrap();
        p.parse_args(&["run"]).unwrap();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_completion_flag_breaks() {
        let mut p = Parser::new(
            "test",
            "this is a test program",
            ParserConfig {
                add_shell_completion: true,
                ..ParserConfig::default()
            },
        );
        let err = p.parse_args(&["--completion"]).unwrap_err();
        assert_eq!(err, ParseError::CompletionShown);
        assert!(err.is_break());
    }

    #[test]
    fn test_repeated_flag_stays_set() {
        let mut p = parser();
        let verbose = p.flag("v", "verbose", Opts::default()).unwrap();
        p.parse_args(&["-v", "--verbose"]).unwrap();
        assert!(verbose.get());
    }
}

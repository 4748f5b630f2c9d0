use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::rc::Rc;

use log::trace;

use crate::color::ColorScheme;
use crate::error::{DeclarationError, ParseError};

pub(crate) const LONG_PREFIX: &str = "--";
pub(crate) const SHORT_PREFIX: &str = "-";

/// A typed scalar produced by value coercion; also the currency for
/// [`Opts::choices`] and formatter hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Float(value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

/// The closed set of argument shapes. List kinds are greedy: they consume a
/// whole run of value tokens instead of exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Flag,
    Str,
    Int,
    Float,
    StrList,
    IntList,
    FloatList,
}

type CoerceFn = fn(&str) -> Result<Value, ParseError>;

fn coerce_str(raw: &str) -> Result<Value, ParseError> {
    Ok(Value::Str(raw.to_owned()))
}

fn coerce_int(raw: &str) -> Result<Value, ParseError> {
    raw.parse::<i64>().map(Value::Int).map_err(|_| ParseError::InvalidValue {
        kind: "int",
        raw: raw.to_owned(),
    })
}

fn coerce_float(raw: &str) -> Result<Value, ParseError> {
    raw.parse::<f64>().map(Value::Float).map_err(|_| ParseError::InvalidValue {
        kind: "float",
        raw: raw.to_owned(),
    })
}

impl ValueKind {
    pub(crate) fn is_flag(self) -> bool {
        self == ValueKind::Flag
    }

    pub(crate) fn is_multi(self) -> bool {
        matches!(self, ValueKind::StrList | ValueKind::IntList | ValueKind::FloatList)
    }

    fn type_name(self) -> &'static str {
        match self {
            ValueKind::Flag => "flag",
            ValueKind::Str | ValueKind::StrList => "string",
            ValueKind::Int | ValueKind::IntList => "int",
            ValueKind::Float | ValueKind::FloatList => "float",
        }
    }

    /// The coercion function for this kind, resolved once at construction.
    fn coercer(self) -> CoerceFn {
        match self {
            ValueKind::Int | ValueKind::IntList => coerce_int,
            ValueKind::Float | ValueKind::FloatList => coerce_float,
            _ => coerce_str,
        }
    }

    fn zero_slot(self) -> Slot {
        match self {
            ValueKind::Flag => Slot::Flag(false),
            ValueKind::Str => Slot::Str(String::new()),
            ValueKind::Int => Slot::Int(0),
            ValueKind::Float => Slot::Float(0.0),
            ValueKind::StrList => Slot::StrList(Vec::new()),
            ValueKind::IntList => Slot::IntList(Vec::new()),
            ValueKind::FloatList => Slot::FloatList(Vec::new()),
        }
    }

    fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueKind::Str | ValueKind::StrList, Value::Str(_))
                | (ValueKind::Int | ValueKind::IntList, Value::Int(_))
                | (ValueKind::Float | ValueKind::FloatList, Value::Float(_))
        )
    }
}

/// The bound storage behind one argument, starting at the type's zero value.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Flag(bool),
    Str(String),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

/// Per-raw-value guard, run before coercion.
pub type ValidateFn = Box<dyn Fn(&str) -> Result<(), String>>;
/// Per-raw-value transform, replacing the built-in coercion when present.
pub type FormatFn = Box<dyn Fn(&str) -> Result<Value, String>>;
/// Full override callback, invoked with the raw matched tokens in place of
/// normal binding.
pub type ActionFn = Box<dyn FnMut(&[String]) -> Result<(), String>>;

/// Configuration for one argument declaration.
///
/// Every field is optional; fill the ones you need and take the rest from
/// [`Opts::default`]:
///
/// ```
/// use argwalk::Opts;
///
/// let opts = Opts {
///     help: "the output file".to_string(),
///     required: true,
///     ..Opts::default()
/// };
/// # let _ = opts;
/// ```
#[derive(Default)]
pub struct Opts {
    /// Display name override for help and usage output.
    pub meta: Option<String>,
    /// Fallback raw value, bound through the normal coercion pipeline when
    /// the argument was not assigned by the user.
    pub default: Option<String>,
    /// The argument must end the parse assigned (explicitly or by default).
    pub required: bool,
    /// Match by token position rather than by a `-`/`--` name.
    pub positional: bool,
    /// Exclude from help and completion output; no parsing effect.
    pub hide_entry: bool,
    /// Description shown in help output.
    pub help: String,
    /// Suppress the generated hint suffix for this argument when the parser
    /// runs with `with_hint`.
    pub no_hint: bool,
    /// Literal hint text, replacing the generated default/choices/required
    /// hint.
    pub hint_info: Option<String>,
    /// Display grouping key; grouped arguments render in their own help
    /// section, in first-seen group order.
    pub group: Option<String>,
    /// Sub-commands created after this declaration inherit the argument
    /// (sharing its storage); their own declarations override it.
    pub inheritable: bool,
    /// Closed set of allowed values, checked after coercion.
    pub choices: Vec<Value>,
    /// Per-raw-value guard, run before coercion; the first failure aborts.
    pub validate: Option<ValidateFn>,
    /// Per-raw-value transform replacing the built-in coercion.
    pub formatter: Option<FormatFn>,
    /// Full override: called with the raw matched tokens, skipping
    /// coercion, choices and slot binding entirely.
    pub action: Option<ActionFn>,
}

/// One declared argument and its parse-scoped state.
pub(crate) struct Arg {
    pub(crate) short: Option<String>,
    pub(crate) long: Option<String>,
    pub(crate) kind: ValueKind,
    pub(crate) opts: Opts,
    pub(crate) assigned: bool,
    pub(crate) slot: Slot,
    coerce: CoerceFn,
}

impl Arg {
    pub(crate) fn new(short: &str, long: &str, kind: ValueKind, opts: Opts) -> Arg {
        Arg {
            short: some_name(short),
            long: some_name(long),
            slot: kind.zero_slot(),
            coerce: kind.coercer(),
            kind,
            opts,
            assigned: false,
        }
    }

    /// Check the declaration invariants, first violation wins. Runs once at
    /// registration; any error aborts the whole registration.
    pub(crate) fn validate(&self) -> Result<(), DeclarationError> {
        if self.short.is_none() && self.long.is_none() {
            return Err(DeclarationError::EmptyName);
        }
        for name in [&self.short, &self.long].into_iter().flatten() {
            if name.contains(char::is_whitespace) {
                return Err(DeclarationError::NameWithSpace(name.clone()));
            }
        }
        for name in [&self.short, &self.long].into_iter().flatten() {
            if name.starts_with(SHORT_PREFIX) {
                return Err(DeclarationError::NameWithPrefix(name.clone()));
            }
        }
        if self.short.is_some() && self.short == self.long {
            return Err(DeclarationError::ShortEqualsLong(
                self.short.clone().unwrap_or_default(),
            ));
        }
        if self.kind.is_flag() {
            if self.opts.positional {
                return Err(DeclarationError::PositionalFlag);
            }
            if self.opts.meta.is_some() {
                return Err(DeclarationError::FlagWith("meta"));
            }
            if !self.opts.choices.is_empty() {
                return Err(DeclarationError::FlagWith("choices"));
            }
            if self.opts.required {
                return Err(DeclarationError::FlagWith("required"));
            }
            if self.opts.formatter.is_some() {
                return Err(DeclarationError::FlagWith("a formatter"));
            }
            if self.opts.validate.is_some() {
                return Err(DeclarationError::FlagWith("a validator"));
            }
        }
        Ok(())
    }

    /// The dash-prefixed tokens this argument answers to. Positionals have
    /// nothing to watch, only positions.
    pub(crate) fn watchers(&self) -> Vec<String> {
        if self.opts.positional {
            return Vec::new();
        }
        let mut result = Vec::new();
        if let Some(long) = &self.long {
            result.push(format!("{}{}", LONG_PREFIX, long));
        }
        if let Some(short) = &self.short {
            result.push(format!("{}{}", SHORT_PREFIX, short));
        }
        result
    }

    pub(crate) fn identifier(&self) -> &str {
        self.long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or_default()
    }

    pub(crate) fn meta_name(&self) -> String {
        match &self.opts.meta {
            Some(meta) => meta.clone(),
            None => self.identifier().to_uppercase(),
        }
    }

    /// Bind raw tokens (or the default, or flag presence) to the slot.
    ///
    /// Pipeline order: action override, flag presence, default substitution,
    /// validate hooks, coercion (formatter or built-in), choice membership,
    /// slot write. The first failure aborts, later stages never run.
    pub(crate) fn bind(&mut self, raws: &[String]) -> Result<(), ParseError> {
        self.assigned = true;
        trace!("binding {} value(s) to '{}'", raws.len(), self.identifier());
        if let Some(action) = self.opts.action.as_mut() {
            return action(raws).map_err(ParseError::Hook);
        }
        if self.kind.is_flag() {
            self.slot = Slot::Flag(true);
            return Ok(());
        }
        let mut raws = raws.to_vec();
        if raws.is_empty() {
            if let Some(default) = &self.opts.default {
                raws.push(default.clone());
            }
        }
        if let Some(validate) = &self.opts.validate {
            for raw in &raws {
                validate(raw).map_err(ParseError::Hook)?;
            }
        }
        let mut coerced = Vec::with_capacity(raws.len());
        if let Some(formatter) = &self.opts.formatter {
            for raw in &raws {
                let value = formatter(raw).map_err(ParseError::Hook)?;
                if !self.kind.accepts(&value) {
                    return Err(ParseError::FormatterType(self.kind.type_name()));
                }
                coerced.push(value);
            }
        } else {
            for raw in &raws {
                coerced.push((self.coerce)(raw)?);
            }
        }
        if !self.opts.choices.is_empty() {
            for value in &coerced {
                if !self.opts.choices.contains(value) {
                    return Err(ParseError::InvalidChoice(self.dump_choices()));
                }
            }
        }
        self.store(coerced);
        Ok(())
    }

    // single-valued slots take the first coerced result, lists append all in
    // input order
    fn store(&mut self, coerced: Vec<Value>) {
        match &mut self.slot {
            Slot::Flag(_) => {}
            Slot::Str(slot) => {
                if let Some(Value::Str(v)) = coerced.into_iter().next() {
                    *slot = v;
                }
            }
            Slot::Int(slot) => {
                if let Some(Value::Int(v)) = coerced.into_iter().next() {
                    *slot = v;
                }
            }
            Slot::Float(slot) => {
                if let Some(Value::Float(v)) = coerced.into_iter().next() {
                    *slot = v;
                }
            }
            Slot::StrList(slot) => {
                for value in coerced {
                    if let Value::Str(v) = value {
                        slot.push(v);
                    }
                }
            }
            Slot::IntList(slot) => {
                for value in coerced {
                    if let Value::Int(v) = value {
                        slot.push(v);
                    }
                }
            }
            Slot::FloatList(slot) => {
                for value in coerced {
                    if let Value::Float(v) = value {
                        slot.push(v);
                    }
                }
            }
        }
    }

    pub(crate) fn dump_choices(&self) -> String {
        self.opts
            .choices
            .iter()
            .map(Value::to_string)
            .collect::<Vec<String>>()
            .join(", ")
    }

    /// Usage fragment, e.g. `[-v]`, `[--out OUT]`, `FILE [FILE ...]`.
    pub(crate) fn format_usage(&self) -> String {
        if self.opts.hide_entry {
            return String::new();
        }
        let meta = self.meta_name();
        if self.opts.positional {
            return match (self.opts.required, self.kind.is_multi()) {
                (true, true) => format!("{} [{} ...] ", meta, meta),
                (true, false) => format!("{} ", meta),
                (false, true) => format!("[{} [{} ...]] ", meta, meta),
                (false, false) => format!("[{}] ", meta),
            };
        }
        let watchers = self.watchers();
        let sign = watchers.first().map(String::as_str).unwrap_or_default();
        if self.kind.is_flag() {
            return format!("[{}] ", sign);
        }
        let unit = format!("{} {}", sign, meta);
        match (self.opts.required, self.kind.is_multi()) {
            (true, true) => format!("{} [{} ...] ", unit, meta),
            (true, false) => format!("{} ", unit),
            (false, true) => format!("[{} [{} ...]] ", unit, meta),
            (false, false) => format!("[{}] ", unit),
        }
    }

    /// Help header column for this argument: the visible width plus the
    /// (possibly styled) content. The two are separate because ANSI escapes
    /// must not count toward column alignment.
    pub(crate) fn help_header(&self, scheme: &ColorScheme) -> (usize, String) {
        let meta = self.meta_name();
        if self.opts.positional {
            return (meta.len(), scheme.argument.paint(meta.as_str()).to_string());
        }
        let mut size = 0;
        let mut parts = Vec::new();
        for watcher in self.watchers() {
            if self.kind.is_flag() {
                size += watcher.len();
                parts.push(scheme.argument.paint(watcher.as_str()).to_string());
            } else {
                size += watcher.len() + meta.len() + 1;
                parts.push(format!(
                    "{} {}",
                    scheme.argument.paint(watcher.as_str()),
                    scheme.meta.paint(meta.as_str())
                ));
            }
        }
        if parts.len() > 1 {
            size += (parts.len() - 1) * 2;
        }
        (size, parts.join(", "))
    }

    /// Help text with the hint suffix appended: the literal `hint_info` when
    /// given, otherwise a generated summary of default, choices and
    /// required-ness.
    pub(crate) fn help_with_hint(&self) -> String {
        let mut help = self.opts.help.clone();
        if !help.is_empty() {
            help.push(' ');
        }
        if let Some(hint) = &self.opts.hint_info {
            return format!("{}({})", help, hint);
        }
        let mut extras = Vec::new();
        if let Some(default) = &self.opts.default {
            extras.push(format!("default: {}", default));
        }
        if !self.opts.choices.is_empty() {
            extras.push(format!("options: [{}]", self.dump_choices()));
        }
        if self.opts.required {
            extras.push("required".to_string());
        }
        if extras.is_empty() {
            self.opts.help.clone()
        } else {
            format!("{}({})", help, extras.join(", "))
        }
    }
}

fn some_name(name: &str) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// The caller-visible handle to one argument's bound value.
///
/// Typed factory methods on [`Parser`](crate::Parser) return a `Binding`
/// for the matching Rust type; after a parse, [`Binding::get`] yields the
/// bound value (the type's zero value while unassigned). The handle shares
/// storage with the parser — and with every parser the argument is attached
/// to — so there is exactly one assigned state per declaration.
pub struct Binding<T> {
    arg: Rc<RefCell<Arg>>,
    _marker: PhantomData<T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Binding {
            arg: Rc::clone(&self.arg),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let arg = self.arg.borrow();
        f.debug_struct("Binding")
            .field("argument", &arg.identifier())
            .field("assigned", &arg.assigned)
            .finish()
    }
}

impl<T> Binding<T> {
    pub(crate) fn new(arg: Rc<RefCell<Arg>>) -> Binding<T> {
        Binding {
            arg,
            _marker: PhantomData,
        }
    }

    pub(crate) fn arg(&self) -> &Rc<RefCell<Arg>> {
        &self.arg
    }

    /// True once any value — explicit or default — has been bound.
    pub fn is_assigned(&self) -> bool {
        self.arg.borrow().assigned
    }
}

impl Binding<bool> {
    /// True once the flag was seen on the command line.
    pub fn get(&self) -> bool {
        match self.arg.borrow().slot {
            Slot::Flag(v) => v,
            _ => false,
        }
    }
}

impl Binding<String> {
    pub fn get(&self) -> String {
        match &self.arg.borrow().slot {
            Slot::Str(v) => v.clone(),
            _ => String::new(),
        }
    }
}

impl Binding<i64> {
    pub fn get(&self) -> i64 {
        match self.arg.borrow().slot {
            Slot::Int(v) => v,
            _ => 0,
        }
    }
}

impl Binding<f64> {
    pub fn get(&self) -> f64 {
        match self.arg.borrow().slot {
            Slot::Float(v) => v,
            _ => 0.0,
        }
    }
}

impl Binding<Vec<String>> {
    pub fn get(&self) -> Vec<String> {
        match &self.arg.borrow().slot {
            Slot::StrList(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

impl Binding<Vec<i64>> {
    pub fn get(&self) -> Vec<i64> {
        match &self.arg.borrow().slot {
            Slot::IntList(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

impl Binding<Vec<f64>> {
    pub fn get(&self) -> Vec<f64> {
        match &self.arg.borrow().slot {
            Slot::FloatList(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

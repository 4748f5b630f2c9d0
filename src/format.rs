use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::arg::Arg;
use crate::parser::Parser;

const FALLBACK_WIDTH: usize = 80;
const LEFT_INDENT: usize = 2;
const COLUMN_GAP: usize = 2;

pub(crate) fn terminal_width() -> usize {
    match crossterm::terminal::size() {
        Ok((cols, _)) if cols > 0 => cols as usize,
        _ => FALLBACK_WIDTH,
    }
}

/// One help row: a two-space indent, the header, then the description
/// aligned to a shared column and wrapped to the terminal width.
///
/// `head_len` is the visible width of `head`; the two differ when the
/// header carries ANSI styling. A header wider than `max_len` pushes its
/// description onto the following line.
pub(crate) fn format_help_row(
    head_len: usize,
    head: &str,
    content: &str,
    max_len: usize,
    width: usize,
) -> String {
    let col = LEFT_INDENT + max_len + COLUMN_GAP;
    let mut out = String::with_capacity(col + content.len());
    out.push_str(&" ".repeat(LEFT_INDENT));
    out.push_str(head);
    if content.is_empty() {
        return out;
    }
    let wrap_width = width.saturating_sub(col).max(10);
    let lines = textwrap::wrap(content, wrap_width);
    if head_len > max_len {
        out.push('\n');
        out.push_str(&" ".repeat(col));
    } else {
        out.push_str(&" ".repeat(col - LEFT_INDENT - head_len));
    }
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&" ".repeat(col));
        }
        out.push_str(line);
    }
    out
}

impl Parser {
    /// The one-line usage summary, generated from the registered arguments
    /// unless the config carries a manual override.
    pub fn format_usage(&self) -> String {
        let scheme = self.palette();
        if !self.config.usage.is_empty() {
            return scheme.usage.paint(self.config.usage.as_str()).to_string();
        }
        let mut usage = String::from("usage: ");
        for parent in &self.parents {
            usage.push_str(parent);
            usage.push(' ');
        }
        usage.push_str(&self.name);
        usage.push(' ');
        if !self.sub_map.is_empty() {
            usage.push_str("<cmd> ");
        }
        for entry in &self.entries {
            usage.push_str(&entry.borrow().format_usage());
        }
        for reg in &self.positionals {
            usage.push_str(&reg.arg.borrow().format_usage());
        }
        scheme.usage.paint(usage.trim_end()).to_string()
    }

    /// The full help text: usage, description, sub-commands, positional
    /// arguments, options, group sections and the epilog.
    pub fn format_help(&self) -> String {
        self.render_help(terminal_width())
    }

    pub(crate) fn render_help(&self, width: usize) -> String {
        let scheme = self.palette();
        let mut max_len = 0usize;
        for sub in self.sub_map.keys() {
            max_len = max_len.max(sub.len());
        }
        for arg in self.visible_args() {
            let (size, _) = arg.borrow().help_header(&scheme);
            max_len = max_len.max(size);
        }
        if self.config.max_header_length > 0 {
            max_len = max_len.min(self.config.max_header_length);
        }

        let mut out = self.format_usage();
        if !self.description.is_empty() {
            out.push_str("\n\n");
            out.push_str(&scheme.description.paint(self.description.as_str()).to_string());
        }

        if !self.sub_map.is_empty() {
            out.push_str("\n\n");
            out.push_str(&scheme.group_title.paint("available commands:").to_string());
            for (name, sub) in &self.sub_map {
                out.push('\n');
                let head = scheme.command.paint(name.as_str()).to_string();
                out.push_str(&format_help_row(
                    name.len(),
                    &head,
                    &sub.borrow().description,
                    max_len,
                    width,
                ));
            }
        }

        let mut groups: IndexMap<String, Vec<Rc<RefCell<Arg>>>> = IndexMap::new();
        let mut plain_positionals = Vec::new();
        let mut plain_options = Vec::new();
        for arg in self.visible_args() {
            let group = arg.borrow().opts.group.clone();
            match group {
                Some(group) => groups.entry(group).or_default().push(arg),
                None if arg.borrow().opts.positional => plain_positionals.push(arg),
                None => plain_options.push(arg),
            }
        }

        let render_section = |out: &mut String, title: &str, members: &[Rc<RefCell<Arg>>]| {
            if members.is_empty() {
                return;
            }
            out.push_str("\n\n");
            out.push_str(&scheme.group_title.paint(title).to_string());
            for arg in members {
                let arg = arg.borrow();
                let (size, head) = arg.help_header(&scheme);
                out.push('\n');
                out.push_str(&format_help_row(
                    size,
                    &head,
                    &self.help_content(&arg),
                    max_len,
                    width,
                ));
            }
        };

        render_section(&mut out, "positional arguments:", &plain_positionals);
        render_section(&mut out, "options:", &plain_options);
        for (group, members) in &groups {
            render_section(&mut out, &format!("{}:", group), members);
        }

        if !self.config.epilog.is_empty() {
            out.push_str("\n\n");
            out.push_str(&scheme.epilog.paint(self.config.epilog.as_str()).to_string());
        }
        out
    }

    fn help_content(&self, arg: &Arg) -> String {
        if self.config.with_hint && !arg.opts.no_hint {
            arg.help_with_hint()
        } else {
            arg.opts.help.clone()
        }
    }

    // display order: optionals as declared, then positionals
    fn visible_args(&self) -> Vec<Rc<RefCell<Arg>>> {
        self.entries
            .iter()
            .chain(self.positionals.iter().map(|r| &r.arg))
            .filter(|a| !a.borrow().opts.hide_entry)
            .cloned()
            .collect()
    }
}

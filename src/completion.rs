use crate::parser::Parser;

impl Parser {
    /// A shell completion script for this parser, covering optional
    /// argument names and one level of sub-commands. The script targets
    /// bash and loads in zsh through `bashcompinit`.
    pub fn format_completion_script(&self) -> String {
        let func = format!("_complete_{}", sanitize(&self.name));
        let mut cases = String::new();
        for (name, sub) in &self.sub_map {
            cases.push_str(&format!(
                "    {})\n      words=\"{}\"\n      ;;\n",
                name,
                sub.borrow().candidate_words().join(" ")
            ));
        }
        format!(
            r#"# completion script for {name}; source it from your shell profile
# or drop it into your completion directory

if [ -n "$ZSH_VERSION" ]; then
  autoload -U +X bashcompinit && bashcompinit
fi

{func}() {{
  local cur prev words
  cur="${{COMP_WORDS[COMP_CWORD]}}"
  prev="${{COMP_WORDS[1]}}"
  words="{words}"
  case "$prev" in
{cases}  esac
  COMPREPLY=($(compgen -W "$words" -- "$cur"))
}}

complete -F {func} {name}
"#,
            name = self.name,
            func = func,
            words = self.candidate_words().join(" "),
            cases = cases,
        )
    }

    // sub-command names first, then the visible watchers in declaration
    // order
    fn candidate_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self.sub_map.keys().cloned().collect();
        for arg in &self.entries {
            let arg = arg.borrow();
            if arg.opts.hide_entry {
                continue;
            }
            words.extend(arg.watchers());
        }
        words
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod test {
    use crate::arg::Opts;
    use crate::parser::{Parser, ParserConfig};

    #[test]
    fn test_script_lists_watchers_and_commands() {
        let mut p = Parser::new("pkg-tool", "package things", ParserConfig::default());
        p.flag("v", "verbose", Opts::default()).unwrap();
        let sub = p.add_command("install", "install a package", None).unwrap();
        sub.borrow_mut()
            .string("", "target", Opts::default())
            .unwrap();
        let script = p.format_completion_script();
        assert!(script.contains("complete -F _complete_pkg_tool pkg-tool"));
        assert!(script.contains("--verbose"));
        assert!(script.contains("install)"));
        assert!(script.contains("--target"));
        assert!(script.contains("bashcompinit"));
    }

    #[test]
    fn test_script_skips_hidden_entries() {
        let mut p = Parser::new("tool", "a tool", ParserConfig::default());
        p.string(
            "",
            "secret",
            Opts {
                hide_entry: true,
                ..Opts::default()
            },
        )
        .unwrap();
        let script = p.format_completion_script();
        assert!(!script.contains("--secret"));
    }
}

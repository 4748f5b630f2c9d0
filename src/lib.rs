//! A command line argument parser with typed bindings, greedy multi-value
//! matching and sub-commands.
//!
//! Arguments are declared up front through typed factory methods on
//! [`Parser`]; each declaration hands back a [`Binding`] that reads the
//! bound value after a parse. Multi-value arguments consume a whole run of
//! value tokens, sub-commands own their token tail wholesale, and
//! unrecognized names come back with edit-distance suggestions.
//!
//! ```
//! use argwalk::{Opts, Parser, ParserConfig};
//!
//! let mut parser = Parser::new("grab", "fetch files over the network", ParserConfig::default());
//! let verbose = parser
//!     .flag("v", "verbose", Opts {
//!         help: "print progress details".to_string(),
//!         ..Opts::default()
//!     })
//!     .unwrap();
//! let retries = parser
//!     .int("r", "retries", Opts {
//!         default: Some("3".to_string()),
//!         ..Opts::default()
//!     })
//!     .unwrap();
//! let urls = parser
//!     .strings("", "url", Opts {
//!         positional: true,
//!         required: true,
//!         ..Opts::default()
//!     })
//!     .unwrap();
//!
//! parser.parse_args(&["-v", "http://a.example", "http://b.example"]).unwrap();
//! assert!(verbose.get());
//! assert_eq!(retries.get(), 3);
//! assert_eq!(urls.get().len(), 2);
//! ```
//!
//! Sub-commands are parsers of their own; the first token decides which one
//! handles the rest of the command line:
//!
//! ```
//! use argwalk::{Opts, Parser, ParserConfig};
//!
//! let mut parser = Parser::new("pkg", "a tiny package manager", ParserConfig::default());
//! let install = parser.add_command("install", "install a package", None).unwrap();
//! let name = install
//!     .borrow_mut()
//!     .string("", "package", Opts {
//!         positional: true,
//!         ..Opts::default()
//!     })
//!     .unwrap();
//!
//! parser.parse_args(&["install", "ripgrep"]).unwrap();
//! assert!(install.borrow().invoked());
//! assert_eq!(name.get(), "ripgrep");
//! ```
//!
//! In a binary, [`Parser::parse_or_exit`] reads the process command line
//! and turns parse failures (and `--help`) into the conventional exits.

pub use arg::{ActionFn, Binding, FormatFn, Opts, ValidateFn, Value};
pub use color::ColorScheme;
pub use error::{DeclarationError, ParseError};
pub use parser::{Parser, ParserConfig};

mod arg;
mod color;
mod completion;
mod error;
mod format;
mod parser;
mod suggest;

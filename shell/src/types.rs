//! The parsed job model handed from the line parser to the execution engine.
//!
//! Every byte slice borrows from the input line, so a `JobList` lives no
//! longer than the line it was parsed from.

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WriteMode { Truncate, Append }

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode { Foreground, Background }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OutputRedirect<'a> {
	pub path: &'a [u8],
	pub mode: WriteMode,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command<'a> {
	pub name: &'a [u8],
	/// Full argument vector; element 0 is the program name.
	pub arguments: Vec<&'a [u8]>,
	pub input: Option<&'a [u8]>,
	pub output: Option<OutputRedirect<'a>>,
}

impl<'a> Command<'a> {
	pub fn new(arguments: Vec<&'a [u8]>) -> Command<'a> {
		let name = arguments.first().copied().unwrap_or(&b""[..]);
		Command { name: name, arguments: arguments, input: None, output: None }
	}

	/// Builds a command from UTF-8 words, mainly for callers that do not go
	/// through the line parser.
	pub fn from_words(words: &[&'a str]) -> Command<'a> {
		Command::new(words.iter().map(|w| w.as_bytes()).collect())
	}

	pub fn input_from(mut self, path: &'a [u8]) -> Command<'a> {
		self.input = Some(path);
		self
	}

	pub fn output_to(mut self, path: &'a [u8], mode: WriteMode) -> Command<'a> {
		self.output = Some(OutputRedirect { path: path, mode: mode });
		self
	}

	pub fn has_redirects(&self) -> bool {
		self.input.is_some() || self.output.is_some()
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline<'a> {
	pub commands: Vec<Command<'a>>,
	pub mode: Mode,
}

impl<'a> Pipeline<'a> {
	pub fn foreground(commands: Vec<Command<'a>>) -> Pipeline<'a> {
		Pipeline { commands: commands, mode: Mode::Foreground }
	}

	pub fn background(commands: Vec<Command<'a>>) -> Pipeline<'a> {
		Pipeline { commands: commands, mode: Mode::Background }
	}

	pub fn is_background(&self) -> bool {
		self.mode == Mode::Background
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct JobList<'a> {
	pub pipelines: Vec<Pipeline<'a>>,
}

impl<'a> JobList<'a> {
	pub fn is_empty(&self) -> bool {
		self.pipelines.is_empty()
	}
}

use crate::types::*;

pub type ParseResult<T> = Result<T, String>;

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<u8> {
		self.line.get(self.i).copied()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' | b';' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn read_target(&mut self, what: &str) -> ParseResult<&'a [u8]> {
		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(format!("empty {} redirect", what));
		}
		Ok(target)
	}

	/// Consumes one redirection if the cursor is on `<`, `>` or `>>`.
	fn parse_redirect(&mut self, command: &mut Command<'a>) -> ParseResult<bool> {
		match self.peek() {
			Some(b'<') => {
				self.i += 1;
				command.input = Some(self.read_target("input")?);
			},
			Some(b'>') => {
				let mode = if self.line.get(self.i + 1) == Some(&b'>') {
					self.i += 2;
					WriteMode::Append
				} else {
					self.i += 1;
					WriteMode::Truncate
				};
				if self.peek() == Some(b'>') {
					return Err("unexpected '>'".to_string());
				}
				let path = self.read_target("output")?;
				command.output = Some(OutputRedirect { path: path, mode: mode });
			},
			_ => { return Ok(false); },
		}
		Ok(true)
	}

	fn parse_command(&mut self) -> ParseResult<Command<'a>> {
		let mut command = Command::new(vec![]);

		loop {
			self.skip_whitespaces();
			if self.parse_redirect(&mut command)? {
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			command.arguments.push(word);
		}

		match command.arguments.first() {
			Some(&name) => command.name = name,
			None => { return Err("empty command".to_string()); },
		}
		Ok(command)
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline<'a>> {
		let mut commands: Vec<Command<'a>> = vec![];

		loop {
			commands.push(self.parse_command()?);
			if self.peek() == Some(b'|') {
				self.i += 1;
			} else {
				break;
			}
		}
		Ok(Pipeline::foreground(commands))
	}

	fn parse_job_list(&mut self) -> ParseResult<JobList<'a>> {
		let mut job_list = JobList::default();

		loop {
			self.skip_whitespaces();
			if self.peek().is_none() {
				break;
			}
			let mut pipeline = self.parse_pipeline()?;
			match self.peek() {
				Some(b'&') => {
					self.i += 1;
					pipeline.mode = Mode::Background;
				},
				Some(b';') => { self.i += 1; },
				Some(c) => { return Err(format!("unknown command separator: '{}'", c as char)); },
				None => {},
			}
			job_list.pipelines.push(pipeline);
		}
		Ok(job_list)
	}
}

/// Parses one input line into a job list.
pub fn parse(line: &[u8]) -> ParseResult<JobList<'_>> {
	let mut parser = Parser { line: line, i: 0 };
	parser.parse_job_list()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_line() {
		assert!(parse(b"  \n").unwrap().is_empty());
	}

	#[test]
	fn pipeline_with_redirects() {
		let jobs = parse(b"sort -r < in.txt | uniq >> out.txt\n").unwrap();
		assert_eq!(jobs.pipelines.len(), 1);
		let pipeline = &jobs.pipelines[0];
		assert_eq!(pipeline.mode, Mode::Foreground);
		assert_eq!(pipeline.commands, vec![
			Command::from_words(&["sort", "-r"]).input_from(b"in.txt"),
			Command::from_words(&["uniq"]).output_to(b"out.txt", WriteMode::Append),
		]);
	}

	#[test]
	fn redirect_before_name() {
		let jobs = parse(b">out echo hi").unwrap();
		let command = &jobs.pipelines[0].commands[0];
		assert_eq!(command.name, b"echo");
		assert_eq!(command.arguments, Command::from_words(&["echo", "hi"]).arguments);
		assert_eq!(command.output, Some(OutputRedirect { path: b"out", mode: WriteMode::Truncate }));
	}

	#[test]
	fn background_and_sequence() {
		let jobs = parse(b"sleep 10 & ls; cat a &").unwrap();
		let modes: Vec<Mode> = jobs.pipelines.iter().map(|p| p.mode).collect();
		assert_eq!(modes, vec![Mode::Background, Mode::Foreground, Mode::Background]);
	}

	#[test]
	fn errors() {
		assert_eq!(parse(b"ls |").unwrap_err(), "empty command");
		assert_eq!(parse(b"| ls").unwrap_err(), "empty command");
		assert_eq!(parse(b"ls >").unwrap_err(), "empty output redirect");
		assert_eq!(parse(b"ls < | cat").unwrap_err(), "empty input redirect");
		assert_eq!(parse(b"ls >>> x").unwrap_err(), "unexpected '>'");
	}
}

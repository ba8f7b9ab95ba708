use std::fmt;

use crate::types::*;

struct Bytes<'a>(&'a [u8]);

impl<'a> fmt::Display for Bytes<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&String::from_utf8_lossy(self.0))
	}
}

impl fmt::Display for WriteMode {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			WriteMode::Truncate => "trunc",
			WriteMode::Append => "append",
		})
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			Mode::Foreground => "foreground",
			Mode::Background => "background",
		})
	}
}

/// Renders a pipeline back in command-line form, e.g. `sort < in | uniq >> out &`.
impl<'a> fmt::Display for Pipeline<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, command) in self.commands.iter().enumerate() {
			if i != 0 {
				f.write_str(" | ")?;
			}
			for (j, arg) in command.arguments.iter().enumerate() {
				if j != 0 {
					f.write_str(" ")?;
				}
				write!(f, "{}", Bytes(arg))?;
			}
			if let Some(path) = command.input {
				write!(f, " < {}", Bytes(path))?;
			}
			if let Some(ref output) = command.output {
				let op = if output.mode == WriteMode::Append { ">>" } else { ">" };
				write!(f, " {} {}", op, Bytes(output.path))?;
			}
		}
		if self.is_background() {
			f.write_str(" &")?;
		}
		Ok(())
	}
}

/// The plain-text dump printed by `--print-jobs`.
impl<'a> fmt::Display for JobList<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (index, pipeline) in self.pipelines.iter().enumerate() {
			writeln!(f, "id {} [ {} ]", index, pipeline.mode)?;
			for command in &pipeline.commands {
				writeln!(f, "* program = {}", Bytes(command.name))?;
				for (i, arg) in command.arguments.iter().enumerate() {
					writeln!(f, "  - arg[ {} ] = {}", i, Bytes(arg))?;
				}
				if let Some(path) = command.input {
					writeln!(f, "  - input redirection = {}", Bytes(path))?;
				}
				if let Some(ref output) = command.output {
					writeln!(f, "  - output redirection = {} [ {} ]", Bytes(output.path), output.mode)?;
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::parser::parse;

	#[test]
	fn dump() {
		let jobs = parse(b"cat < a | wc -l >> b &").unwrap();
		assert_eq!(jobs.to_string(), "\
id 0 [ background ]
* program = cat
  - arg[ 0 ] = cat
  - input redirection = a
* program = wc
  - arg[ 0 ] = wc
  - arg[ 1 ] = -l
  - output redirection = b [ append ]
");
	}

	#[test]
	fn command_line_form() {
		let jobs = parse(b"sort  -r <in|uniq>out").unwrap();
		assert_eq!(jobs.pipelines[0].to_string(), "sort -r < in | uniq > out");
	}
}

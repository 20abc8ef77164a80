//! Interactive prompting on the terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use forge_blueprint::{Answer, BlueprintError, BlueprintResult, Prompter, Question, VariableType};
use regex::Regex;

/// Asks questions on stderr and reads answers from stdin.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    interactive: bool,
    masked: bool,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompter bound to the process's stdin and stderr.
    pub fn stdio() -> Self {
        let interactive = io::stdin().is_terminal();
        Self {
            input: io::stdin().lock(),
            output: io::stderr(),
            interactive,
            masked: interactive,
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    /// Prompter over arbitrary streams; secrets are read as plain lines.
    pub fn with_io(input: R, output: W) -> Self {
        Self {
            input,
            output,
            interactive: true,
            masked: false,
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn read_masked(&mut self) -> io::Result<String> {
        terminal::enable_raw_mode()?;
        let result = self.read_masked_keys();
        terminal::disable_raw_mode()?;
        writeln!(self.output)?;
        result
    }

    fn read_masked_keys(&mut self) -> io::Result<String> {
        let mut secret = String::new();
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match (key.modifiers, key.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt interrupted"));
                }
                (_, KeyCode::Enter) => return Ok(secret),
                (_, KeyCode::Backspace) => {
                    if secret.pop().is_some() {
                        write!(self.output, "\u{8} \u{8}")?;
                    }
                }
                (_, KeyCode::Char(c)) => {
                    secret.push(c);
                    write!(self.output, "*")?;
                }
                _ => {}
            }
            self.output.flush()?;
        }
    }

    fn ask_text(&mut self, question: &Question, secret: bool) -> io::Result<String> {
        let pattern = compile(&question.pattern);
        loop {
            if question.default.is_empty() || secret {
                write!(self.output, "? {}: ", question.message)?;
            } else {
                write!(self.output, "? {} [{}]: ", question.message, question.default)?;
            }
            self.output.flush()?;

            let line = if secret && self.masked {
                self.read_masked()?
            } else {
                self.read_line()?
            };
            let answer = if line.trim().is_empty() {
                question.default.clone()
            } else {
                line.trim().to_string()
            };

            match &pattern {
                Some(re) if !re.is_match(&answer) => {
                    writeln!(self.output, "  value must match {}", question.pattern)?;
                }
                _ => return Ok(answer),
            }
        }
    }

    fn ask_editor(&mut self, question: &Question) -> io::Result<String> {
        writeln!(self.output, "? {} (finish with an empty line)", question.message)?;
        let mut lines = Vec::new();
        loop {
            let line = match self.read_line() {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !lines.is_empty() => break,
                Err(e) => return Err(e),
            };
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }
        if lines.is_empty() {
            Ok(question.default.clone())
        } else {
            Ok(lines.join("\n"))
        }
    }

    fn ask_confirm(&mut self, question: &Question) -> io::Result<bool> {
        let default = question.default == "true";
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "? {} [{}] ", question.message, hint)?;
            self.output.flush()?;
            match self.read_line()?.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" | "true" => return Ok(true),
                "n" | "no" | "false" => return Ok(false),
                _ => writeln!(self.output, "  please answer y or n")?,
            }
        }
    }

    fn ask_select(&mut self, question: &Question) -> io::Result<String> {
        if question.options.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no options to select from"));
        }
        writeln!(self.output, "? {}", question.message)?;
        for (i, option) in question.options.iter().enumerate() {
            let marker = if option.value == question.default { " (default)" } else { "" };
            writeln!(self.output, "  {}) {}{}", i + 1, option.label, marker)?;
        }
        loop {
            write!(self.output, "  choice: ")?;
            self.output.flush()?;
            let line = self.read_line()?;
            let choice = line.trim();

            if choice.is_empty() && !question.default.is_empty() {
                return Ok(question.default.clone());
            }
            if let Ok(n) = choice.parse::<usize>() {
                if let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i)) {
                    return Ok(option.value.clone());
                }
            }
            if let Some(option) = question
                .options
                .iter()
                .find(|o| o.value == choice || o.label == choice)
            {
                return Ok(option.value.clone());
            }
            writeln!(
                self.output,
                "  enter a number between 1 and {}",
                question.options.len()
            )?;
        }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn ask(&mut self, question: &Question) -> BlueprintResult<Answer> {
        if !self.interactive {
            return Err(BlueprintError::Prompt {
                variable: question.name.clone(),
                message: "no terminal available, provide --answers or --use-defaults".to_string(),
            });
        }

        let result = match question.var_type {
            VariableType::Confirm => self.ask_confirm(question).map(Answer::Confirm),
            VariableType::Select => self.ask_select(question).map(Answer::Text),
            VariableType::Editor => self.ask_editor(question).map(Answer::Text),
            VariableType::SecretInput => self.ask_text(question, true).map(Answer::Text),
            VariableType::Input => self.ask_text(question, false).map(Answer::Text),
        };
        result.map_err(|e| BlueprintError::Prompt {
            variable: question.name.clone(),
            message: e.to_string(),
        })
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        None
    } else {
        Regex::new(pattern).ok()
    }
}

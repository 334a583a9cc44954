#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, Write};

use crate::modules::auth::password::read_password;

/// Line-oriented console used by the interactive menu.
///
/// `None` from either read means the input stream has ended.
pub trait Console {
    fn say(&mut self, message: &str);
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    /// Read a secret without echoing it back
    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// The process terminal. Secrets require masked input; there is no
/// visible fallback when the terminal cannot provide it.
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn say(&mut self, message: &str) {
        println!("{}", message);
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;

        match read_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(io::Error::new(
                e.kind(),
                format!("masked password input is unavailable: {}", e),
            )),
        }
    }
}

/// Console fed from a fixed script, recording everything shown
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    pub output: Vec<String>,
}

#[cfg(test)]
impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    pub fn transcript(&self) -> String {
        self.output.join("\n")
    }
}

#[cfg(test)]
impl Console for ScriptedConsole {
    fn say(&mut self, message: &str) {
        self.output.push(message.to_string());
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.push(prompt.to_string());
        Ok(self.inputs.pop_front().map(|line| line.trim().to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.push(prompt.to_string());
        Ok(self.inputs.pop_front())
    }
}

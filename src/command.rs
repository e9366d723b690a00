//! Command record and append-only history, consumed only by the optional
//! history sink -- not read back by the pipeline itself.

use std::sync::Mutex;

/// One completed command, as recorded into a [`History`].
#[derive(Debug, Clone)]
pub struct Command {
    pub stdin: String,
    pub index: usize,
    pub stdout_lines: Vec<String>,
    pub error_lines: Vec<String>,
}

impl Command {
    #[must_use]
    pub fn new(index: usize, stdin: String, output: &str, err: Option<&str>) -> Self {
        let stdout_lines = if output.is_empty() {
            Vec::new()
        } else {
            output.lines().map(str::to_string).collect()
        };
        let error_lines = match err {
            Some(e) if !e.is_empty() => e.lines().map(str::to_string).collect(),
            _ => Vec::new(),
        };
        Command {
            stdin,
            index,
            stdout_lines,
            error_lines,
        }
    }

    #[must_use]
    pub fn output(&self) -> String {
        self.stdout_lines.join("\n")
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        if self.error_lines.is_empty() {
            None
        } else {
            Some(self.error_lines.join("\n"))
        }
    }
}

/// Append-only log of executed commands.
#[derive(Debug, Default)]
pub struct History {
    commands: Mutex<Vec<Command>>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        History::default()
    }

    pub fn record(&self, stdin: String, output: &str, err: Option<&str>) {
        let mut commands = self.commands.lock().expect("history mutex poisoned");
        let index = commands.len();
        commands.push(Command::new(index, stdin, output, err));
    }

    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().expect("history mutex poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.lock().expect("history mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_commands_in_order() {
        let history = History::new();
        history.record("echo one".into(), "one\n", None);
        history.record("echo two".into(), "two\n", None);

        let commands = history.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].index, 0);
        assert_eq!(commands[1].index, 1);
        assert_eq!(commands[0].output(), "one");
        assert_eq!(commands[1].output(), "two");
    }

    #[test]
    fn records_error_lines_separately() {
        let history = History::new();
        history.record("false".into(), "", Some("boom"));
        let commands = history.commands();
        assert_eq!(commands[0].error(), Some("boom".to_string()));
        assert!(commands[0].stdout_lines.is_empty());
    }
}

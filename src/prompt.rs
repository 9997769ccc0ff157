//! How the user is asked for time entry descriptions during a checkin

use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Something that can ask the user a question
pub trait Prompter {
    /// Ask something. `None` means the user skipped the question
    fn ask(&mut self, prompt: &str) -> Option<String>;
}

/// Ask on the terminal, and wait for the user to press Enter
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = std::io::stdout();
        if stdout.write_all(prompt.as_bytes()).and_then(|_| stdout.flush()).is_err() {
            return None;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => non_empty(answer.trim_end_matches(&['\r', '\n'][..])),
        }
    }
}

/// Answers a predefined list of answers, and remembers what was asked
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// The prompts that have been shown so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front().and_then(|answer| non_empty(&answer))
    }
}

/// Never asks anything, every question is skipped
#[derive(Debug, Default)]
pub struct SilentPrompter;

impl Prompter for SilentPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        log::debug!("Skipping prompt {:?}", prompt);
        None
    }
}

fn non_empty(answer: &str) -> Option<String> {
    if answer.trim().is_empty() {
        None
    } else {
        Some(answer.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers() {
        let mut prompter = ScriptedPrompter::new(vec!["first", "", "third"]);
        assert_eq!(prompter.ask("1?"), Some("first".to_string()));
        assert_eq!(prompter.ask("2?"), None);
        assert_eq!(prompter.ask("3?"), Some("third".to_string()));
        assert_eq!(prompter.ask("4?"), None);
        assert_eq!(prompter.asked(), &["1?", "2?", "3?", "4?"]);

        assert_eq!(SilentPrompter.ask("anything?"), None);
    }
}

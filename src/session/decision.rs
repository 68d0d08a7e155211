//! Overwrite decisions for sessions that already exist

use std::io::{self, BufRead, Write};

use super::types::SessionKey;
use crate::error::Result;

/// Decides whether an existing session may be torn down and recreated
pub trait OverwriteDecision {
    fn confirm_overwrite(&mut self, key: &SessionKey) -> Result<bool>;
}

/// Non-interactive policy: always the same answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDecision(pub bool);

impl OverwriteDecision for FixedDecision {
    fn confirm_overwrite(&mut self, key: &SessionKey) -> Result<bool> {
        log::debug!("overwrite of {} decided by policy: {}", key, self.0);
        Ok(self.0)
    }
}

impl<F> OverwriteDecision for F
where
    F: FnMut(&SessionKey) -> bool,
{
    fn confirm_overwrite(&mut self, key: &SessionKey) -> Result<bool> {
        Ok(self(key))
    }
}

/// Asks the operator, repeating the question until the answer is yes or no.
/// End of input counts as no.
pub struct PromptDecision<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptDecision<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptDecision<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> OverwriteDecision for PromptDecision<R, W> {
    fn confirm_overwrite(&mut self, key: &SessionKey) -> Result<bool> {
        loop {
            write!(self.output, "Session {} already exists. Overwrite? [y/n] ", key)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answers: &str) -> (bool, String) {
        let mut output = Vec::new();
        let mut prompt = PromptDecision::new(Cursor::new(answers.to_string()), &mut output);
        let decision = prompt
            .confirm_overwrite(&SessionKey::new("alice", 32041))
            .unwrap();
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_prompt_accepts_yes() {
        assert!(ask("yes\n").0);
        assert!(ask("Y\n").0);
    }

    #[test]
    fn test_prompt_declines() {
        let (decision, output) = ask("n\n");
        assert!(!decision);
        assert!(output.contains("alice_32041"));
    }

    #[test]
    fn test_prompt_repeats_until_answered() {
        let (decision, output) = ask("maybe\n\nyes\n");
        assert!(decision);
        assert_eq!(output.matches("Overwrite?").count(), 3);
    }

    #[test]
    fn test_prompt_eof_declines() {
        assert!(!ask("").0);
    }

    #[test]
    fn test_closure_decision() {
        let mut seen = Vec::new();
        let mut decide = |key: &SessionKey| {
            seen.push(key.to_string());
            true
        };
        assert!(decide.confirm_overwrite(&SessionKey::new("bob", 1)).unwrap());
        assert_eq!(seen, vec!["bob_1"]);
    }
}

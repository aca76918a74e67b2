use std::io::{self, BufRead, Write};

use kboot_lib::{DeviceCandidate, DeviceSelector, Error, Result};

/// Asks the operator to pick a device on the console.
#[derive(Debug, Default)]
pub struct ConsoleSelector;

impl DeviceSelector for ConsoleSelector {
    fn choose(&mut self, candidates: &[DeviceCandidate]) -> Result<usize> {
        let mut stdout = io::stdout();
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(stdout, "{}) {}", index, candidate.description)?;
        }
        writeln!(stdout, "\n Select one:")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        parse_selection(&line, candidates.len())
    }
}

fn parse_selection(input: &str, count: usize) -> Result<usize> {
    let input = input.trim();
    match input.parse::<usize>() {
        Ok(index) if index < count => Ok(index),
        _ => Err(Error::SelectionOutOfRange {
            selection: input.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_must_be_listed_index() {
        assert_eq!(parse_selection("1\n", 2).unwrap(), 1);
        assert!(matches!(
            parse_selection("2", 2),
            Err(Error::SelectionOutOfRange { count: 2, .. })
        ));
        assert!(parse_selection("x", 2).is_err());
        assert!(parse_selection("", 2).is_err());
    }
}

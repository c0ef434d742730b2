// Line-oriented terminal prompts, and the interactive `ResultSource`.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use gametourney_core::models::Player;
use gametourney_core::scoring::{ResultSource, ScoringError};

/// Asks questions on `output` and reads answers from `input`.
///
/// Invalid answers are reported and asked again; end of input is an
/// `UnexpectedEof` error so scripted sessions cannot loop forever.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn read_answer(&mut self, question: &str, hint: Option<&str>) -> io::Result<String> {
        match hint {
            Some(hint) => write!(self.output, "{question} [{hint}]: ")?,
            None => write!(self.output, "{question}: ")?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input ended while asking: {question}"),
            ));
        }
        Ok(line.trim().to_string())
    }

    /// Free text. An empty answer falls back to `default` when given.
    pub fn text(&mut self, question: &str, default: Option<&str>) -> io::Result<String> {
        let answer = self.read_answer(question, default)?;
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    /// Non-empty free text.
    pub fn required_text(&mut self, question: &str) -> io::Result<String> {
        loop {
            let answer = self.read_answer(question, None)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    /// A value parsed with `FromStr` that also passes `accept`.
    pub fn parsed<T>(
        &mut self,
        question: &str,
        default: Option<T>,
        accept: impl Fn(&T) -> Result<(), String>,
    ) -> io::Result<T>
    where
        T: FromStr + Display + Clone,
    {
        let hint = default.as_ref().map(ToString::to_string);
        loop {
            let answer = self.read_answer(question, hint.as_deref())?;
            let value = match (&default, answer.is_empty()) {
                (Some(default), true) => default.clone(),
                _ => match answer.parse::<T>() {
                    Ok(value) => value,
                    Err(_) => {
                        writeln!(self.output, "Error: '{answer}' is not a valid value.")?;
                        continue;
                    }
                },
            };
            match accept(&value) {
                Ok(()) => return Ok(value),
                Err(message) => writeln!(self.output, "Error: {message}")?,
            }
        }
    }

    /// Yes/no question.
    pub fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.read_answer(question, Some(hint))?.to_lowercase();
            match answer.as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Error: please answer y or n.")?,
            }
        }
    }

    /// Pick one of `options` by its 1-based number. Returns the 0-based index.
    pub fn choose(&mut self, question: &str, options: &[String]) -> io::Result<usize> {
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {option}", i + 1)?;
        }
        let count = options.len();
        let choice = self.parsed(question, None, |n: &usize| {
            if (1..=count).contains(n) {
                Ok(())
            } else {
                Err(format!("choose a number between 1 and {count}"))
            }
        })?;
        Ok(choice - 1)
    }
}

impl<R: BufRead, W: Write> ResultSource for Prompter<R, W> {
    fn points(&mut self, player: &Player) -> Result<f64, ScoringError> {
        self.parsed(
            &format!("What was the score for player {}?", player.name),
            None,
            |points: &f64| {
                if points.is_finite() {
                    Ok(())
                } else {
                    Err("points must be a finite number".into())
                }
            },
        )
        .map_err(|source| ScoringError::Input {
            player: player.name.clone(),
            source,
        })
    }

    fn rank(&mut self, player: &Player, player_count: usize) -> Result<i64, ScoringError> {
        let max = player_count as i64;
        self.parsed(
            &format!(
                "What was the rank for player {} (1-{max}, lower is better)?",
                player.name
            ),
            None,
            |rank: &i64| {
                if (1..=max).contains(rank) {
                    Ok(())
                } else {
                    Err(format!("rank must be between 1 and {max}"))
                }
            },
        )
        .map_err(|source| ScoringError::Input {
            player: player.name.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn transcript(prompter: Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompter.into_output()).unwrap()
    }

    fn player() -> Player {
        Player {
            id: 1,
            name: "Ana".into(),
        }
    }

    #[test]
    fn text_uses_default_on_empty_answer() {
        let mut p = prompter("\nCatan\n");
        assert_eq!(p.text("Game", Some("Azul")).unwrap(), "Azul");
        assert_eq!(p.text("Game", Some("Azul")).unwrap(), "Catan");
        assert_eq!(transcript(p), "Game [Azul]: Game [Azul]: ");
    }

    #[test]
    fn required_text_reasks_on_blank() {
        let mut p = prompter("  \nAna\n");
        assert_eq!(p.required_text("Name").unwrap(), "Ana");
        assert!(transcript(p).contains("A value is required."));
    }

    #[test]
    fn parsed_reasks_until_valid() {
        let mut p = prompter("abc\n-2\n2.5\n");
        let hours = p
            .parsed("Hours", None, |h: &f64| {
                if *h > 0.0 {
                    Ok(())
                } else {
                    Err("must be positive".into())
                }
            })
            .unwrap();
        assert_eq!(hours, 2.5);
        let out = transcript(p);
        assert!(out.contains("'abc' is not a valid value"));
        assert!(out.contains("Error: must be positive"));
    }

    #[test]
    fn parsed_default_is_shown_and_used() {
        let mut p = prompter("\n");
        let value = p.parsed("Rank multiplier", Some(1.5), |_: &f64| Ok(())).unwrap();
        assert_eq!(value, 1.5);
        assert_eq!(transcript(p), "Rank multiplier [1.5]: ");
    }

    #[test]
    fn confirm_accepts_yes_no_and_default() {
        let mut p = prompter("\ny\nNO\nmaybe\nyes\n");
        assert!(p.confirm("Record?", true).unwrap());
        assert!(p.confirm("Record?", false).unwrap());
        assert!(!p.confirm("Record?", true).unwrap());
        assert!(p.confirm("Record?", false).unwrap());
        assert!(transcript(p).contains("please answer y or n"));
    }

    #[test]
    fn choose_returns_zero_based_index() {
        let mut p = prompter("3\n2\n");
        let picked = p.choose("Which?", &["a".into(), "b".into()]).unwrap();
        assert_eq!(picked, 1);
        let out = transcript(p);
        assert!(out.contains("  1) a\n  2) b\n"));
        assert!(out.contains("between 1 and 2"));
    }

    #[test]
    fn end_of_input_is_an_error() {
        let mut p = prompter("");
        let err = p.text("Game", None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rank_prompt_rejects_out_of_range() {
        let mut p = prompter("5\n0\n2\n");
        assert_eq!(p.rank(&player(), 3).unwrap(), 2);
        let out = transcript(p);
        assert!(out.contains("What was the rank for player Ana (1-3, lower is better)?"));
        assert!(out.contains("rank must be between 1 and 3"));
    }

    #[test]
    fn points_prompt_maps_eof_to_input_error() {
        let mut p = prompter("");
        let err = p.points(&player()).unwrap_err();
        assert!(matches!(err, ScoringError::Input { ref player, .. } if player == "Ana"));
    }
}

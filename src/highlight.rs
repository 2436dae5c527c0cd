use std::borrow::Cow;
use std::str::FromStr;

use regex::Regex;

use crate::error::{Result, TailError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    fn ansi_code(self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            other => Err(format!("unknown color: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighlightRule {
    pub pattern: Regex,
    pub color: Color,
}

impl HighlightRule {
    /// Parses `REGEX` or `REGEX=COLOR`. The suffix only counts as a colour
    /// when it names one, so patterns may contain `=` themselves.
    pub fn parse(arg: &str) -> Result<Self> {
        let (pattern_str, color) = match arg.rsplit_once('=') {
            Some((pattern, color)) => match color.parse::<Color>() {
                Ok(color) => (pattern, color),
                Err(_) => (arg, Color::Yellow),
            },
            None => (arg, Color::Yellow),
        };

        if pattern_str.is_empty() {
            return Err(TailError::InvalidPattern {
                pattern: arg.to_string(),
                message: "empty pattern".to_string(),
            });
        }

        let pattern = Regex::new(pattern_str).map_err(|e| TailError::InvalidPattern {
            pattern: pattern_str.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { pattern, color })
    }
}

/// Colours whole lines by the first rule whose pattern matches.
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    rules: Vec<HighlightRule>,
}

impl Highlighter {
    pub fn new(rules: Vec<HighlightRule>) -> Self {
        Self { rules }
    }

    pub fn parse_all<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let rules = args
            .iter()
            .map(|s| HighlightRule::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn color_for(&self, line: &str) -> Option<Color> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(line))
            .map(|rule| rule.color)
    }

    pub fn paint<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match self.color_for(line) {
            Some(color) => Cow::Owned(format!("\x1b[{}m{}\x1b[0m", color.ansi_code(), line)),
            None => Cow::Borrowed(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_with_color() {
        let rule = HighlightRule::parse("ERROR=red").unwrap();
        assert_eq!(rule.color, Color::Red);
        assert!(rule.pattern.is_match("2024 ERROR boom"));

        let rule = HighlightRule::parse("WARN=Cyan").unwrap();
        assert_eq!(rule.color, Color::Cyan);
    }

    #[test]
    fn test_parse_rule_default_color() {
        let rule = HighlightRule::parse("timeout").unwrap();
        assert_eq!(rule.color, Color::Yellow);

        // suffix is not a colour, so it stays part of the pattern
        let rule = HighlightRule::parse("key=value").unwrap();
        assert_eq!(rule.color, Color::Yellow);
        assert!(rule.pattern.is_match("key=value"));
    }

    #[test]
    fn test_parse_rule_errors() {
        assert!(matches!(
            HighlightRule::parse("[unclosed=red"),
            Err(TailError::InvalidPattern { .. })
        ));
        assert!(HighlightRule::parse("=red").is_err());
        assert!(HighlightRule::parse("").is_err());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let highlighter = Highlighter::parse_all(&["ERROR=red", "E.*=green"]).unwrap();
        assert_eq!(highlighter.color_for("ERROR disk"), Some(Color::Red));
        assert_eq!(highlighter.color_for("Exit"), Some(Color::Green));
        assert_eq!(highlighter.color_for("info"), None);
    }

    #[test]
    fn test_paint() {
        let highlighter = Highlighter::parse_all(&["fail=red"]).unwrap();
        assert_eq!(highlighter.paint("ok"), "ok");
        assert_eq!(highlighter.paint("fail"), "\x1b[31mfail\x1b[0m");
        assert!(Highlighter::default().is_empty());
    }
}

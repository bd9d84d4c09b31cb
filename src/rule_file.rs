/// Loading rule sets from plain-text rule files.
///
/// One rule per line, `name := body`; an empty name declares the conventional
/// whitespace-and-comment skip rule (substituted as `${}`). Lines starting
/// with `//` and blank lines are skipped. Named rules are registered as
/// tree-producing root candidates, and the last named rule becomes the root
/// (rule files are written leaves-first).
use std::fs;
use std::str::FromStr;

use regex::Regex;

use crate::rules::{Ncc, RuleSpec};
use crate::Err;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

impl FromStr for Ncc {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    // the body is not trimmed on the right: a trailing escaped space is part
    // of the rule
    regex_static!(RULE_LINE, r"^(?P<name>[^\s:]*)\s*:=\s*(?P<body>.*)$");

    let mut ncc = Ncc::new();
    let mut last_named = None;
    for line in s.lines() {
      let line = line.trim_start();
      if line.is_empty() || line.starts_with("//") {
        continue;
      }
      let caps = RULE_LINE
        .captures(line)
        .ok_or_else(|| -> Err { format!("malformed rule line: `{}`", line).into() })?;
      let name = &caps["name"];
      let body = &caps["body"];
      let spec = if name.is_empty() {
        RuleSpec::new(name, body)
      } else {
        RuleSpec::new(name, body).tree().root_candidate()
      };
      ncc.add_rule(spec)?;
      if !name.is_empty() {
        last_named = Some(name.to_string());
      }
    }

    match last_named {
      Some(root) => {
        ncc.set_root(&root)?;
        Ok(ncc)
      }
      None => Err("empty ruleset".into()),
    }
  }
}

impl Ncc {
  pub fn read_from_file(filename: &str) -> Result<Self, Err> {
    fs::read_to_string(filename)?.parse()
  }
}

#[cfg(test)]
mod tests {
  use crate::Ncc;

  macro_rules! demo_file {
    ($filename:expr) => {
      ($filename, include_str!(concat!("../demos/", $filename)))
    };
  }

  #[test]
  fn smoke_test_demos() {
    let demos = [demo_file!("assignments.ncc"), demo_file!("csv.ncc")];

    for (filename, src) in demos {
      assert!(src.parse::<Ncc>().is_ok(), "failed to parse {}", filename);
    }
  }

  #[test]
  fn test_assignments_demo_matches_a_document() {
    let (_, src) = demo_file!("assignments.ncc");
    let ncc: Ncc = src.parse().unwrap();
    let text = "var1;\nvar2;\nvar1=var2;";
    let result = ncc.match_text(text).unwrap();
    assert!(result.matched);
    assert_eq!(result.length, text.len());
  }

  #[test]
  fn test_csv_demo_matches_a_document() {
    let (_, src) = demo_file!("csv.ncc");
    let ncc: Ncc = src.parse().unwrap();
    let text = "1,22\n333,4";
    let result = ncc.match_text(text).unwrap();
    assert!(result.matched);
    assert_eq!(result.length, text.len());
  }

  #[test]
  fn test_rule_file_format() {
    let ncc: Ncc = r"
      // a comment
      digit := 0-9
       := {\ |\n}^*
      number := ${digit}{${digit}}^*
    "
    .parse()
    .unwrap();

    assert_eq!(ncc.rules().len(), 3);
    assert!(ncc.rule("").is_some());
    // the last named rule is the root
    let result = ncc.match_text("42").unwrap();
    assert!(result.matched);
    assert_eq!(result.ast.unwrap().rule_name, "number");
  }

  #[test]
  fn test_rule_file_rejects_malformed_lines() {
    assert!("digit = 0-9".parse::<Ncc>().is_err());
    assert!("".parse::<Ncc>().is_err());
    // a file with only the whitespace rule has no root to speak of
    assert!(" := {\\ }^*".parse::<Ncc>().is_err());
  }
}

use std::fmt;
use std::io::Write;

use termcolor::{Buffer, Color, ColorSpec, WriteColor};

/// A node of the tree built from tree-producing rule matches.
///
/// `matched_text` is the full input span the rule consumed. Leaves (nodes
/// without tree-producing descendants) carry their matched text as `value`;
/// interior nodes carry an empty `value` and own their children in source
/// order. Trees are owned by the caller once a match returns; dropping the
/// root frees the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AstNode {
  pub rule_name: String,
  pub matched_text: String,
  pub value: String,
  pub children: Vec<AstNode>,
}

impl AstNode {
  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  /// The leaves of this subtree, left to right.
  pub fn leaves(&self) -> Vec<&AstNode> {
    let mut out = Vec::new();
    self.collect_leaves(&mut out);
    out
  }

  fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a AstNode>) {
    if self.is_leaf() {
      out.push(self);
    } else {
      for child in &self.children {
        child.collect_leaves(out);
      }
    }
  }

  /// Renders the tree, one node per line, nested by indentation. With
  /// `colorize` the rule names and values carry ANSI colors.
  pub fn tree_to_string(&self, indent: usize, colorize: bool) -> String {
    let mut buf = if colorize { Buffer::ansi() } else { Buffer::no_color() };
    self
      .write_tree(&mut buf, indent)
      .expect("writing to an in-memory buffer can't fail");
    String::from_utf8(buf.into_inner()).expect("tree rendering is utf-8")
  }

  fn write_tree(&self, out: &mut Buffer, indent: usize) -> std::io::Result<()> {
    for _ in 0..indent {
      write!(out, "  ")?;
    }
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    write!(out, "{}", self.rule_name)?;
    out.reset()?;
    if !self.value.is_empty() {
      write!(out, ": ")?;
      out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
      write!(out, "{}", self.value)?;
      out.reset()?;
    }
    writeln!(out)?;
    for child in &self.children {
      child.write_tree(out, indent + 1)?;
    }
    Ok(())
  }
}

impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tree_to_string(0, false))
  }
}

#[cfg(test)]
fn sample_tree() -> AstNode {
  AstNode {
    rule_name: "declaration".to_string(),
    matched_text: "var1;".to_string(),
    value: String::new(),
    children: vec![AstNode {
      rule_name: "identifier".to_string(),
      matched_text: "var1".to_string(),
      value: "var1".to_string(),
      children: Vec::new(),
    }],
  }
}

#[test]
fn test_tree_to_string_plain() {
  assert_eq!(
    sample_tree().tree_to_string(0, false),
    "declaration\n  identifier: var1\n"
  );
}

#[test]
fn test_tree_to_string_colorized_carries_escapes() {
  let colored = sample_tree().tree_to_string(0, true);
  assert!(colored.contains("\x1b["));
  assert!(colored.contains("identifier"));
}

#[test]
fn test_leaves_left_to_right() {
  let tree = AstNode {
    rule_name: "document".to_string(),
    matched_text: "ab".to_string(),
    value: String::new(),
    children: vec![
      AstNode {
        rule_name: "x".to_string(),
        matched_text: "a".to_string(),
        value: "a".to_string(),
        children: Vec::new(),
      },
      AstNode {
        rule_name: "y".to_string(),
        matched_text: "b".to_string(),
        value: "b".to_string(),
        children: Vec::new(),
      },
    ],
  };
  let leaves: Vec<&str> = tree.leaves().iter().map(|l| l.value.as_str()).collect();
  assert_eq!(leaves, vec!["a", "b"]);
}

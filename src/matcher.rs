//! The matching algorithm: walks compiled node graphs over the input,
//! arbitrating alternatives by longest match, collecting AST nodes and
//! variables, and dispatching rule listeners.
//!
//! Every matcher function returns `Result<Option<Segment>, Err>`: `Err` is a
//! fatal match error (an unresolved substitute), `None` is a REJECT, and
//! `Some` carries the consumed length plus whatever the consumed span
//! produced. On success a node reports the characters consumed by itself
//! *and* every node after it in the same graph, so each case matches its
//! chain tail and returns the sum.
//!
//! Listeners fire eagerly: `on_match_end` runs as soon as a candidate rule
//! match completes, so a veto can steer alternation while the matcher is
//! still exploring. Candidates that a longer alternative (or a rejecting
//! tail) later discards are unwound with `on_reject`, parent before children,
//! in reverse completion order.

use tracing::{debug, trace};

use crate::ast::AstNode;
use crate::graph::{Graph, Node};
use crate::listener::{MatchingData, Variable};
use crate::rules::{Ncc, Rule};
use crate::Err;

/// Outcome of a top-level match call. `length` is the match length on
/// success, and the furthest input offset any attempt consumed on failure.
/// `ast` is present when the matched rule is tree-producing.
#[derive(Debug, PartialEq, Eq)]
pub struct MatchResult {
  pub matched: bool,
  pub length: usize,
  pub ast: Option<AstNode>,
}

/// Per-call scratch: the input and the high-water mark of consumed offsets.
struct MatchState<'t> {
  text: &'t str,
  furthest: usize,
}

impl MatchState<'_> {
  fn note(&mut self, offset: usize) {
    if offset > self.furthest {
      self.furthest = offset;
    }
  }
}

/// What a successfully matched span produced: its length, the AST nodes built
/// by tree-producing rules inside it, and the variables captured for the
/// nearest enclosing listening rule.
struct Segment {
  len: usize,
  asts: Vec<AstNode>,
  vars: Vec<Variable>,
}

impl Segment {
  fn empty() -> Self {
    Self {
      len: 0,
      asts: Vec::new(),
      vars: Vec::new(),
    }
  }

  /// A bare span with no listener-visible products.
  fn bare(len: usize) -> Self {
    Self {
      len,
      asts: Vec::new(),
      vars: Vec::new(),
    }
  }

  fn join(mut self, mut tail: Segment) -> Self {
    self.len += tail.len;
    self.asts.append(&mut tail.asts);
    self.vars.append(&mut tail.vars);
    self
  }
}

impl Ncc {
  /// Matches `text` against the root rule, or against every root candidate
  /// (longest wins, earliest on ties) when no root is set.
  pub fn match_text(&self, text: &str) -> Result<MatchResult, Err> {
    let mut state = MatchState { text, furthest: 0 };

    let matched = match self.root() {
      Some(root) => {
        let rule = self
          .rule(root)
          .ok_or_else(|| -> Err { format!("match: no rule named `{}`", root).into() })?;
        match_rule(self, rule, &mut state, 0)?.map(|seg| (rule, seg))
      }
      None => {
        let flagged = self.rules().iter().any(|r| r.root_candidate);
        let mut best: Option<(&Rule, Segment)> = None;
        for rule in self.rules().iter().filter(|r| !flagged || r.root_candidate) {
          let seg = match match_rule(self, rule, &mut state, 0)? {
            Some(seg) => seg,
            None => continue,
          };
          best = match best {
            None => Some((rule, seg)),
            Some((best_rule, best_seg)) => {
              if seg.len > best_seg.len {
                undo_segment(self, best_seg);
                Some((rule, seg))
              } else {
                undo_segment(self, seg);
                Some((best_rule, best_seg))
              }
            }
          };
        }
        best
      }
    };

    match matched {
      Some((rule, mut seg)) => {
        let length = seg.len;
        let ast = if rule.is_tree_producing() { seg.asts.pop() } else { None };
        debug!(rule = %rule.name, length, "matched");
        Ok(MatchResult {
          matched: true,
          length,
          ast,
        })
      }
      None => {
        debug!(furthest = state.furthest, "no match");
        Ok(MatchResult {
          matched: false,
          length: state.furthest,
          ast: None,
        })
      }
    }
  }
}

/// Runs one rule at `offset` under the listener discipline: attempt the
/// graph, build the candidate AST node, let the listener accept or veto, and
/// decide what bubbles up to the enclosing rule.
fn match_rule(
  ncc: &Ncc,
  rule: &Rule,
  state: &mut MatchState<'_>,
  offset: usize,
) -> Result<Option<Segment>, Err> {
  if let Some(listener) = &rule.listener {
    listener.on_match_start(&rule.name, state.text, offset);
  }
  trace!(rule = %rule.name, offset, "trying rule");

  let seg = match match_graph(ncc, &rule.graph, state, offset)? {
    Some(seg) => seg,
    None => return Ok(None),
  };
  let matched_text = &state.text[offset..offset + seg.len];

  let mut out = Segment::bare(seg.len);
  if let Some(listener) = &rule.listener {
    let mut node = AstNode {
      rule_name: rule.name.clone(),
      matched_text: matched_text.to_string(),
      value: if seg.asts.is_empty() {
        matched_text.to_string()
      } else {
        String::new()
      },
      children: seg.asts,
    };
    let mut variables = seg.vars;
    let accepted = listener.on_match_end(&mut MatchingData {
      match_length: seg.len,
      matched_text,
      node: &mut node,
      variables: &mut variables,
    });
    if !accepted {
      trace!(rule = %rule.name, offset, "listener vetoed match");
      // The rule was never accepted, so it gets no reject callback of its
      // own; its accepted descendants are unwound normally.
      for child in node.children.drain(..).rev() {
        undo_node(ncc, child);
      }
      return Ok(None);
    }
    out.asts.push(node);
  } else {
    // Transparent rule: AST nodes and variables bubble up to the nearest
    // listening ancestor.
    out.asts = seg.asts;
    out.vars = seg.vars;
  }

  if rule.push_variable {
    out.vars.push(Variable::new(&rule.name, matched_text));
  }
  Ok(Some(out))
}

fn match_graph(
  ncc: &Ncc,
  graph: &Graph,
  state: &mut MatchState<'_>,
  offset: usize,
) -> Result<Option<Segment>, Err> {
  match_nodes(ncc, &graph.nodes, 0, state, offset)
}

fn match_nodes(
  ncc: &Ncc,
  nodes: &[Node],
  at: usize,
  state: &mut MatchState<'_>,
  offset: usize,
) -> Result<Option<Segment>, Err> {
  match &nodes[at] {
    Node::Root => match_nodes(ncc, nodes, at + 1, state, offset),

    // The graph is done, even if the input isn't over yet.
    Node::Accept => Ok(Some(Segment::empty())),

    Node::Literal(literal) => match state.text[offset..].chars().next() {
      Some(c) if c == *literal => consume(ncc, nodes, at, state, offset, c.len_utf8()),
      _ => Ok(None),
    },

    Node::Range(lo, hi) => match state.text[offset..].chars().next() {
      Some(c) if (*lo..=*hi).contains(&c) => consume(ncc, nodes, at, state, offset, c.len_utf8()),
      _ => Ok(None),
    },

    Node::SubRule(sub) => {
      let inner = match match_graph(ncc, sub, state, offset)? {
        Some(seg) => seg,
        None => return Ok(None),
      };
      continue_chain(ncc, nodes, at, state, offset, inner)
    }

    Node::Substitute(name) => {
      let rule = ncc
        .rule(name)
        .ok_or_else(|| -> Err { format!("substitute: no rule named `{}`", name).into() })?;
      let inner = match match_rule(ncc, rule, state, offset)? {
        Some(seg) => seg,
        None => return Ok(None),
      };
      continue_chain(ncc, nodes, at, state, offset, inner)
    }

    Node::Or(lhs, rhs) => {
      let left = match_graph(ncc, lhs, state, offset)?;
      let right = match_graph(ncc, rhs, state, offset)?;
      let (winner, loser) = match (left, right) {
        (None, None) => return Ok(None),
        (Some(l), None) => (l, None),
        (None, Some(r)) => (r, None),
        // the longer side wins; the left side on ties
        (Some(l), Some(r)) => {
          if r.len > l.len {
            (r, Some(l))
          } else {
            (l, Some(r))
          }
        }
      };
      if let Some(loser) = loser {
        undo_segment(ncc, loser);
      }
      continue_chain(ncc, nodes, at, state, offset, winner)
    }

    Node::Repeat(body, follow) => {
      let mut acc = Segment::empty();
      loop {
        // Try to stop first: does the rest of the enclosing graph match
        // here? Only then try to continue repeating.
        let stop = match_graph(ncc, follow, state, offset + acc.len)?;
        match stop {
          Some(stop_seg) if stop_seg.len > 0 => {
            return continue_chain(ncc, nodes, at, state, offset, acc.join(stop_seg));
          }
          Some(stop_seg) => {
            // A zero-length stop is only taken once the body can't advance.
            match match_graph(ncc, body, state, offset + acc.len)? {
              Some(step) if step.len > 0 => {
                undo_segment(ncc, stop_seg);
                acc = acc.join(step);
              }
              Some(step) => {
                undo_segment(ncc, step);
                return continue_chain(ncc, nodes, at, state, offset, acc.join(stop_seg));
              }
              None => {
                return continue_chain(ncc, nodes, at, state, offset, acc.join(stop_seg));
              }
            }
          }
          None => {
            // The tail doesn't fit here; the repeat survives only while the
            // body keeps consuming.
            match match_graph(ncc, body, state, offset + acc.len)? {
              Some(step) if step.len > 0 => acc = acc.join(step),
              Some(step) => {
                undo_segment(ncc, step);
                undo_segment(ncc, acc);
                return Ok(None);
              }
              None => {
                undo_segment(ncc, acc);
                return Ok(None);
              }
            }
          }
        }
      }
    }

    Node::Anything(follow) => {
      let mut consumed = 0;
      loop {
        let stop = match_graph(ncc, follow, state, offset + consumed)?;
        let at_end = offset + consumed >= state.text.len();
        match stop {
          Some(stop_seg) if stop_seg.len > 0 || at_end => {
            return continue_chain(
              ncc,
              nodes,
              at,
              state,
              offset,
              Segment::bare(consumed).join(stop_seg),
            );
          }
          Some(stop_seg) => undo_segment(ncc, stop_seg),
          None if at_end => return Ok(None),
          None => {}
        }
        match state.text[offset + consumed..].chars().next() {
          Some(c) => {
            consumed += c.len_utf8();
            state.note(offset + consumed);
          }
          None => return Ok(None),
        }
      }
    }
  }
}

/// A leaf consumed `len` bytes at `offset`: record the high-water mark, match
/// the chain tail and add it up.
fn consume(
  ncc: &Ncc,
  nodes: &[Node],
  at: usize,
  state: &mut MatchState<'_>,
  offset: usize,
  len: usize,
) -> Result<Option<Segment>, Err> {
  state.note(offset + len);
  match match_nodes(ncc, nodes, at + 1, state, offset + len)? {
    Some(tail) => Ok(Some(Segment::bare(len).join(tail))),
    None => Ok(None),
  }
}

/// `seg` covered this node; match the rest of the chain after it and combine,
/// unwinding `seg` if the tail rejects.
fn continue_chain(
  ncc: &Ncc,
  nodes: &[Node],
  at: usize,
  state: &mut MatchState<'_>,
  offset: usize,
  seg: Segment,
) -> Result<Option<Segment>, Err> {
  match match_nodes(ncc, nodes, at + 1, state, offset + seg.len)? {
    Some(tail) => Ok(Some(seg.join(tail))),
    None => {
      undo_segment(ncc, seg);
      Ok(None)
    }
  }
}

/// Unwinds the listener-visible effects of a discarded candidate, firing
/// `on_reject` in reverse completion order.
fn undo_segment(ncc: &Ncc, seg: Segment) {
  for node in seg.asts.into_iter().rev() {
    undo_node(ncc, node);
  }
}

fn undo_node(ncc: &Ncc, mut node: AstNode) {
  trace!(rule = %node.rule_name, "rejecting previously accepted match");
  if let Some(rule) = ncc.rule(&node.rule_name) {
    if let Some(listener) = &rule.listener {
      // children are still attached so the callback can inspect them
      listener.on_reject(&node);
    }
  }
  for child in node.children.drain(..).rev() {
    undo_node(ncc, child);
  }
}

#[cfg(test)]
use crate::rules::RuleSpec;

/// Registers `body` under `name`, makes it the root, and checks the outcome
/// against the expectation.
#[cfg(test)]
fn check(ncc: &mut Ncc, name: &str, body: &str, text: &str, matched: bool, length: usize) {
  ncc.add_rule(RuleSpec::new(name, body).tree()).unwrap();
  ncc.set_root(name).unwrap();
  let result = ncc.match_text(text).unwrap();
  assert_eq!(result.matched, matched, "rule `{}` on `{:?}`", body, text);
  assert_eq!(result.length, length, "rule `{}` on `{:?}`", body, text);
}

#[cfg(test)]
fn check_one(body: &str, text: &str, matched: bool, length: usize) {
  check(&mut Ncc::new(), "probe", body, text, matched, length);
}

#[test]
fn test_literals() {
  check_one(r"besm\ Allah", "besm Allah", true, 10);
  check_one("for", "fort", true, 3);
  check_one("for", "fo", false, 2);
}

#[test]
fn test_literal_ranges() {
  check_one(r"besm\ Allah\ a-z", "besm Allah x", true, 12);
  check_one(r"besm\ Allah\ a-z", "besm Allah 2", false, 11);
  check_one(r"besm\ Allah\ \a-\z", "besm Allah x", true, 12);
}

#[test]
fn test_or() {
  check_one("a|b", "a", true, 1);
  check_one("a|b", "b", true, 1);
  check_one("abc|def", "abcef", true, 5);
  check_one("abc|def", "abdef", true, 5);
  check_one("abc|def", "abef", false, 2);
  check_one("a|b|c|d|ef", "cf", true, 2);
}

#[test]
fn test_sub_rules() {
  check_one("ab{cd{ef}gh}ij", "abcdefghij", true, 10);
  check_one("ab{cd}|{ef}gh", "abcdgh", true, 6);
  check_one("ab{cd}|{ef}gh", "abefgh", true, 6);
  check_one("ab{cd}|{ef}gh", "abgh", false, 2);
  check_one("a{a|b}", "ab", true, 2);
  check_one("a{b|c}d", "abf", false, 2);
}

#[test]
fn test_repeats() {
  check_one("a^*bc", "abc", true, 3);
  check_one("a^*bc", "bc", true, 2);
  check_one("a^*bc", "aaaaabc", true, 7);
  check_one("a^*bc", "aaa", false, 3);
  check_one("a^*", "aaaaa", true, 5);
  check_one("123a^*", "123aaaaa", true, 8);
  check_one("123a^*456", "123a456", true, 7);
  check_one("123a^*456", "123456", true, 6);
  check_one("123{ab}^*456", "123ababab456", true, 12);
  check_one("{ab}^*{cd}^*", "x", true, 0);
  check_one("x{ab}^*{cd}^*", "x", true, 1);
  check_one("x{ab}^*{cd}^*", "xab", true, 3);
  check_one("x{ab}^*{cd}^*", "xcd", true, 3);
  // least-greedy: the tail gets first pick before each iteration
  check_one("{xyz}^*xyz", "xyzxyzxyz", true, 3);
  // grouping the repeat hides the tail from it, so it overshoots
  check_one("{{xyz}^*}xyz", "xyzxyzxyz", false, 9);
}

#[test]
fn test_anything() {
  check_one("*", "xyz", true, 3);
  check_one("**", "xyz", true, 3);
  check_one("********", "xyz", true, 3);
  check_one("********abc", "xyzabc", true, 6);
  check_one("*a*b*c*", "__a__c__", false, 8);
  check_one("*XYZ", "abcdefgXYZ", true, 10);
  // the sub-rule swallows everything; its follow context is lost inside the group
  check_one("{*}XYZ", "abcdefgXYZ", false, 10);
}

#[test]
fn test_anything_stops_at_the_first_match_of_the_tail() {
  check_one("*END", "aaaENDbbbEND", true, 6);
}

#[test]
fn test_identifier_shapes() {
  check_one("{a-z|A-Z}{a-z|A-Z|0-9}^*", "myVariable3", true, 11);
  check_one("{a-z|A-Z}{a-z|A-Z|0-9}^*", "3myVariable3", false, 0);
}

#[test]
fn test_block_comment_over_utf8() {
  let text = "/*بسم الله. This is a beautiful comment.\n The is the second line in the beautiful comment.*/";
  check_one(r"/\**\*/", text, true, text.len());
}

#[test]
fn test_substitution_chains() {
  let mut ncc = Ncc::new();
  check(&mut ncc, "Comment", r"/\**\*/", "/*besm Allah*/", true, 14);
  check(
    &mut ncc,
    "TwoComments",
    "${Comment},${Comment}",
    "/*first comment*/,/*second comment*/",
    true,
    36,
  );
  check(
    &mut ncc,
    "ThreeComments",
    "${TwoComments},${Comment}",
    "/*first comment*/,/*second comment*/,/*thirrrrrd comment*/",
    true,
    58,
  );
}

#[test]
fn test_substituting_an_optional_rule() {
  let mut ncc = Ncc::new();
  check(&mut ncc, "Optional", "{ab}^*{cd}^*", "", true, 0);
  check(&mut ncc, "Mandatory", "xyz", "xyz", true, 3);
  check(
    &mut ncc,
    "ContainingOptional",
    "${Optional}${Mandatory}",
    "xyz",
    true,
    3,
  );
}

#[test]
fn test_empty_rule_identity() {
  let mut ncc = Ncc::new();
  check(&mut ncc, "Milestone", "", "", true, 0);
  check(&mut ncc, "123", "123", "123", true, 3);
  check(
    &mut ncc,
    "ActualRule1",
    "${123}${Milestone}${123}",
    "123123",
    true,
    6,
  );
  check(
    &mut ncc,
    "ActualRule2",
    "abc${ActualRule1}xyz",
    "abc123123xyz",
    true,
    12,
  );
}

#[test]
fn test_sub_rule_transparency() {
  check_one("{abc}", "abc", true, 3);
  check_one("abc", "abc", true, 3);
  check_one("a{b}{c}", "abc", true, 3);
}

#[test]
fn test_string_literals_prefer_the_longer_escape() {
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("Literal", "\u{1}-\u{10ffff}").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("EscapedLiteral", r"\\${Literal}").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("String", "\" { ${Literal}|${EscapedLiteral} }^* \"").tree())
    .unwrap();
  check(
    &mut ncc,
    "StringContainer",
    "${String}",
    "\"besm Allah \\\" :)\"",
    true,
    18,
  );
}

#[test]
fn test_forward_declaration() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("A", "${B}").tree()).unwrap();
  ncc.add_rule(RuleSpec::new("B", "xyz")).unwrap();
  ncc.set_root("A").unwrap();
  let result = ncc.match_text("xyz").unwrap();
  assert!(result.matched);
  assert_eq!(result.length, 3);
}

#[test]
fn test_unresolved_substitute_is_a_match_error() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("A", "${missing}").tree()).unwrap();
  ncc.set_root("A").unwrap();
  let err = ncc.match_text("xyz").unwrap_err();
  assert!(err.to_string().contains("missing"));
}

#[test]
fn test_longest_match_law() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("short", "a").tree()).unwrap();
  ncc.add_rule(RuleSpec::new("long", "aaa").tree()).unwrap();
  ncc
    .add_rule(RuleSpec::new("either", "${short}|${long}").tree())
    .unwrap();
  ncc.set_root("either").unwrap();

  let result = ncc.match_text("aaa").unwrap();
  assert_eq!(result.length, 3);
  let ast = result.ast.unwrap();
  assert_eq!(ast.children[0].rule_name, "long");

  let result = ncc.match_text("a").unwrap();
  assert_eq!(result.length, 1);
  assert_eq!(result.ast.unwrap().children[0].rule_name, "short");
}

#[test]
fn test_or_ties_keep_the_left_alternative() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("x", "ab").tree()).unwrap();
  ncc.add_rule(RuleSpec::new("y", "ab").tree()).unwrap();
  ncc
    .add_rule(RuleSpec::new("either", "${x}|${y}").tree())
    .unwrap();
  ncc.set_root("either").unwrap();
  let ast = ncc.match_text("ab").unwrap().ast.unwrap();
  assert_eq!(ast.children.len(), 1);
  assert_eq!(ast.children[0].rule_name, "x");
}

#[test]
fn test_implicit_root_finds_the_longest_rule() {
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("int", "0-9{0-9}^*").tree().root_candidate())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("word", "a-z{a-z}^*").tree().root_candidate())
    .unwrap();

  let result = ncc.match_text("hello").unwrap();
  assert!(result.matched);
  assert_eq!(result.length, 5);
  assert_eq!(result.ast.unwrap().rule_name, "word");

  let result = ncc.match_text("123").unwrap();
  assert_eq!(result.ast.unwrap().rule_name, "int");

  assert!(!ncc.match_text("?!").unwrap().matched);
}

#[test]
fn test_implicit_root_ties_keep_the_earliest_rule() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("first", "ab").tree()).unwrap();
  ncc.add_rule(RuleSpec::new("second", "ab").tree()).unwrap();
  let result = ncc.match_text("ab").unwrap();
  assert_eq!(result.ast.unwrap().rule_name, "first");
}

#[test]
fn test_implicit_root_only_considers_flagged_rules_when_any_are_flagged() {
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("flagged", "a").tree().root_candidate())
    .unwrap();
  ncc.add_rule(RuleSpec::new("longer", "ab").tree()).unwrap();
  let result = ncc.match_text("ab").unwrap();
  assert_eq!(result.length, 1);
  assert_eq!(result.ast.unwrap().rule_name, "flagged");
}

#[test]
fn test_ast_structure_and_values() {
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("identifier", "a-z|A-Z|_ {a-z|A-Z|_|0-9}^*").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("declaration", "${identifier};").tree())
    .unwrap();
  ncc.set_root("declaration").unwrap();

  let ast = ncc.match_text("var1;").unwrap().ast.unwrap();
  assert_eq!(ast.rule_name, "declaration");
  assert_eq!(ast.matched_text, "var1;");
  // interior nodes carry no value of their own
  assert_eq!(ast.value, "");
  assert_eq!(ast.children.len(), 1);
  assert_eq!(ast.children[0].rule_name, "identifier");
  assert_eq!(ast.children[0].matched_text, "var1");
  assert_eq!(ast.children[0].value, "var1");
}

#[test]
fn test_transparent_rules_bubble_their_children() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("token", "a-z{a-z}^*").tree()).unwrap();
  // no listener: `item` is invisible in the tree
  ncc.add_rule(RuleSpec::new("item", "${token};")).unwrap();
  ncc
    .add_rule(RuleSpec::new("document", "${item}${item}").tree())
    .unwrap();
  ncc.set_root("document").unwrap();

  let ast = ncc.match_text("ab;cd;").unwrap().ast.unwrap();
  assert_eq!(ast.rule_name, "document");
  let names: Vec<&str> = ast.children.iter().map(|c| c.rule_name.as_str()).collect();
  assert_eq!(names, vec!["token", "token"]);
  assert_eq!(ast.children[0].value, "ab");
  assert_eq!(ast.children[1].value, "cd");
}

#[test]
fn test_round_trip_of_leaf_text() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("word", "a-z{a-z}^*").tree()).unwrap();
  ncc.add_rule(RuleSpec::new("gap", r"\ ").tree()).unwrap();
  ncc
    .add_rule(RuleSpec::new("document", "{${word}|${gap}}^*").tree())
    .unwrap();
  ncc.set_root("document").unwrap();

  let text = "ab cd efg";
  let result = ncc.match_text(text).unwrap();
  assert_eq!(result.length, text.len());
  let ast = result.ast.unwrap();
  let rebuilt: String = ast.leaves().iter().map(|l| l.matched_text.as_str()).collect();
  assert_eq!(rebuilt, text);
}

#[test]
fn test_variables_reach_the_nearest_listening_rule() {
  use std::cell::RefCell;
  use std::rc::Rc;

  struct Captures(Rc<RefCell<Vec<Variable>>>);
  impl crate::listener::RuleListener for Captures {
    fn on_match_end(&self, data: &mut MatchingData) -> bool {
      while let Some(var) = data.pop_variable() {
        self.0.borrow_mut().push(var);
      }
      true
    }
  }

  let captured = Rc::new(RefCell::new(Vec::new()));
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("word", "a-z{a-z}^*").push_variable())
    .unwrap();
  // transparent intermediate: variables bubble through it
  ncc.add_rule(RuleSpec::new("item", "${word}")).unwrap();
  ncc
    .add_rule(RuleSpec::new("pair", "${item},${item}").listener(Captures(captured.clone())))
    .unwrap();
  ncc.set_root("pair").unwrap();

  let result = ncc.match_text("aa,bb").unwrap();
  assert!(result.matched);
  // popped in stack order
  assert_eq!(
    *captured.borrow(),
    vec![Variable::new("word", "bb"), Variable::new("word", "aa")]
  );
}

#[test]
fn test_listener_veto_selects_the_other_alternative() {
  use std::cell::Cell;
  use std::rc::Rc;

  struct Veto(Rc<Cell<usize>>);
  impl crate::listener::RuleListener for Veto {
    fn on_match_end(&self, _data: &mut MatchingData) -> bool {
      self.0.set(self.0.get() + 1);
      false
    }
    fn on_reject(&self, _node: &AstNode) {
      panic!("a vetoed match was never accepted, so it can't be rejected");
    }
  }

  let vetoes = Rc::new(Cell::new(0));
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("x", "ab").listener(Veto(vetoes.clone())))
    .unwrap();
  ncc.add_rule(RuleSpec::new("y", "ab").tree()).unwrap();
  ncc
    .add_rule(RuleSpec::new("either", "${x}|${y}").tree())
    .unwrap();
  ncc.set_root("either").unwrap();

  let result = ncc.match_text("ab").unwrap();
  assert!(result.matched);
  assert_eq!(vetoes.get(), 1);
  assert_eq!(result.ast.unwrap().children[0].rule_name, "y");
}

#[test]
fn test_discarded_alternative_is_rejected_exactly_once() {
  use std::cell::RefCell;
  use std::rc::Rc;

  struct Counting(Rc<RefCell<(usize, usize)>>);
  impl crate::listener::RuleListener for Counting {
    fn on_match_end(&self, _data: &mut MatchingData) -> bool {
      self.0.borrow_mut().0 += 1;
      true
    }
    fn on_reject(&self, _node: &AstNode) {
      self.0.borrow_mut().1 += 1;
    }
  }

  let counts = Rc::new(RefCell::new((0, 0)));
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("decl", "int").listener(Counting(counts.clone())))
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("either", "${decl}|${decl}").tree())
    .unwrap();
  ncc.set_root("either").unwrap();

  let result = ncc.match_text("int").unwrap();
  assert!(result.matched);
  // both alternatives matched and fired; the losing one was undone once
  assert_eq!(*counts.borrow(), (2, 1));
}

#[test]
fn test_rejected_parents_fire_before_their_children() {
  use std::cell::RefCell;
  use std::rc::Rc;

  struct Logging(&'static str, Rc<RefCell<Vec<String>>>);
  impl crate::listener::RuleListener for Logging {
    fn on_match_end(&self, _data: &mut MatchingData) -> bool {
      self.1.borrow_mut().push(format!("end {}", self.0));
      true
    }
    fn on_reject(&self, node: &AstNode) {
      // children must still be attached when the parent is rejected
      self
        .1
        .borrow_mut()
        .push(format!("reject {} ({})", self.0, node.children.len()));
    }
  }

  let log = Rc::new(RefCell::new(Vec::new()));
  let mut ncc = Ncc::new();
  ncc
    .add_rule(RuleSpec::new("inner", "ab").listener(Logging("inner", log.clone())))
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("outer", "${inner}c").listener(Logging("outer", log.clone())))
    .unwrap();
  // lhs matches 3 chars through the substitutes, rhs matches 4 and wins
  check(&mut ncc, "either", "${outer}|{abcd}", "abcd", true, 4);

  assert_eq!(
    *log.borrow(),
    vec![
      "end inner".to_string(),
      "end outer".to_string(),
      "reject outer (1)".to_string(),
      "reject inner (0)".to_string(),
    ]
  );
}

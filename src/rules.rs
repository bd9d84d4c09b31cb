use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::graph::Graph;
use crate::listener::{RuleListener, TreeBuilder};
use crate::parse_rule::compile;
use crate::Err;

/// A named pattern: compiled body graph, optional listener, flags.
pub struct Rule {
  pub name: String,
  pub(crate) graph: Graph,
  pub(crate) listener: Option<Box<dyn RuleListener>>,
  /// Participates in the implicit longest-match root (when no explicit root
  /// is set).
  pub root_candidate: bool,
  /// Successful matches push a `(name, matched text)` variable onto the
  /// enclosing rule's stack.
  pub push_variable: bool,
}

impl Rule {
  pub fn is_tree_producing(&self) -> bool {
    self.listener.is_some()
  }
}

impl fmt::Debug for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Rule")
      .field("name", &self.name)
      .field("graph", &self.graph)
      .field("listener", &self.listener.is_some())
      .field("root_candidate", &self.root_candidate)
      .field("push_variable", &self.push_variable)
      .finish()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} := {}", self.name, self.graph)
  }
}

/// Everything needed to register a rule; built incrementally, the way the
/// grammar definitions forward-declare and then refine rules.
pub struct RuleSpec {
  name: String,
  body: String,
  listener: Option<Box<dyn RuleListener>>,
  root_candidate: bool,
  push_variable: bool,
}

impl RuleSpec {
  pub fn new(name: &str, body: &str) -> Self {
    Self {
      name: name.to_string(),
      body: body.to_string(),
      listener: None,
      root_candidate: false,
      push_variable: false,
    }
  }

  /// Attaches a listener, making the rule tree-producing.
  pub fn listener(mut self, listener: impl RuleListener + 'static) -> Self {
    self.listener = Some(Box::new(listener));
    self
  }

  /// Attaches the standard tree-building listener.
  pub fn tree(self) -> Self {
    self.listener(TreeBuilder)
  }

  pub fn root_candidate(mut self) -> Self {
    self.root_candidate = true;
    self
  }

  pub fn push_variable(mut self) -> Self {
    self.push_variable = true;
    self
  }
}

/// The engine: an insertion-ordered registry of named rules plus the
/// designated root. Rules and their graphs are immutable during a match call;
/// all mutation happens between calls.
#[derive(Debug, Default)]
pub struct Ncc {
  rules: Vec<Rule>,
  index: HashMap<String, usize>,
  root: Option<String>,
}

impl Ncc {
  pub fn new() -> Self {
    Self::default()
  }

  /// Compiles and registers a rule. Adding a rule with an existing name
  /// replaces the prior definition in place, keeping its registration order
  /// (the forward-declare-then-finalize pattern).
  pub fn add_rule(&mut self, spec: RuleSpec) -> Result<(), Err> {
    let graph =
      compile(&spec.body).map_err(|e| -> Err { format!("rule `{}`: {}", spec.name, e).into() })?;
    let rule = Rule {
      name: spec.name,
      graph,
      listener: spec.listener,
      root_candidate: spec.root_candidate,
      push_variable: spec.push_variable,
    };
    match self.index.get(&rule.name) {
      Some(&at) => {
        debug!(rule = %rule.name, "replaced rule");
        self.rules[at] = rule;
      }
      None => {
        debug!(rule = %rule.name, "added rule");
        self.index.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
      }
    }
    Ok(())
  }

  /// Replaces an existing rule's body, keeping its listener and flags.
  pub fn update_rule(&mut self, name: &str, body: &str) -> Result<(), Err> {
    let graph = compile(body).map_err(|e| -> Err { format!("rule `{}`: {}", name, e).into() })?;
    match self.index.get(name) {
      Some(&at) => {
        debug!(rule = %name, "updated rule body");
        self.rules[at].graph = graph;
        Ok(())
      }
      None => Err(format!("update_rule: no rule named `{}`", name).into()),
    }
  }

  /// Designates the rule `match_text` runs. Without a root, matching falls
  /// back to the implicit longest-match over the root candidates.
  pub fn set_root(&mut self, name: &str) -> Result<(), Err> {
    if !self.index.contains_key(name) {
      return Err(format!("set_root: no rule named `{}`", name).into());
    }
    self.root = Some(name.to_string());
    Ok(())
  }

  pub fn rule(&self, name: &str) -> Option<&Rule> {
    self.index.get(name).map(|&at| &self.rules[at])
  }

  pub(crate) fn root(&self) -> Option<&str> {
    self.root.as_deref()
  }

  /// All rules, in registration order.
  pub fn rules(&self) -> &[Rule] {
    &self.rules
  }
}

impl fmt::Display for Ncc {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(root) = &self.root {
      writeln!(f, "//** root: {}", root)?;
    }
    for rule in &self.rules {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

#[test]
fn test_add_rule_rejects_malformed_bodies() {
  let mut ncc = Ncc::new();
  let err = ncc.add_rule(RuleSpec::new("broken", "a|")).unwrap_err();
  assert!(err.to_string().contains("broken"));
  assert!(ncc.rule("broken").is_none());
}

#[test]
fn test_add_rule_replaces_in_place() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("keyword", "if")).unwrap();
  ncc.add_rule(RuleSpec::new("other", "x")).unwrap();
  ncc.add_rule(RuleSpec::new("keyword", "if|else")).unwrap();
  // still two rules, and `keyword` kept its slot
  assert_eq!(ncc.rules().len(), 2);
  assert_eq!(ncc.rules()[0].name, "keyword");
  assert_eq!(
    ncc.rules()[0].graph,
    crate::parse_rule::compile("if|else").unwrap()
  );
}

#[test]
fn test_update_rule_requires_an_existing_rule() {
  let mut ncc = Ncc::new();
  assert!(ncc.update_rule("missing", "a").is_err());
  ncc.add_rule(RuleSpec::new("stub", "a")).unwrap();
  ncc.update_rule("stub", "a|b").unwrap();
  assert_eq!(
    ncc.rule("stub").unwrap().graph,
    crate::parse_rule::compile("a|b").unwrap()
  );
}

#[test]
fn test_set_root_requires_an_existing_rule() {
  let mut ncc = Ncc::new();
  assert!(ncc.set_root("missing").is_err());
  ncc.add_rule(RuleSpec::new("document", "a")).unwrap();
  ncc.set_root("document").unwrap();
  assert_eq!(ncc.root(), Some("document"));
}

#[test]
fn test_display_renders_rules_in_registration_order() {
  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("digit", "0-9")).unwrap();
  ncc
    .add_rule(RuleSpec::new("number", "${digit}{${digit}}^*"))
    .unwrap();
  ncc.set_root("number").unwrap();
  assert_eq!(
    ncc.to_string(),
    "//** root: number\ndigit := 0-9\nnumber := ${digit}{${digit}}^*\n"
  );
}

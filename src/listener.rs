use crate::ast::AstNode;

/// A named value captured by a nested rule match: rules added with
/// `push_variable` push `(rule name, matched text)` onto the variable stack of
/// the nearest enclosing listening rule. Stacks live only for the duration of
/// a single top-level match call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
  pub name: String,
  pub value: String,
}

impl Variable {
  pub fn new(name: &str, value: &str) -> Self {
    Self {
      name: name.to_string(),
      value: value.to_string(),
    }
  }
}

/// Everything a listener gets to see about a candidate rule match: the AST
/// node under construction (children already attached), the span it covers,
/// and the variables captured by nested matches.
pub struct MatchingData<'a> {
  pub node: &'a mut AstNode,
  pub match_length: usize,
  pub matched_text: &'a str,
  pub variables: &'a mut Vec<Variable>,
}

impl MatchingData<'_> {
  /// Pops the most recently captured variable; the popped value is owned by
  /// the caller and dropped when no longer needed.
  pub fn pop_variable(&mut self) -> Option<Variable> {
    self.variables.pop()
  }
}

/// Callbacks fired at rule-match boundaries. A rule that carries a listener is
/// tree-producing: each of its successful matches contributes an `AstNode`.
///
/// `on_match_end` fires in depth-first post-order as candidate matches
/// complete, so a veto (returning `false`) turns the candidate into a REJECT
/// and steers alternation while matching is still in flight. When a
/// previously accepted match is discarded by outer backtracking, `on_reject`
/// fires for it in reverse completion order, with its children still attached.
///
/// The engine is single-threaded; listeners that carry state share it through
/// `Rc<RefCell<...>>` and take `&self`.
pub trait RuleListener {
  /// Fired before the rule's graph is attempted.
  fn on_match_start(&self, _rule_name: &str, _text: &str, _offset: usize) {}

  /// Fired when the rule's graph matched; return `false` to veto.
  fn on_match_end(&self, _data: &mut MatchingData) -> bool {
    true
  }

  /// Fired when a previously accepted match of this rule is undone.
  fn on_reject(&self, _node: &AstNode) {}
}

/// The standard tree-building listener: accepts every match and contributes
/// its node to the AST. Equivalent to registering a rule with the plain
/// create/match/delete callback trio.
pub struct TreeBuilder;

impl RuleListener for TreeBuilder {}

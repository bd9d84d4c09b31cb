#[macro_use]
extern crate lazy_static;

pub mod ast;
pub mod graph;
pub mod listener;
pub mod matcher;
pub mod parse_rule;
pub mod rule_file;
pub mod rules;

pub use crate::ast::AstNode;
pub use crate::listener::{MatchingData, RuleListener, TreeBuilder, Variable};
pub use crate::matcher::MatchResult;
pub use crate::rules::{Ncc, Rule, RuleSpec};

/// Boxed static error type
pub type Err = Box<dyn std::error::Error + 'static>;

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::rc::Rc;

/// A toy symbol table shared between listeners through `Rc`.
#[cfg(test)]
#[derive(Default)]
struct SymbolTable {
  declared: RefCell<Vec<String>>,
}

#[cfg(test)]
impl SymbolTable {
  fn declare(&self, name: &str) {
    self.declared.borrow_mut().push(name.to_string());
  }

  fn undeclare(&self, name: &str) {
    let mut declared = self.declared.borrow_mut();
    if let Some(at) = declared.iter().rposition(|n| n == name) {
      declared.remove(at);
    }
  }

  fn is_declared(&self, name: &str) -> bool {
    self.declared.borrow().iter().any(|n| n == name)
  }
}

/// Declares the identifier child on match, un-declares it if the match is
/// later rejected.
#[cfg(test)]
struct Declares(Rc<SymbolTable>);

#[cfg(test)]
impl RuleListener for Declares {
  fn on_match_end(&self, data: &mut MatchingData) -> bool {
    let identifier = data
      .node
      .children
      .last()
      .expect("a declaration has an identifier child");
    self.0.declare(&identifier.value);
    true
  }

  fn on_reject(&self, node: &AstNode) {
    if let Some(identifier) = node.children.last() {
      self.0.undeclare(&identifier.value);
    }
  }
}

/// Accepts an assignment only if both identifiers were previously declared.
#[cfg(test)]
struct ChecksAssignment(Rc<SymbolTable>);

#[cfg(test)]
impl RuleListener for ChecksAssignment {
  fn on_match_end(&self, data: &mut MatchingData) -> bool {
    let left = &data.node.children[0];
    let right = &data.node.children[1];
    self.0.is_declared(&left.value) && self.0.is_declared(&right.value)
  }
}

#[test]
fn test_symbol_table_gated_parsing() {
  let table = Rc::new(SymbolTable::default());

  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("", r"{\ |\n}^*")).unwrap();
  ncc
    .add_rule(RuleSpec::new("identifier", "a-z|A-Z|_ {a-z|A-Z|_|0-9}^*").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("declaration", "${identifier};").listener(Declares(table.clone())))
    .unwrap();
  ncc
    .add_rule(
      RuleSpec::new("assignment", "${identifier}=${identifier};")
        .listener(ChecksAssignment(table.clone())),
    )
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("document", "{${declaration}|${assignment}|${}}^*").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("test", "Test1:${} ${document}").tree())
    .unwrap();
  ncc.set_root("test").unwrap();

  // every referenced variable was declared: the whole input matches
  let result = ncc.match_text("Test1:\nvar1;\nvar2;\nvar1=var2;").unwrap();
  assert!(result.matched);
  assert_eq!(result.length, 29);
  let ast = result.ast.unwrap();
  assert_eq!(ast.children.len(), 1);
  let document = &ast.children[0];
  assert_eq!(document.rule_name, "document");
  let kinds: Vec<&str> = document.children.iter().map(|c| c.rule_name.as_str()).collect();
  assert_eq!(kinds, vec!["declaration", "declaration", "assignment"]);

  table.declared.borrow_mut().clear();

  // var3 was never declared: the assignment is vetoed and the match stops
  // right after the declarations
  let result = ncc.match_text("Test1:\nvar1;\nvar2;\nvar1=var3;").unwrap();
  assert!(result.matched);
  assert_eq!(result.length, 19);
  let ast = result.ast.unwrap();
  let document = &ast.children[0];
  let kinds: Vec<&str> = document.children.iter().map(|c| c.rule_name.as_str()).collect();
  assert_eq!(kinds, vec!["declaration", "declaration"]);
  assert_eq!(*table.declared.borrow(), vec!["var1", "var2"]);
}

#[test]
fn test_rollback_undeclares_the_discarded_alternative() {
  use std::cell::Cell;

  struct CountingDeclares(Rc<SymbolTable>, Rc<Cell<usize>>);
  impl RuleListener for CountingDeclares {
    fn on_match_end(&self, data: &mut MatchingData) -> bool {
      let identifier = data
        .node
        .children
        .last()
        .expect("a declaration has an identifier child");
      self.0.declare(&identifier.value);
      true
    }
    fn on_reject(&self, node: &AstNode) {
      if let Some(identifier) = node.children.last() {
        self.0.undeclare(&identifier.value);
      }
      self.1.set(self.1.get() + 1);
    }
  }

  let table = Rc::new(SymbolTable::default());
  let rejects = Rc::new(Cell::new(0));

  let mut ncc = Ncc::new();
  ncc.add_rule(RuleSpec::new("", r"{\ |\n}^*")).unwrap();
  ncc
    .add_rule(RuleSpec::new("identifier", "a-z|A-Z|_ {a-z|A-Z|_|0-9}^*").tree())
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("specifier", "a-z|A-Z|_ {a-z|A-Z|_|0-9}^*").tree())
    .unwrap();
  ncc
    .add_rule(
      RuleSpec::new("declaration", "${specifier} ${} ${identifier};")
        .listener(CountingDeclares(table.clone(), rejects.clone())),
    )
    .unwrap();
  ncc
    .add_rule(RuleSpec::new("either", "${declaration}|${declaration}").tree())
    .unwrap();
  ncc.set_root("either").unwrap();

  let result = ncc.match_text("int a;").unwrap();
  assert!(result.matched);
  assert_eq!(result.length, 6);
  // both alternatives matched and declared `a`; the losing one rolled back
  assert_eq!(rejects.get(), 1);
  assert_eq!(*table.declared.borrow(), vec!["a"]);
}

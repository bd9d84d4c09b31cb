/// Compiles rule bodies written in the meta-language into node graphs.
///
/// The compiler walks the body left to right, reading one construct per
/// iteration and appending the resulting node to the current chain. `|` and
/// `^*` rewrite the chain: the node just emitted becomes a sub-graph of a new
/// `Or`/`Repeat` node. `^*` and `*` absorb the remainder of the body into
/// their `follow` sub-graph, so the chain terminates right after them.
use tracing::trace;

use crate::graph::{is_reserved, Graph, Node};
use crate::Err;

type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// Compiles a rule body into its node graph. Unescaped whitespace is
/// insignificant and skipped; an empty body compiles to the empty rule, which
/// matches zero characters anywhere.
pub fn compile(body: &str) -> Result<Graph, Err> {
  let graph = compile_chain(body)?;
  trace!(body, graph = %graph, "compiled rule body");
  Ok(graph)
}

fn compile_chain(s: &str) -> Result<Graph, Err> {
  let mut nodes = vec![Node::Root];
  let mut rem = s;
  loop {
    rem = rem.trim_start();
    let c = match rem.chars().next() {
      None => {
        nodes.push(Node::Accept);
        return Ok(Graph::of(nodes));
      }
      Some(c) => c,
    };

    match c {
      '$' => {
        let (node, rest) = parse_substitution(rem)?;
        nodes.push(node);
        rem = rest;
      }
      '{' => {
        let (node, rest) = parse_sub_rule(rem)?;
        nodes.push(node);
        rem = rest;
      }
      '}' => return Err(format!("unmatched `}}` at `{}`", rem).into()),
      '*' => {
        // Anything-until: everything after the `*` becomes its follow graph,
        // so there is nothing left for the chain itself.
        nodes.push(Node::Anything(compile_chain(&rem[1..])?));
        nodes.push(Node::Accept);
        return Ok(Graph::of(nodes));
      }
      '^' => {
        let body = match nodes.pop() {
          None | Some(Node::Root) => {
            return Err("`^` can't come at the beginning of a rule/sub-rule".into());
          }
          Some(node) => node,
        };
        let rest = &rem[1..];
        match rest.chars().next() {
          Some('*') => {}
          Some(c) => {
            return Err(
              format!("expecting `*` after `^`, found `{}` (numeric repetition is not supported)", c)
                .into(),
            );
          }
          None => return Err("expecting `*` after `^`, found the end of the rule".into()),
        }
        nodes.push(Node::Repeat(Graph::single(body), compile_chain(&rest[1..])?));
        nodes.push(Node::Accept);
        return Ok(Graph::of(nodes));
      }
      '|' => {
        let lhs = match nodes.pop() {
          None | Some(Node::Root) => {
            return Err("`|` can't come at the beginning of a rule/sub-rule".into());
          }
          Some(node) => node,
        };
        let rest = rem[1..].trim_start();
        if rest.is_empty() {
          return Err("`|` can't come at the end of a rule/sub-rule".into());
        }
        let (rhs, rest) = compile_single(rest)?;
        nodes.push(Node::Or(Graph::single(lhs), Graph::single(rhs)));
        rem = rest;
      }
      '-' => return Err("a `-` must always be preceded by a literal".into()),
      _ => {
        let (node, rest) = parse_literal(rem)?;
        nodes.push(node);
        rem = rest;
      }
    }
  }
}

/// Compiles exactly one construct, for the right-hand side of an `|`.
fn compile_single(s: &str) -> ParseResult<'_, Node> {
  match s.chars().next() {
    None => Err("`|` can't come at the end of a rule/sub-rule".into()),
    Some('$') => parse_substitution(s),
    Some('{') => parse_sub_rule(s),
    // The follow graph of an anything node swallows the rest of the body.
    Some('*') => Ok((Node::Anything(compile_chain(&s[1..])?), "")),
    Some('^') => Err("`^` can't come at the beginning of a rule/sub-rule".into()),
    Some('|') => Err("`|` can't come at the beginning of a rule/sub-rule".into()),
    Some('}') => Err(format!("unmatched `}}` at `{}`", s).into()),
    Some('-') => Err("a `-` must always be preceded by a literal".into()),
    Some(_) => parse_literal(s),
  }
}

/// Reads a `{ ... }` group (`s` starts at the `{`) and compiles its body.
fn parse_sub_rule(s: &str) -> ParseResult<'_, Node> {
  let (inner, rest) = take_group(s)?;
  if inner.is_empty() {
    return Err("can't have empty sub-rules `{}`".into());
  }
  Ok((Node::SubRule(compile_chain(inner)?), rest))
}

/// Finds the matching `}` (counting nesting, skipping escapes) and returns
/// the text between the braces and the remainder after the `}`.
fn take_group(s: &str) -> ParseResult<'_, &str> {
  let mut depth = 0usize;
  let mut escaped = false;
  for (i, c) in s.char_indices() {
    if escaped {
      escaped = false;
      continue;
    }
    match c {
      '\\' => escaped = true,
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Ok((&s[1..i], &s[i + 1..]));
        }
      }
      _ => {}
    }
  }
  Err(format!("couldn't find a matching `}}` in `{}`", s).into())
}

/// Reads a `${name}` substitution; the name may be empty (the conventional
/// whitespace-and-comment skip rule).
fn parse_substitution(s: &str) -> ParseResult<'_, Node> {
  let rest = &s[1..];
  if !rest.starts_with('{') {
    return Err(format!("`$` must be followed by a `{{name}}` substitution at `{}`", s).into());
  }
  match rest[1..].find('}') {
    Some(i) => Ok((Node::Substitute(rest[1..1 + i].to_string()), &rest[i + 2..])),
    None => Err(format!("couldn't find a matching `}}` in `{}`", s).into()),
  }
}

/// Reads one optionally-escaped literal, or a literals range if an unescaped
/// `-` follows it. Range ends are normalized so that start <= end.
fn parse_literal(s: &str) -> ParseResult<'_, Node> {
  let (first, rest) = unescape_literal(s)?;
  if let Some(tail) = rest.strip_prefix('-') {
    match tail.chars().next() {
      None => return Err("a `-` must be followed by a literal".into()),
      Some(c) if (is_reserved(c) && c != '\\') || c.is_whitespace() => {
        return Err(format!("a `-` can't be followed by an unescaped `{}`", c).into());
      }
      Some(_) => {}
    }
    let (second, rest) = unescape_literal(tail)?;
    let (lo, hi) = if first <= second { (first, second) } else { (second, first) };
    return Ok((Node::Range(lo, hi), rest));
  }
  Ok((Node::Literal(first), rest))
}

/// Consumes one character, resolving a leading backslash escape. `\n` denotes
/// newline; any other escaped character stands for itself.
fn unescape_literal(s: &str) -> ParseResult<'_, char> {
  let mut chars = s.chars();
  let c = match chars.next() {
    None => return Err("expected a literal, found the end of the rule".into()),
    Some(c) => c,
  };
  if c != '\\' {
    return Ok((c, &s[c.len_utf8()..]));
  }
  match chars.next() {
    None => Err("escape character `\\` not followed by anything".into()),
    Some('n') => Ok(('\n', &s[2..])),
    Some(esc) => Ok((esc, &s[1 + esc.len_utf8()..])),
  }
}

#[test]
fn test_compile_literal_chain() {
  let g = compile("abc").unwrap();
  assert_eq!(
    g.inner(),
    &[Node::Literal('a'), Node::Literal('b'), Node::Literal('c')]
  );
}

#[test]
fn test_compile_skips_insignificant_whitespace() {
  assert_eq!(compile("a b\n c").unwrap(), compile("abc").unwrap());
  assert!(compile("").unwrap().inner().is_empty());
  assert!(compile("   ").unwrap().inner().is_empty());
}

#[test]
fn test_compile_range_normalizes_ends() {
  assert_eq!(compile("z-a").unwrap().inner(), &[Node::Range('a', 'z')]);
  assert_eq!(compile("0-9").unwrap().inner(), &[Node::Range('0', '9')]);
}

#[test]
fn test_compile_escapes() {
  let g = compile(r"\*\{\}\$\|\^\-\\\n\ ").unwrap();
  let expected: Vec<Node> = "*{}$|^-\\\n ".chars().map(Node::Literal).collect();
  assert_eq!(g.inner(), &expected[..]);
}

#[test]
fn test_compile_or_rewrites_the_previous_node() {
  let g = compile("ab|cd").unwrap();
  assert_eq!(
    g.inner(),
    &[
      Node::Literal('a'),
      Node::Or(
        Graph::single(Node::Literal('b')),
        Graph::single(Node::Literal('c'))
      ),
      Node::Literal('d'),
    ]
  );
}

#[test]
fn test_compile_repeat_absorbs_the_tail() {
  let g = compile("a^*bc").unwrap();
  assert_eq!(
    g.inner(),
    &[Node::Repeat(
      Graph::single(Node::Literal('a')),
      compile("bc").unwrap()
    )]
  );
}

#[test]
fn test_compile_anything_absorbs_the_tail() {
  let g = compile("*XYZ").unwrap();
  assert_eq!(g.inner(), &[Node::Anything(compile("XYZ").unwrap())]);
}

#[test]
fn test_compile_substitution() {
  let g = compile("${integer},${}").unwrap();
  assert_eq!(
    g.inner(),
    &[
      Node::Substitute("integer".to_string()),
      Node::Literal(','),
      Node::Substitute(String::new()),
    ]
  );
}

#[test]
fn test_compile_errors() {
  let malformed = [
    "{}",     // empty sub-rule
    "{ab",    // unmatched opening brace
    "ab}",    // unmatched closing brace
    r"ab\",   // trailing backslash
    "a^5",    // numeric repetition is reserved
    "a^",     // bare ^
    "^*a",    // ^ at the beginning
    "|ab",    // | at the beginning
    "ab|",    // | at the end
    "a||b",   // | as the rhs of an |
    "-a",     // - without a preceding literal
    "a-",     // - without a following literal
    "a-*",    // - followed by an unescaped reserved character
    "a- b",   // - followed by whitespace
    "$name",  // $ without a braced name
    "${name", // unterminated substitution
  ];
  for body in malformed {
    assert!(compile(body).is_err(), "`{}` should not compile", body);
  }
}

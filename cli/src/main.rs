use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing_subscriber::EnvFilter;

use ncc::{Err, Ncc};

fn usage(prog_name: &str) -> String {
  format!(
    r"
Usage: {} FILE [options]

Matches each input line against the root rule of the rule file.

Options:
  -h, --help     Print this message
  -n, --no-tree  Don't print the AST (defaults to printing)
  -c, --color    Colorize the AST",
    prog_name
  )
}

fn match_line(ncc: &Ncc, line: &str, print_tree: bool, color: bool) -> Result<(), Err> {
  let result = ncc.match_text(line)?;

  if result.matched {
    println!("Matched {} of {} bytes", result.length, line.len());
  } else {
    println!("No match (tried through byte {})", result.length);
  }

  if print_tree {
    if let Some(ast) = result.ast {
      print!("{}", ast.tree_to_string(0, color));
    }
  }
  println!();

  Ok(())
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let opts: Vec<String> = env::args().collect();
  let prog_name = opts[0].clone();

  if opts.len() < 2 {
    println!("{}", usage(&prog_name));
    process::exit(1);
  }

  let mut opts = opts.into_iter().skip(1);
  let filename = opts.next().unwrap();

  let mut print_tree = true; // default to printing the AST
  let mut color = false; // default to plain output
  for o in opts {
    if o == "-h" || o == "--help" {
      println!("{}", usage(&prog_name));
      process::exit(0);
    } else if o == "-n" || o == "--no-tree" {
      print_tree = false;
    } else if o == "-c" || o == "--color" {
      color = true;
    }
  }

  let ncc = Ncc::read_from_file(&filename)?;

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        match_line(&ncc, input.trim_end_matches('\n'), print_tree, color)?;
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}

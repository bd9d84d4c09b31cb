use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ncc::Ncc;

const RULES_SRC: &str = include_str!("../demos/assignments.ncc");

fn match_length(ncc: &Ncc, input: &str) -> usize {
  ncc.match_text(input).unwrap().length
}

fn criterion_benchmark(c: &mut Criterion) {
  let ncc = RULES_SRC.parse::<Ncc>().unwrap();
  let simple_input = "var1;\nvar2;\nvar1=var2;";
  let complex_input = {
    let mut doc = String::new();
    for i in 0..50 {
      doc.push_str(&format!("var{};\n", i));
    }
    for i in 1..50 {
      doc.push_str(&format!("var{}=var{};\n", i, i - 1));
    }
    doc
  };

  c.bench_function("match simple document", |b| {
    b.iter(|| match_length(black_box(&ncc), black_box(simple_input)))
  });

  c.bench_function("match large document", |b| {
    b.iter(|| match_length(black_box(&ncc), black_box(&complex_input)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

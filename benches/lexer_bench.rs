use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lisp::{Parser, tokenize};

// One block of a reasonably busy program; the benchmark input repeats it
const BENCH_BLOCK: &str = r#"
(let fib (=> n
  ; Calculate the nth Fibonacci number
  (if (< n 2)
      n
      (+ (fib (- n 1))
         (fib (- n 2))))))

(let factorial (=> n
  (if (<= n 1)
      1
      else (* n (factorial (- n 1))))))

; Some calls
(fib 10)
(factorial 5)
(def (=> a b (max a b)) 12.5 -3)
((+ 1 2) (// 7 2) (% -7 3))
(and (>= 4 4) (or 0 1))
"#;

fn bench_input(blocks: usize) -> String {
    BENCH_BLOCK.repeat(blocks)
}

fn bench_frontend(c: &mut Criterion) {
    let input = bench_input(40);
    let mut group = c.benchmark_group("Frontend");

    group.bench_with_input(
        BenchmarkId::new("tokenize", "complex_input"),
        &input,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );

    // Parsing consumes its tokens, so they are cloned per iteration
    let tokens = tokenize(&input);
    group.bench_with_input(
        BenchmarkId::new("parse", "complex_input"),
        &tokens,
        |b, tokens| b.iter(|| Parser::new(black_box(tokens.clone())).parse()),
    );

    group.finish();
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);

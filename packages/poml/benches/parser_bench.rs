use criterion::{black_box, criterion_group, criterion_main, Criterion};
use poml::{encode, parse_str, parse_str_fast, ElementData, ElementKind, EncodeOptions};
use std::convert::Infallible;

const PROMPT: &str = r#"<poml>
  <meta><id>bench</id><version>1</version><owner>perf</owner></meta>
  <role>You are a careful reviewer.</role>
  <task>Review the attached patch.</task>
  <input name="patch" required="true"/>
  <style><output format="markdown">Use bullet points.</output></style>
  <!-- tools -->
  <tool name="lint" description="Run the linter">{"type": "object"}</tool>
  <tool-request id="c1" name="lint" parameters='{"path": "src"}'/>
  <tool-response id="c1" name="lint">clean</tool-response>
  <x-note>kept verbatim</x-note>
</poml>
"#;

fn large_prompt() -> String {
    let mut source = String::from("<poml>\n  <role>r</role>\n");
    for i in 0..500 {
        source.push_str(&format!("  <task id=\"t{}\">Step {} of the plan.</task>\n", i, i));
        source.push_str(&format!("  <hint>Hint {}</hint>\n", i));
    }
    source.push_str("</poml>\n");
    source
}

fn parse_small(c: &mut Criterion) {
    c.bench_function("parse_small_fidelity", |b| {
        b.iter(|| parse_str(black_box(PROMPT)))
    });
    c.bench_function("parse_small_fast", |b| {
        b.iter(|| parse_str_fast(black_box(PROMPT)))
    });
}

fn parse_large(c: &mut Criterion) {
    let source = large_prompt();
    c.bench_function("parse_large_fidelity", |b| {
        b.iter(|| parse_str(black_box(&source)))
    });
}

fn encode_large(c: &mut Criterion) {
    let source = large_prompt();
    let doc = parse_str(&source).unwrap();
    let fidelity = EncodeOptions::fidelity();
    let canonical = EncodeOptions::canonical();

    c.bench_function("encode_large_fidelity", |b| {
        b.iter(|| encode(black_box(&doc), &fidelity))
    });
    c.bench_function("encode_large_canonical", |b| {
        b.iter(|| encode(black_box(&doc), &canonical))
    });
}

fn mutate_large(c: &mut Criterion) {
    let source = large_prompt();
    let doc = parse_str(&source).unwrap();

    c.bench_function("mutate_remove_hints_insert_tasks", |b| {
        b.iter(|| {
            let mut doc = doc.clone();
            doc.mutate(|el, m| {
                match el.kind {
                    ElementKind::Hint => {
                        m.remove(el);
                    }
                    ElementKind::Task => {
                        m.insert_after(el, ElementData::task("follow up"));
                    }
                    _ => {}
                }
                Ok::<_, Infallible>(())
            })
            .unwrap();
            doc
        })
    });
}

criterion_group!(benches, parse_small, parse_large, encode_large, mutate_large);
criterion_main!(benches);

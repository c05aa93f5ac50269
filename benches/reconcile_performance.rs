use std::rc::Rc;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dom_parts::reconcile::reconcile;
use dom_parts::{DefaultProcessor, Document, Dom, State, Template, TemplateConfig, TemplateInstance, Value};

fn list(doc: &mut Document, size: usize) -> (dom_parts::NodeId, Vec<dom_parts::NodeId>) {
    let ul = doc.create_element("ul");
    let items: Vec<_> = (0..size)
        .map(|i| {
            let li = doc.create_element("li");
            let text = doc.create_text(&i.to_string());
            doc.append_child(li, text).unwrap();
            doc.append_child(ul, li).unwrap();
            li
        })
        .collect();
    (ul, items)
}

fn benchmark_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("reverse", size), &size, |b, &size| {
            b.iter_with_setup(
                || {
                    let mut doc = Document::new();
                    let (ul, items) = list(&mut doc, size);
                    let reversed: Vec<_> = items.iter().rev().copied().collect();
                    (doc, ul, items, reversed)
                },
                |(mut doc, ul, items, reversed)| {
                    black_box(reconcile(&mut doc, ul, &items, reversed, None).unwrap());
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("replace_middle", size), &size, |b, &size| {
            b.iter_with_setup(
                || {
                    let mut doc = Document::new();
                    let (ul, items) = list(&mut doc, size);
                    let mut next = items.clone();
                    next[size / 2] = doc.create_element("li");
                    (doc, ul, items, next)
                },
                |(mut doc, ul, items, next)| {
                    black_box(reconcile(&mut doc, ul, &items, next, None).unwrap());
                },
            );
        });
    }

    group.finish();
}

fn benchmark_update(c: &mut Criterion) {
    let template = Arc::new(
        Template::parse("<tr class=\"row {{kind}}\"><td>{{id}}</td><td>{{label}}</td><td>{{items}}</td></tr>")
            .unwrap(),
    );
    let mut doc = Document::new();
    let mut instance = TemplateInstance::render(
        &mut doc,
        template.clone(),
        &State::new(),
        Rc::new(DefaultProcessor::new()),
        TemplateConfig::default(),
    )
    .unwrap();

    let mut tick = 0u64;
    c.bench_function("update_row", |b| {
        b.iter(|| {
            tick += 1;
            let state = State::new()
                .with("kind", if tick % 2 == 0 { "even" } else { "odd" })
                .with("id", tick)
                .with("label", "row label")
                .with("items", vec![Value::from("a"), Value::from(tick)]);
            instance.update(&mut doc, black_box(&state)).unwrap();
        });
    });

    c.bench_function("render_row", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            black_box(
                TemplateInstance::render(
                    &mut doc,
                    template.clone(),
                    &State::new().with("kind", "odd").with("id", 1).with("label", "x"),
                    Rc::new(DefaultProcessor::new()),
                    TemplateConfig::default(),
                )
                .unwrap(),
            );
        });
    });
}

criterion_group!(benches, benchmark_reconcile, benchmark_update);
criterion_main!(benches);

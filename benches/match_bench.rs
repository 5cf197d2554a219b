use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rulematch::{ArrayMembership, Event, EventField, GenericMachine, MachineConfig, Pattern};

fn string_field(name: &str, value: &str) -> EventField {
    let mut quoted = Vec::with_capacity(value.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(value.as_bytes());
    quoted.push(b'"');
    EventField::new(name, quoted, ArrayMembership::new())
}

fn build_machine(rule_count: usize) -> GenericMachine<String> {
    let machine = GenericMachine::new(MachineConfig::default());
    for i in 0..rule_count {
        machine
            .add_pattern_rule(
                format!("rule-{i}"),
                vec![
                    (
                        "detail.state".to_string(),
                        vec![Pattern::exact(format!("\"state-{}\"", i % 50).into_bytes())],
                    ),
                    (
                        "detail.region".to_string(),
                        vec![Pattern::prefix(b"\"us-".to_vec())],
                    ),
                ],
            )
            .unwrap();
    }
    machine
}

fn bench_add_pattern_rule(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_pattern_rule");
    for rule_count in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rule_count, |b, &rule_count| {
            b.iter(|| black_box(build_machine(rule_count)));
        });
    }
    group.finish();
}

fn bench_match_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_event");
    for rule_count in [10usize, 100, 1000, 10_000] {
        let machine = build_machine(rule_count);
        let event = Event::new(vec![
            string_field("detail.state", "state-7"),
            string_field("detail.region", "us-east-1"),
        ]);
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rule_count, |b, _| {
            b.iter(|| black_box(rulematch::match_event(&machine, &event)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add_pattern_rule, bench_match_event);
criterion_main!(benches);

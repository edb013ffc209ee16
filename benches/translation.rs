//! Hot-path benchmark suite.
//!
//! Benchmarks the per-line and per-frame work every bridge does:
//! - IRC line parsing
//! - IRC event translation, forwarded and dropped
//! - Session command parsing
//!
//! Run with: cargo bench --bench translation
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};

use ircbridge::SessionCommand;
use ircbridge::irc::Message;
use ircbridge::protocol::translation;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LINES: &[(&str, &str)] = &[
    ("ping", "PING :irc.example.net"),
    ("privmsg", ":bob!b@host.example PRIVMSG #rust :hello there, how is everyone?"),
    (
        "tagged",
        "@time=2024-01-01T00:00:00Z :bob!b@host PRIVMSG #rust :tagged message",
    ),
    ("numeric", ":irc.example.net 353 alice = #rust :@alice +bob carol ~dave"),
];

fn event_args() -> Vec<Value> {
    vec![
        json!("bob"),
        json!("#rust"),
        json!("hello there"),
        json!({ "command": "PRIVMSG", "args": ["#rust", "hello there"] }),
    ]
}

// ============================================================================
// Benchmark: IRC Line Parsing
// ============================================================================

fn bench_line_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_parse");

    for &(name, line) in LINES {
        group.bench_with_input(BenchmarkId::new("parse", name), line, |b, line| {
            b.iter(|| Message::parse(black_box(line)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Event Translation
// ============================================================================

fn bench_translate(c: &mut Criterion) {
    let args = event_args();
    let mut group = c.benchmark_group("translate");

    for event in ["message", "ctcp"] {
        group.bench_with_input(BenchmarkId::new("event", event), event, |b, event| {
            b.iter(|| translation::translate(black_box(event), black_box(&args)));
        });
    }

    group.bench_function("to_json", |b| {
        let message = translation::translate("message", &args);
        b.iter(|| message.as_ref().map(|m| m.to_json()));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Session Command Parsing
// ============================================================================

fn bench_command_parse(c: &mut Criterion) {
    let frame = r##"{"command":"say","target":"#rust","message":"hello there"}"##;

    c.bench_function("command_parse", |b| {
        b.iter(|| SessionCommand::parse(black_box(frame)));
    });
}

criterion_group!(benches, bench_line_parse, bench_translate, bench_command_parse);
criterion_main!(benches);

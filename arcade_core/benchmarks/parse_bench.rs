use arcade_core::parse_line;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const LINES: &[(&str, &str)] = &[
    (
        "player_spawn",
        "T:25 AType:10 PLID:311297 PID:312321 BUL:1200 SH:0 BOMB:0 RCT:0 (133960.969,83.157,185100.344) IDS:2b3c4d5e-0000-1111-2222-333344445555 LOGIN:9f8e7d6c-0000-1111-2222-333344445555 NAME:SCG_Limbo TYPE:Ju 87 D-3 COUNTRY:201 FORM:0 FIELD:0 INAIR:2 PARENT:-1 ISPL:1 ISTSTART:1 PAYLOAD:0 FUEL:1.000 SKIN: WM:1",
    ),
    (
        "vehicle_spawn",
        "T:30 AType:12 ID:886784 TYPE:T-34-76 STZ COUNTRY:101 NAME:m03_t34 PID:-1 POS(1.0,2.0,3.0)",
    ),
    (
        "damage",
        "T:40 AType:2 DMG:0.250 AID:311297 TID:886784 POS(133960.969,83.157,185100.344)",
    ),
    ("kill", "T:41 AType:3 AID:311297 TID:886784 POS(1.0,2.0,3.0)"),
    ("ignored", "T:5 AType:15 VER:17"),
];

fn bench_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");

    for (name, line) in LINES {
        group.bench_with_input(BenchmarkId::new("kind", name), line, |b, line| {
            b.iter(|| parse_line(black_box(line)))
        });
    }

    group.finish();
}

fn bench_mission_report(c: &mut Criterion) {
    let report: Vec<&str> = LINES
        .iter()
        .map(|(_, line)| *line)
        .cycle()
        .take(5_000)
        .collect();

    c.bench_function("parse_report_5000_lines", |b| {
        b.iter(|| {
            report
                .iter()
                .filter_map(|line| parse_line(line).ok().flatten())
                .count()
        })
    });
}

criterion_group!(parse_benches, bench_parse_line, bench_mission_report);
criterion_main!(parse_benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SAMPLE: &str = r#"var _d;
var _a = [].slice.call([]);
eval("_d.s0 = function (i) { return [\"alpha\", \"beta\", \"gamma\"][i]; };\n_d.n0 = function () { return 1337; };");
var banner = `${_d.s0(0)} ${_d.s0(1)} ${_d.s0(2)}`;
var k = 12345678 - 12345677;
var s = 0;
while (s != 65535) switch (s) {
    case 0:
        s = check(k) ? 1 : 2;
        break;
    case 1:
        s = 65535;
        { emit(banner); }
        break;
    case 2:
        s = 65535;
        { emit(_d["n0"]()); }
        break;
}
"#;

fn bench_pipeline(c: &mut Criterion) {
    c.bench_function("deobfuscate_end_to_end", |b| {
        b.iter(|| undefender::deobfuscate(black_box(SAMPLE)).unwrap())
    });

    c.bench_function("parse_only", |b| {
        b.iter(|| undefender::parse_source_silent(black_box(SAMPLE)).unwrap())
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);

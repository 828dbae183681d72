use criterion::{Criterion, Throughput};

use protodyn::encoding::{decode_varint, encode_varint};

fn benchmark_varint(criterion: &mut Criterion, name: &str, values: Vec<u64>) {
    let mut group = criterion.benchmark_group(format!("varint/{}", name));
    group.throughput(Throughput::Bytes(values.len() as u64 * 8));

    group.bench_function("encode", |b| {
        let mut buf = Vec::<u8>::with_capacity(values.len() * 10);
        b.iter(|| {
            buf.clear();
            for &value in &values {
                encode_varint(value, &mut buf);
            }
            criterion::black_box(&buf);
        })
    });

    let mut encoded = Vec::new();
    for &value in &values {
        encode_varint(value, &mut encoded);
    }

    group.bench_function("decode", |b| {
        b.iter(|| {
            let mut buf = &encoded[..];
            while !buf.is_empty() {
                criterion::black_box(decode_varint(&mut buf).unwrap());
            }
        })
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();

    // 100 small (1 byte) varints.
    benchmark_varint(&mut criterion, "small", (0..100).collect());

    // 100 medium (5 byte) varints.
    benchmark_varint(&mut criterion, "medium", (0..100).map(|i| 1 << 28 | i).collect());

    // 100 large (10 byte) varints.
    benchmark_varint(&mut criterion, "large", (0..100).map(|i| u64::MAX - i).collect());

    // 100 varints of mixed width (average 5.5 bytes).
    benchmark_varint(
        &mut criterion,
        "mixed",
        (0..10)
            .flat_map(|width| {
                let exponent = width * 7;
                (0..10).map(move |offset| offset + (1 << exponent))
            })
            .collect(),
    );

    criterion.final_summary();
}

//! Benchmarks for the Wiegand decode hot path.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gatehouse_hardware::wiegand::{FrameAccumulator, decode_frame, encode_frame};

fn bench_decode_frame(c: &mut Criterion) {
    let frame_26 = encode_frame(12345678, 26).unwrap();
    let frame_34 = encode_frame(3_123_456_789, 34).unwrap();

    c.bench_function("decode_frame_26", |b| {
        b.iter(|| decode_frame(black_box(26), black_box(frame_26)))
    });

    c.bench_function("decode_frame_34", |b| {
        b.iter(|| decode_frame(black_box(34), black_box(frame_34)))
    });
}

fn bench_frame_assembly(c: &mut Criterion) {
    let frame = encode_frame(12345678, 26).unwrap();

    c.bench_function("assemble_26_bit_frame", |b| {
        b.iter(|| {
            let mut acc = FrameAccumulator::new(26, 25);
            let mut out = None;
            for i in 0..26u64 {
                let bit = ((frame >> (25 - i)) & 1) as u8;
                out = acc.push(black_box(bit), i * 200);
            }
            out
        })
    });
}

criterion_group!(benches, bench_decode_frame, bench_frame_assembly);
criterion_main!(benches);

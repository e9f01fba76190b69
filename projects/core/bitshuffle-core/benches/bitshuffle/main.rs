use bitshuffle_core::allocate::ScratchBuffer;
use bitshuffle_core::transpose::{portable, trans_bit_elem_with, untrans_bit_elem_with};
use bitshuffle_core::{bitshuffle, compress, compress_bound, default_block_size, Capability};
use bitshuffle_lz4::Lz4BlockCompressor;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

/// 4-byte elements holding a slowly rising counter, the typical shuffle workload.
fn generate_test_data(num_bytes: usize) -> ScratchBuffer {
    let mut data = ScratchBuffer::new(num_bytes).unwrap();
    for (index, elem) in data.as_mut_slice().chunks_exact_mut(4).enumerate() {
        elem.copy_from_slice(&((index as u32) / 7).to_le_bytes());
    }
    data
}

fn bench_stages(c: &mut Criterion, input: &ScratchBuffer, size: usize) {
    let mut group = c.benchmark_group("Transpose Stages (elem_size = 4)");
    group.throughput(Throughput::Bytes(input.len() as u64));
    let mut output = ScratchBuffer::new(input.len()).unwrap();

    group.bench_with_input(BenchmarkId::new("portable trans_byte_elem", size), &size, |b, _| {
        b.iter(|| portable::trans_byte_elem(black_box(input.as_slice()), output.as_mut_slice(), size, 4))
    });
    group.bench_with_input(BenchmarkId::new("portable trans_bit_byte", size), &size, |b, _| {
        b.iter(|| portable::trans_bit_byte(black_box(input.as_slice()), output.as_mut_slice(), size, 4))
    });

    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    {
        use bitshuffle_core::bench::{avx2, sse2};
        use bitshuffle_core::cpu_detect::{has_avx2, has_sse2};

        if has_sse2() {
            let mut scratch = ScratchBuffer::new(input.len()).unwrap();
            group.bench_with_input(BenchmarkId::new("sse2 trans_byte_elem", size), &size, |b, _| {
                b.iter(|| unsafe {
                    sse2::trans_byte_elem(
                        black_box(input.as_slice()),
                        output.as_mut_slice(),
                        scratch.as_mut_slice(),
                        size,
                        4,
                    )
                })
            });
            group.bench_with_input(BenchmarkId::new("sse2 trans_bit_byte", size), &size, |b, _| {
                b.iter(|| unsafe {
                    sse2::trans_bit_byte(black_box(input.as_slice()), output.as_mut_slice(), size, 4)
                })
            });
            group.bench_with_input(BenchmarkId::new("sse2 trans_byte_bitrow", size), &size, |b, _| {
                b.iter(|| unsafe {
                    sse2::trans_byte_bitrow(black_box(input.as_slice()), output.as_mut_slice(), size, 4)
                })
            });
            group.bench_with_input(
                BenchmarkId::new("sse2 shuffle_bit_eightelem", size),
                &size,
                |b, _| {
                    b.iter(|| unsafe {
                        sse2::shuffle_bit_eightelem(
                            black_box(input.as_slice()),
                            output.as_mut_slice(),
                            size,
                            4,
                        )
                    })
                },
            );
        }

        if has_avx2() {
            group.bench_with_input(BenchmarkId::new("avx2 trans_bit_byte", size), &size, |b, _| {
                b.iter(|| unsafe {
                    avx2::trans_bit_byte(black_box(input.as_slice()), output.as_mut_slice(), size, 4)
                })
            });
            group.bench_with_input(
                BenchmarkId::new("avx2 shuffle_bit_eightelem", size),
                &size,
                |b, _| {
                    b.iter(|| unsafe {
                        avx2::shuffle_bit_eightelem(
                            black_box(input.as_slice()),
                            output.as_mut_slice(),
                            size,
                            4,
                        )
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_variants(c: &mut Criterion, input: &ScratchBuffer, size: usize) {
    let mut group = c.benchmark_group("Full Transform (elem_size = 4)");
    group.throughput(Throughput::Bytes(input.len() as u64));
    let mut output = ScratchBuffer::new(input.len()).unwrap();
    let mut scratch = ScratchBuffer::new(input.len()).unwrap();

    for capability in Capability::ALL {
        if !capability.is_available() {
            continue;
        }

        group.bench_with_input(
            BenchmarkId::new(format!("{capability:?} trans_bit_elem"), size),
            &size,
            |b, _| {
                b.iter(|| {
                    trans_bit_elem_with(
                        capability,
                        black_box(input.as_slice()),
                        output.as_mut_slice(),
                        scratch.as_mut_slice(),
                        size,
                        4,
                    )
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new(format!("{capability:?} untrans_bit_elem"), size),
            &size,
            |b, _| {
                b.iter(|| {
                    untrans_bit_elem_with(
                        capability,
                        black_box(input.as_slice()),
                        output.as_mut_slice(),
                        scratch.as_mut_slice(),
                        size,
                        4,
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_blocked(c: &mut Criterion, input: &ScratchBuffer, size: usize) {
    let mut group = c.benchmark_group("Blocked Driver (elem_size = 4)");
    group.throughput(Throughput::Bytes(input.len() as u64));
    let mut output = ScratchBuffer::new(input.len()).unwrap();

    for block_size in [0, 256, 8192] {
        let label = if block_size == 0 {
            format!("bitshuffle default ({})", default_block_size(4))
        } else {
            format!("bitshuffle block {block_size}")
        };
        group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
            b.iter(|| {
                bitshuffle(
                    black_box(input.as_slice()),
                    output.as_mut_slice(),
                    size,
                    4,
                    block_size,
                )
            })
        });
    }

    let bound = compress_bound(&Lz4BlockCompressor, size, 4, 0).unwrap();
    let mut compressed = ScratchBuffer::new(bound).unwrap();
    group.bench_with_input(BenchmarkId::new("compress lz4", size), &size, |b, _| {
        b.iter(|| {
            compress(
                &Lz4BlockCompressor,
                black_box(input.as_slice()),
                compressed.as_mut_slice(),
                size,
                4,
                0,
            )
        })
    });

    group.finish();
}

fn criterion_benchmark(c: &mut Criterion) {
    let num_bytes = 1024 * 1024;
    let size = num_bytes / 4;
    let input = generate_test_data(num_bytes);

    bench_stages(c, &input, size);
    bench_variants(c, &input, size);
    bench_blocked(c, &input, size);
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);

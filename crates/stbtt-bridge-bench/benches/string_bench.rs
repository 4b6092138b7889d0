//! strlen/memcpy/memset benchmarks through the bridge and the safe core.

use std::ffi::{c_char, c_void};
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use stbtt_bridge_abi::string_abi::{stb_zig_memcpy, stb_zig_memset, stb_zig_strlen};
use stbtt_bridge_core::string::{copy_memory, fill_memory, string_length};

const SIZES: &[usize] = &[16, 64, 256, 1024, 4096];

fn bench_memcpy(c: &mut Criterion) {
    let mut group = c.benchmark_group("memcpy");
    for &size in SIZES {
        let src = vec![0xABu8; size];
        let mut dst = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("core", size), &size, |b, &n| {
            b.iter(|| copy_memory(black_box(dst.as_mut_slice()), black_box(src.as_slice()), n));
        });
        group.bench_with_input(BenchmarkId::new("bridge_abi", size), &size, |b, &n| {
            b.iter(|| unsafe {
                stb_zig_memcpy(
                    black_box(dst.as_mut_ptr().cast::<c_void>()),
                    black_box(src.as_ptr().cast::<c_void>()),
                    n,
                )
            });
        });
    }
    group.finish();
}

fn bench_memset(c: &mut Criterion) {
    let mut group = c.benchmark_group("memset");
    for &size in SIZES {
        let mut dst = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("core", size), &size, |b, &n| {
            b.iter(|| fill_memory(black_box(dst.as_mut_slice()), 0x42, n));
        });
        group.bench_with_input(BenchmarkId::new("bridge_abi", size), &size, |b, &n| {
            b.iter(|| unsafe { stb_zig_memset(black_box(dst.as_mut_ptr().cast::<c_void>()), 0x42, n) });
        });
    }
    group.finish();
}

fn bench_strlen(c: &mut Criterion) {
    let mut group = c.benchmark_group("strlen");
    for &size in SIZES {
        let mut s = vec![b'a'; size];
        s.push(0);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("core", size), &s, |b, s| {
            b.iter(|| string_length(black_box(s.as_slice())));
        });
        group.bench_with_input(BenchmarkId::new("bridge_abi", size), &s, |b, s| {
            b.iter(|| unsafe { stb_zig_strlen(black_box(s.as_ptr().cast::<c_char>())) });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_memcpy, bench_memset, bench_strlen);
criterion_main!(benches);

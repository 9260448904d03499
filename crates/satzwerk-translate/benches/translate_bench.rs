// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for request fingerprinting and cache lookups in the
// satzwerk-translate crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use satzwerk_translate::cache::{CacheEntry, MemoryCache, SqliteCache, TranslationCache};
use satzwerk_translate::fingerprint::Fingerprint;

const PARAGRAPH: &str = "The attention mechanism allows the model to focus on \
    relevant parts of the input sequence when producing each output token, \
    which substantially improves translation quality for long sentences.";

fn bench_fingerprint(c: &mut Criterion) {
    c.bench_function("fingerprint_paragraph", |b| {
        b.iter(|| {
            Fingerprint::compute(
                black_box(PARAGRAPH),
                black_box("en"),
                black_box("zh-CN"),
                black_box("google"),
                None,
            )
        })
    });
}

fn bench_cache(c: &mut Criterion) {
    let entries: Vec<CacheEntry> = (0..1000)
        .map(|i| {
            let text = format!("{PARAGRAPH} {i}");
            let fp = Fingerprint::compute(&text, "en", "zh-CN", "google", None);
            CacheEntry::new(fp, text, "译文", "google")
        })
        .collect();

    let sqlite = SqliteCache::open_in_memory().expect("open in-memory cache");
    let memory = MemoryCache::new();
    for entry in &entries {
        sqlite.set(entry).expect("set");
        memory.set(entry).expect("set");
    }

    c.bench_function("sqlite_cache_get_hit", |b| {
        let fp = &entries[500].fingerprint;
        b.iter(|| sqlite.get(black_box(fp)))
    });

    c.bench_function("memory_cache_get_hit", |b| {
        let fp = &entries[500].fingerprint;
        b.iter(|| memory.get(black_box(fp)))
    });

    c.bench_function("sqlite_cache_set", |b| {
        let entry = &entries[0];
        b.iter(|| sqlite.set(black_box(entry)))
    });
}

criterion_group!(benches, bench_fingerprint, bench_cache);
criterion_main!(benches);

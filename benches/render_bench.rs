use criterion::{Criterion, criterion_group, criterion_main};
use pacsview::config::ViewerConfig;
use pacsview::dicom::{self, synthetic::SyntheticSlice, synthetic::phantom_series};
use pacsview::render::{ImageAdjustment, RenderMode, map_to_raster};
use pacsview::study::MemorySource;
use pacsview::viewer::{Session, Viewer};
use std::hint::black_box;
use std::sync::Arc;

const SLICE_SIZE: u16 = 512;
const SERIES_LENGTH: usize = 24;
const CANVAS: u32 = 512;

// ============================================================================
// TIER 1: FULL FRAME BENCHMARKS (Primary Baseline)
// ============================================================================

fn loaded_viewer(layout: &str) -> Viewer {
    let mut source = MemorySource::new("BENCH");
    for (i, bytes) in phantom_series(SLICE_SIZE, SLICE_SIZE, SERIES_LENGTH)
        .unwrap()
        .into_iter()
        .enumerate()
    {
        source.add_file(&format!("slice-{i:03}.dcm"), bytes);
    }

    let mut viewer = Viewer::new(Session::new("bench", "viewer"), ViewerConfig::default());
    viewer.load(Arc::new(source), "BENCH").unwrap();
    viewer.select_layout(layout);
    viewer
}

/// Single viewport stack frame, what a cine tick costs
fn bench_stack_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_frame");
    let viewer = loaded_viewer("1x1");

    group.bench_function("single_512", |b| {
        b.iter(|| black_box(viewer.render_composed(CANVAS, CANVAS)));
    });

    let grid = loaded_viewer("2x2");
    group.bench_function("grid_2x2_512", |b| {
        b.iter(|| black_box(grid.render_composed(CANVAS, CANVAS)));
    });

    group.finish();
}

/// Slab projections and reformats rebuild a slice on every frame
fn bench_special_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("special_modes");

    for mode in [RenderMode::Mip, RenderMode::Mpr, RenderMode::Volume] {
        let mut viewer = loaded_viewer("1x1");
        viewer.set_slice(SERIES_LENGTH / 2);
        assert!(viewer.set_render_mode(mode));

        group.bench_function(mode.name(), |b| {
            b.iter(|| black_box(viewer.render_composed(CANVAS, CANVAS)));
        });
    }

    group.finish();
}

// ============================================================================
// TIER 2: COMPONENT-LEVEL BENCHMARKS (Diagnostic)
// ============================================================================

/// Parse + pixel extraction of one 16-bit slice
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let bytes = SyntheticSlice::gradient(SLICE_SIZE, SLICE_SIZE)
        .to_bytes()
        .unwrap();

    group.bench_function("gradient_512", |b| {
        b.iter(|| dicom::decode(black_box(&bytes)).unwrap());
    });

    group.finish();
}

/// Windowing and resampling into the viewport raster
fn bench_intensity_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("intensity_mapping");
    let slice = dicom::decode(
        &SyntheticSlice::gradient(SLICE_SIZE, SLICE_SIZE)
            .with_window(1024.0, 2048.0)
            .to_bytes()
            .unwrap(),
    )
    .unwrap();
    let adjustment = ImageAdjustment::native_for(Some(&slice));

    group.bench_function("native_window_512", |b| {
        b.iter(|| black_box(map_to_raster(black_box(&slice), &adjustment, CANVAS, CANVAS)));
    });

    let mut inverted = adjustment;
    inverted.set_brightness(20.0);
    inverted.set_contrast(1.5);
    inverted.toggle_invert();
    group.bench_function("adjusted_512", |b| {
        b.iter(|| black_box(map_to_raster(black_box(&slice), &inverted, CANVAS, CANVAS)));
    });

    group.finish();
}

// ============================================================================
// BENCHMARK REGISTRATION
// ============================================================================

criterion_group!(
    benches,
    // Primary baseline (these run by default with `cargo bench`)
    bench_stack_frame,
    bench_special_modes,
    // Diagnostic benchmarks (help identify bottlenecks)
    bench_decode,
    bench_intensity_mapping,
);

criterion_main!(benches);

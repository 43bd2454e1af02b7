use std::hint::black_box;
use std::time::Instant;

use trellis_common::{EntityHandle, Rect, Vec2};
use trellis_stream::{EntityTree, TreeConfig};

/// Deterministic scatter over the default world.
fn positions(count: usize) -> Vec<(EntityHandle, Vec2)> {
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    (0..count)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let x = (state % 32768) as f32;
            let y = ((state >> 32) % 16384) as f32;
            (EntityHandle::new(i as u32, 0), Vec2::new(x, y))
        })
        .collect()
}

fn filled_tree(points: &[(EntityHandle, Vec2)]) -> EntityTree {
    let mut tree = EntityTree::new(TreeConfig::default());
    for (h, p) in points {
        tree.bubble_down(*h, *p);
    }
    tree
}

fn bench_bubble_down(entity_count: usize, iterations: usize) {
    let points = positions(entity_count);

    let start = Instant::now();
    for _ in 0..iterations {
        black_box(filled_tree(black_box(&points)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  bubble_down ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_update_roi(entity_count: usize, iterations: usize) {
    let tree = filled_tree(&positions(entity_count));
    let mut leaves = Vec::new();

    let start = Instant::now();
    for i in 0..iterations {
        // camera panning right over a 640x480 view
        let x = (i * 16 % 32000) as f32;
        let roi = Rect::from_xywh(x, 8000.0, 640.0, 480.0);
        tree.update_roi(black_box(&mut leaves), black_box(roi));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  update_roi ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_refresh(entity_count: usize, iterations: usize) {
    let points = positions(entity_count);
    let mut tree = filled_tree(&points);
    let lookup: std::collections::HashMap<EntityHandle, Vec2> = points.iter().copied().collect();
    let mut leaves = Vec::new();

    let start = Instant::now();
    for i in 0..iterations {
        let roi = Rect::from_xywh((i * 16 % 32000) as f32, 8000.0, 640.0, 480.0);
        for leaf in leaves.clone() {
            tree.bubble_up_leaf(leaf, |h| lookup.get(&h).copied());
        }
        tree.update_roi(&mut leaves, roi);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  refresh ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Entity Tree Benchmarks ===\n");

    println!("Bubble down:");
    bench_bubble_down(100, 1000);
    bench_bubble_down(1000, 100);
    bench_bubble_down(10000, 10);

    println!("\nROI query:");
    bench_update_roi(1000, 10000);
    bench_update_roi(10000, 10000);

    println!("\nRefresh (bubble up ROI leaves + ROI query):");
    bench_refresh(1000, 1000);
    bench_refresh(10000, 1000);

    println!("\n=== Done ===");
}

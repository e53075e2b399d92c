//! End-to-end scenarios: build, query, serialize, cache.

use std::collections::HashSet;

use crate::{Aabb, IndexBuilder, NeighborQuery, SpatialIndex, TickCache};

fn build<const N: usize>(node_size: u16, boxes: [Aabb<f64>; N]) -> SpatialIndex<f64> {
    let mut builder = IndexBuilder::with_node_size(N as u32, node_size).unwrap();
    for b in boxes {
        builder.add(b).unwrap();
    }
    builder.finish().unwrap()
}

/// Three boxes, branching factor two: one box overlapping the window, one
/// far away, one point item inside it.
#[test]
fn test_three_box_scenario() {
    let index = build(
        2,
        [
            Aabb::new(0.0, 0.0, 1.0, 1.0),
            Aabb::new(10.0, 10.0, 11.0, 11.0),
            Aabb::point(5.0, 5.0),
        ],
    );

    let mut hits = index.search(Aabb::new(0.0, 0.0, 6.0, 6.0));
    hits.sort_unstable();
    assert_eq!(hits, vec![0, 2]);

    assert_eq!(
        index.neighbors(&NeighborQuery::new(5.0, 5.0).with_max_results(1)),
        vec![2]
    );
    // (0,0) is inside box 0 (distance zero); the point item at (5,5) is
    // next; order matters.
    assert_eq!(
        index.neighbors(&NeighborQuery::new(0.0, 0.0).with_max_results(2)),
        vec![0, 2]
    );
}

/// A whole-extent search returns every id exactly once, whatever the
/// branching factor.
#[test]
fn test_completeness_across_node_sizes() {
    for node_size in [2, 3, 4, 16, 64] {
        let mut builder = IndexBuilder::with_node_size(100, node_size).unwrap();
        for i in 0..100_u32 {
            let x = f64::from(i % 10) * 3.0;
            let y = f64::from(i / 10) * 3.0;
            builder.add(Aabb::new(x, y, x + 1.0, y + 1.0)).unwrap();
        }
        let index = builder.finish().unwrap();

        let hits = index.search(index.extent());
        assert_eq!(hits.len(), 100, "node_size {node_size} lost items");
        let unique: HashSet<u32> = hits.iter().copied().collect();
        assert_eq!(unique.len(), 100, "node_size {node_size} duplicated items");
    }
}

/// With `num_items <= node_size` no hierarchy is built; both query kinds
/// must still answer from the single level.
#[test]
fn test_single_level_tree() {
    let index = build(
        16,
        [
            Aabb::point(0.0, 0.0),
            Aabb::point(4.0, 0.0),
            Aabb::point(0.0, 4.0),
            Aabb::point(4.0, 4.0),
            Aabb::point(2.0, 2.0),
        ],
    );
    assert_eq!(index.num_levels(), 2);

    let mut hits = index.search(Aabb::new(-1.0, -1.0, 2.5, 2.5));
    hits.sort_unstable();
    assert_eq!(hits, vec![0, 4]);

    assert_eq!(
        index.neighbors(&NeighborQuery::new(3.9, 3.9).with_max_results(2)),
        vec![3, 4]
    );
}

/// The same multiset of boxes added in two different orders answers every
/// query with the same set of boxes, even though the ids renumber.
#[test]
fn test_build_order_independence() {
    let boxes: Vec<Aabb<f64>> = (0..60)
        .map(|i| {
            let x = f64::from(i % 8) * 5.0;
            let y = f64::from(i / 8) * 5.0;
            Aabb::new(x, y, x + 2.0, y + 2.0)
        })
        .collect();
    let mut reversed = boxes.clone();
    reversed.reverse();

    let forward = {
        let mut b = IndexBuilder::with_node_size(60, 4).unwrap();
        for item in &boxes {
            b.add(*item).unwrap();
        }
        b.finish().unwrap()
    };
    let backward = {
        let mut b = IndexBuilder::with_node_size(60, 4).unwrap();
        for item in &reversed {
            b.add(*item).unwrap();
        }
        b.finish().unwrap()
    };

    let corners = |index: &SpatialIndex<f64>, source: &[Aabb<f64>], query: Aabb<f64>| {
        let mut found: Vec<(u64, u64)> = index
            .search(query)
            .into_iter()
            .map(|id| {
                let b = source[id as usize];
                (b.min_x.to_bits(), b.min_y.to_bits())
            })
            .collect();
        found.sort_unstable();
        found
    };

    for query in [
        Aabb::new(0.0, 0.0, 12.0, 12.0),
        Aabb::new(20.0, 10.0, 30.0, 30.0),
        Aabb::point(6.0, 6.0),
        Aabb::new(-10.0, -10.0, 100.0, 100.0),
    ] {
        assert_eq!(
            corners(&forward, &boxes, query),
            corners(&backward, &reversed, query)
        );
    }
}

/// `max_distance` alone returns everything in the radius; adding
/// `max_results` truncates to the closest of them.
#[test]
fn test_neighbor_limits_compose() {
    let mut builder = IndexBuilder::with_node_size(25, 4).unwrap();
    for i in 0..25_u32 {
        let x = f64::from(i % 5) * 2.0;
        let y = f64::from(i / 5) * 2.0;
        builder.add(Aabb::point(x, y)).unwrap();
    }
    let index = builder.finish().unwrap();

    // Radius 2.1 around (4,4): center plus the four axis neighbors.
    let in_radius = index.neighbors(&NeighborQuery::new(4.0, 4.0).with_max_distance(2.1));
    let as_set: HashSet<u32> = in_radius.iter().copied().collect();
    assert_eq!(as_set, HashSet::from([12, 7, 11, 13, 17]));
    assert_eq!(in_radius[0], 12);

    let capped = index.neighbors(
        &NeighborQuery::new(4.0, 4.0)
            .with_max_distance(2.1)
            .with_max_results(3),
    );
    assert_eq!(capped.len(), 3);
    assert_eq!(capped[0], 12);
    assert!(capped.iter().all(|id| as_set.contains(id)));
}

/// A reloaded index answers exactly like the one it was serialized from.
#[test]
fn test_serialized_index_answers_identically() {
    let mut builder = IndexBuilder::with_node_size(50, 8).unwrap();
    for i in 0..50_u32 {
        let x = f64::from(i) * 1.7;
        let y = f64::from(i % 7) * 9.0;
        builder.add(Aabb::new(x, y, x + 3.0, y + 3.0)).unwrap();
    }
    let index = builder.finish().unwrap();
    let loaded = SpatialIndex::<f64>::from_bytes(&index.to_bytes()).unwrap();

    let query = Aabb::new(10.0, 0.0, 40.0, 30.0);
    assert_eq!(index.search(query), loaded.search(query));

    let probe = NeighborQuery::new(33.0, 12.0).with_max_results(9);
    assert_eq!(index.neighbors(&probe), loaded.neighbors(&probe));
}

/// One cache per tick: indexes for several classes coexist, lookups for
/// classes that were never built fail, and clearing ends the tick.
#[test]
fn test_tick_cache_lifecycle() {
    let mut cache: TickCache<f64> = TickCache::new();

    let mut units = IndexBuilder::new(2).unwrap();
    units.add(Aabb::point(0.0, 0.0)).unwrap();
    units.add(Aabb::point(9.0, 9.0)).unwrap();
    cache.insert("units", units.finish().unwrap());

    let mut missiles = IndexBuilder::new(1).unwrap();
    missiles.add(Aabb::point(5.0, 5.0)).unwrap();
    cache.insert("missiles", missiles.finish().unwrap());

    let near_origin = cache
        .get("units")
        .unwrap()
        .neighbors(&NeighborQuery::new(1.0, 1.0).with_max_results(1));
    assert_eq!(near_origin, vec![0]);
    assert!(cache.get("sectors").is_err());

    cache.clear();
    assert!(cache.get("units").is_err());
}

/// The f32 instantiation runs the same pipeline end to end.
#[test]
fn test_f32_end_to_end() {
    let mut builder = IndexBuilder::<f32>::with_node_size(20, 4).unwrap();
    for i in 0..20_u32 {
        let x = i as f32 * 2.5;
        builder.add(Aabb::new(x, 0.0, x + 1.0, 1.0)).unwrap();
    }
    let index = builder.finish().unwrap();

    let mut hits = index.search(Aabb::new(0.0, 0.0, 6.0, 1.0));
    hits.sort_unstable();
    assert_eq!(hits, vec![0, 1, 2]);

    let nearest = index.neighbors(&NeighborQuery::from_vec2(glam::Vec2::new(26.0, 0.5)));
    assert_eq!(nearest[0], 10); // box [25, 26]
    assert_eq!(nearest.len(), 20);
}

/// Plain-data types embed in serde snapshots.
#[test]
fn test_serde_round_trip_of_query_types() {
    let b = Aabb::new(1.0_f64, 2.0, 3.0, 4.0);
    let json = serde_json::to_string(&b).unwrap();
    assert_eq!(serde_json::from_str::<Aabb<f64>>(&json).unwrap(), b);

    let q = NeighborQuery::new(1.5_f32, -2.5).with_max_distance(10.0);
    let json = serde_json::to_string(&q).unwrap();
    let back: NeighborQuery<f32> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.x, q.x);
    assert_eq!(back.max_distance, q.max_distance);
}

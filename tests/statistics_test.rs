//! End-to-end statistics queries over projected item counts.

use geotable::{
    BoundingBox, GeoItemEnricher, GeoTableConfig, ItemChange, MemoryStatsStore, StatisticsConfig,
    StatisticsProjector, StatisticsTable, codec,
};
use serde_json::json;
use std::collections::BTreeMap;

struct Fixture {
    enricher: GeoItemEnricher,
    projector: StatisticsProjector,
    table: StatisticsTable<MemoryStatsStore>,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let table_config = GeoTableConfig::new("id");
    let stats_config = StatisticsConfig::new([3usize, 6]);
    Fixture {
        enricher: GeoItemEnricher::new(table_config.clone()),
        projector: StatisticsProjector::new(&table_config, stats_config.clone()).unwrap(),
        table: StatisticsTable::new(MemoryStatsStore::new(), stats_config).unwrap(),
    }
}

impl Fixture {
    fn track(&self, id: &str, latitude: f64, longitude: f64) {
        let item = json!({
            "id": id,
            "position": { "latitude": latitude, "longitude": longitude },
        });
        let enriched = self
            .enricher
            .enrich_item(item.as_object().unwrap(), false)
            .unwrap();
        self.projector
            .apply(self.table.store(), &ItemChange::Insert { new: enriched })
            .unwrap();
    }

    fn untrack(&self, id: &str, latitude: f64, longitude: f64) {
        let item = json!({
            "id": id,
            "position": { "latitude": latitude, "longitude": longitude },
        });
        let enriched = self
            .enricher
            .enrich_item(item.as_object().unwrap(), false)
            .unwrap();
        self.projector
            .apply(self.table.store(), &ItemChange::Remove { old: enriched })
            .unwrap();
    }
}

#[test]
fn test_empty_table_yields_no_buckets() {
    let fixture = fixture();
    let bbox = BoundingBox {
        south: 48.0,
        west: 10.0,
        north: 49.0,
        east: 11.0,
    };
    assert!(fixture.table.query(&bbox).unwrap().is_empty());
}

#[test]
fn test_small_box_yields_fine_bucket() {
    let fixture = fixture();
    fixture.track("a", 48.1, 10.1);

    let bbox = BoundingBox {
        south: 48.099,
        west: 10.099,
        north: 48.101,
        east: 10.101,
    };
    let buckets = fixture.table.query(&bbox).unwrap();
    assert_eq!(buckets.len(), 1);

    let bucket = &buckets[0];
    assert_eq!(bucket.geohash, "u0x1tu");
    assert_eq!(bucket.item_count, 1);
    assert_eq!(bucket.center.latitude, 48.10089111328125);
    assert_eq!(bucket.center.longitude, 10.1019287109375);
    assert_eq!(bucket.boundaries.north, 48.1036376953125);
    assert_eq!(bucket.boundaries.south, 48.09814453125);
    assert_eq!(bucket.boundaries.west, 10.096435546875);
    assert_eq!(bucket.boundaries.east, 10.107421875);
}

#[test]
fn test_large_box_falls_back_to_coarse_step() {
    let fixture = fixture();
    fixture.track("a", 48.1, 10.1);

    let bbox = BoundingBox {
        south: 46.0,
        west: 8.0,
        north: 50.0,
        east: 14.0,
    };
    let buckets = fixture.table.query(&bbox).unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].geohash, "u0x");
    assert_eq!(buckets[0].item_count, 1);
}

#[test]
fn test_bucket_counts_match_item_distribution() {
    let fixture = fixture();
    let mut expected: BTreeMap<String, u64> = BTreeMap::new();
    for i in 0..10 {
        for j in 0..10 {
            let lat = 48.0 + 0.01 * i as f64;
            let lon = 10.0 + 0.01 * j as f64;
            fixture.track(&format!("item-{i}-{j}"), lat, lon);
            *expected.entry(codec::encode(lat, lon, 6).unwrap()).or_insert(0) += 1;
        }
    }

    let bbox = BoundingBox {
        south: 47.99,
        west: 9.99,
        north: 48.11,
        east: 10.11,
    };
    let buckets = fixture.table.query(&bbox).unwrap();

    let observed: BTreeMap<String, u64> = buckets
        .iter()
        .map(|bucket| (bucket.geohash.clone(), bucket.item_count))
        .collect();
    assert_eq!(observed, expected);
    assert_eq!(
        buckets.iter().map(|b| b.item_count).sum::<u64>(),
        100
    );
}

#[test]
fn test_removed_items_drop_out_of_buckets() {
    let fixture = fixture();
    fixture.track("a", 48.1, 10.1);
    fixture.track("b", 48.1, 10.1);
    fixture.untrack("a", 48.1, 10.1);

    let bbox = BoundingBox {
        south: 48.099,
        west: 10.099,
        north: 48.101,
        east: 10.101,
    };
    let buckets = fixture.table.query(&bbox).unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].item_count, 1);

    fixture.untrack("b", 48.1, 10.1);
    assert!(fixture.table.query(&bbox).unwrap().is_empty());
    assert!(fixture.table.store().is_empty());
}

//! Criterion benchmarks for the data definition hot paths.
//!
//! Materializing a reply into a struct and extracting values for a set call
//! run once per received or sent data packet, so they dominate the runtime
//! cost of a busy client.
//!
//! Run with:
//! ```bash
//! cargo bench --package simconnect-core --bench definition_bench
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simconnect_core::channel::mock::RecordingChannel;
use simconnect_core::definition::DefinitionRegistry;
use simconnect_core::protocol::LatLonAlt;
use simconnect_core::{
    DataShape, DataType, Direction, FieldDescriptor, ObjectData, SchemaBuilder, Value,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Position {
    title: String,
    on_ground: bool,
    heading: f64,
    airspeed: f32,
    location: LatLonAlt,
}

impl DataShape for Position {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .value(
                "title",
                FieldDescriptor::new("TITLE").data_type(DataType::String256),
                |p| &p.title,
                |p| &mut p.title,
            )
            .value(
                "on_ground",
                FieldDescriptor::new("SIM ON GROUND")
                    .units("bool")
                    .data_type(DataType::Int32),
                |p| &p.on_ground,
                |p| &mut p.on_ground,
            )
            .value(
                "heading",
                FieldDescriptor::new("PLANE HEADING DEGREES TRUE").units("degrees"),
                |p| &p.heading,
                |p| &mut p.heading,
            )
            .value(
                "airspeed",
                FieldDescriptor::new("AIRSPEED INDICATED")
                    .units("knots")
                    .data_type(DataType::Float32),
                |p| &p.airspeed,
                |p| &mut p.airspeed,
            )
            .value(
                "location",
                FieldDescriptor::new("STRUCT LATLONALT").data_type(DataType::LatLonAlt),
                |p| &p.location,
                |p| &mut p.location,
            );
    }
}

fn make_reply() -> ObjectData {
    ObjectData {
        request_id: 1,
        define_id: 1,
        values: vec![
            Value::String("Cessna Skyhawk".into()),
            Value::Int32(0),
            Value::Float64(274.5),
            Value::Float32(112.0),
            Value::LatLonAlt(LatLonAlt {
                latitude: 52.3086,
                longitude: 4.7639,
                altitude: 3000.0,
            }),
        ],
        ..ObjectData::default()
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_materialize(c: &mut Criterion) {
    let registry = DefinitionRegistry::new(Arc::new(RecordingChannel::new()));
    let def = registry
        .define::<Position>(Direction::Get)
        .expect("define must succeed");
    let reply = make_reply();

    c.bench_function("materialize_position", |b| {
        b.iter(|| def.materialize(black_box(&reply)).expect("materialize"))
    });
}

fn bench_extract(c: &mut Criterion) {
    let registry = DefinitionRegistry::new(Arc::new(RecordingChannel::new()));
    let def = registry
        .define::<Position>(Direction::Set)
        .expect("define must succeed");
    let position = Position {
        title: "Cessna Skyhawk".into(),
        heading: 90.0,
        airspeed: 95.0,
        ..Position::default()
    };

    c.bench_function("extract_position", |b| {
        b.iter(|| def.extract(black_box(&position)).expect("extract"))
    });
}

fn bench_cached_define(c: &mut Criterion) {
    let registry = DefinitionRegistry::new(Arc::new(RecordingChannel::new()));
    registry
        .define::<Position>(Direction::Get)
        .expect("define must succeed");

    c.bench_function("define_cached", |b| {
        b.iter(|| registry.define::<Position>(black_box(Direction::Get)).expect("define"))
    });
}

criterion_group!(benches, bench_materialize, bench_extract, bench_cached_define);
criterion_main!(benches);

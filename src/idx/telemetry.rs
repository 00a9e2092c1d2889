//! Metric index telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct IndexInstruments {
    ops: Counter<u64>,
    bad_data: Counter<u64>,
    corruptions: Counter<u64>,
    op_duration_seconds: Histogram<f64>,
}

fn instruments() -> &'static IndexInstruments {
    static INSTRUMENTS: OnceLock<IndexInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("chunkvault.idx");
        IndexInstruments {
            ops: meter
                .u64_counter("chunkvault.idx.ops")
                .with_description("Index operations by kind and outcome")
                .init(),
            bad_data: meter
                .u64_counter("chunkvault.idx.bad_data")
                .with_description("Inserts rejected because a path was both branch and leaf")
                .init(),
            corruptions: meter
                .u64_counter("chunkvault.idx.corruptions")
                .with_description("Inconsistent parent/child links found during delete")
                .init(),
            op_duration_seconds: meter
                .f64_histogram("chunkvault.idx.op_duration")
                .with_description("Index operation duration")
                .with_unit("s")
                .init(),
        }
    })
}

pub(crate) fn record_op(op: &'static str, ok: bool, duration_seconds: f64) {
    let i = instruments();
    i.ops.add(
        1,
        &[
            KeyValue::new("op", op),
            KeyValue::new("outcome", if ok { "ok" } else { "fail" }),
        ],
    );
    i.op_duration_seconds
        .record(duration_seconds, &[KeyValue::new("op", op)]);
}

pub(crate) fn record_bad_data() {
    instruments().bad_data.add(1, &[]);
}

pub(crate) fn record_corruption() {
    instruments().corruptions.add(1, &[]);
}

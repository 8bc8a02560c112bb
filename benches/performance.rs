//! Performance benchmarks for the measurement pipeline
//!
//! Probe runs take seconds, so these only guard against the per-measurement
//! bookkeeping (report parsing, record formatting, endpoint parsing) becoming
//! noticeable.

use cloud_bandwidth::{
    models::{Credentials, Direction, Endpoint, Measurement, ProbeToolKind, ResolvedConfig, SinkConfig},
    parser,
    registry::EndpointRegistry,
    sink::record,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn iperf_report(streams: usize) -> String {
    let mut report = String::from(
        "Connecting to host 10.0.0.1, port 5201\n[ ID] Interval           Transfer     Bitrate         Retr\n",
    );
    for id in 0..streams {
        report.push_str(&format!(
            "[{:>3}]   0.00-5.00   sec  55.1 MBytes  92456 Kbits/sec    0             sender\n\
             [{:>3}]   0.00-5.04   sec  54.8 MBytes  91234 Kbits/sec                  receiver\n",
            id + 5,
            id + 5
        ));
    }
    if streams > 1 {
        report.push_str(
            "[SUM]   0.00-5.00   sec   441 MBytes  739648 Kbits/sec    0             sender\n\
             [SUM]   0.00-5.04   sec   438 MBytes  729872 Kbits/sec                  receiver\n",
        );
    }
    report.push_str("\niperf Done.\n");
    report
}

const NETPERF_REPORT: &str = "131072  16384  16384    5.00     9413.54\n";

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    for streams in [1usize, 8, 32] {
        let report = iperf_report(streams);
        group.bench_with_input(BenchmarkId::new("iperf3", streams), &report, |b, report| {
            b.iter(|| parser::bits_per_second(black_box(report), ProbeToolKind::Iperf3))
        });
    }

    group.bench_function("netperf", |b| {
        b.iter(|| parser::bits_per_second(black_box(NETPERF_REPORT), ProbeToolKind::Netperf))
    });

    group.bench_function("failure_marker", |b| {
        let output = "iperf3: error - unable to connect to server: Connection refused";
        b.iter(|| parser::parse(black_box(output), ProbeToolKind::Iperf3))
    });

    group.finish();
}

fn bench_record_builder(c: &mut Criterion) {
    let endpoint = Endpoint::new("10.0.0.1", Some("east".to_string()));
    let measurement = Measurement::new(&endpoint, Direction::Download, 91_234_000, 1_700_000_000);

    let graphite = ResolvedConfig::default();
    let influx = ResolvedConfig {
        sink: SinkConfig::Influx {
            url: "https://influx.example.com/write".to_string(),
            credentials: Credentials::default(),
        },
        hostname: "probe-01".to_string(),
        ..Default::default()
    };

    c.bench_function("record_graphite", |b| {
        b.iter(|| record::build(black_box(&measurement), ProbeToolKind::Iperf3, &graphite))
    });
    c.bench_function("record_influx", |b| {
        b.iter(|| record::build(black_box(&measurement), ProbeToolKind::Iperf3, &influx))
    });
}

fn bench_endpoint_parsing(c: &mut Criterion) {
    let list: Vec<String> = (0..100).map(|i| format!("10.0.{}.{}:site-{}", i / 250, i % 250, i)).collect();
    let list = list.join(",");

    c.bench_function("parse_endpoint_list_100", |b| {
        b.iter(|| EndpointRegistry::parse_list(black_box(&list)))
    });
}

criterion_group!(benches, bench_parser, bench_record_builder, bench_endpoint_parsing);
criterion_main!(benches);

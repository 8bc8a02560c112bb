//! Metric record formatting for both sink protocols

use crate::models::{Measurement, ProbeToolKind, ResolvedConfig, SinkConfig, SinkPayload};

/// Influx field carrying the throughput value.
///
/// iperf3 results use `iperfResultsBps` for both directions while netperf's
/// download-only results use `iperfDownloadResultsBps`. Existing dashboards
/// query these names, so they are kept as they are.
pub fn influx_field(tool: ProbeToolKind) -> &'static str {
    match tool {
        ProbeToolKind::Iperf3 => "iperfResultsBps",
        ProbeToolKind::Netperf => "iperfDownloadResultsBps",
    }
}

/// Carbon plaintext line: `<prefix>.<label> <value> <timestamp>\n`
pub fn graphite_line(prefix: &str, label: &str, bits_per_second: i64, observed_at_unix_seconds: i64) -> String {
    format!("{}.{} {} {}\n", prefix, label, bits_per_second, observed_at_unix_seconds)
}

/// Influx line without timestamp; the backend assigns ingest time
pub fn influx_line(
    measurement_name: &str,
    test_type: &str,
    destination: &str,
    source: &str,
    field: &str,
    bits_per_second: i64,
) -> String {
    format!(
        "{},testType={},iperfDestination={},iperfSource={} {}={}",
        measurement_name, test_type, destination, source, field, bits_per_second
    )
}

/// Format a measurement for the configured sink
pub fn build(measurement: &Measurement, tool: ProbeToolKind, config: &ResolvedConfig) -> SinkPayload {
    let prefix = config.prefix_for(measurement.direction);
    match &config.sink {
        SinkConfig::Graphite { address } => SinkPayload {
            target: address.clone(),
            body: graphite_line(
                prefix,
                &measurement.endpoint_label,
                measurement.bits_per_second,
                measurement.observed_at_unix_seconds,
            ),
        },
        SinkConfig::Influx { url, .. } => SinkPayload {
            target: url.clone(),
            body: influx_line(
                &config.measurement_name,
                prefix,
                &measurement.endpoint_label,
                &config.hostname,
                influx_field(tool),
                measurement.bits_per_second,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credentials, Direction, Endpoint};

    fn measurement(direction: Direction) -> Measurement {
        Measurement::new(&Endpoint::new("10.0.0.5", Some("host1".to_string())), direction, 12_345_000, 1_700_000_000)
    }

    fn influx_config() -> ResolvedConfig {
        ResolvedConfig {
            sink: SinkConfig::Influx {
                url: "http://influx.example.com/write".to_string(),
                credentials: Credentials::default(),
            },
            measurement_name: "bandwidth".to_string(),
            hostname: "probe-01".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_graphite_download_record() {
        let config = ResolvedConfig {
            sink: SinkConfig::Graphite { address: "carbon:2003".to_string() },
            ..Default::default()
        };
        let payload = build(&measurement(Direction::Download), ProbeToolKind::Iperf3, &config);
        assert_eq!(payload.target, "carbon:2003");
        assert_eq!(payload.body, "bandwidth.download.host1 12345000 1700000000\n");
    }

    #[test]
    fn test_graphite_upload_uses_upload_prefix() {
        let config = ResolvedConfig {
            upload_prefix: "bw.up".to_string(),
            ..Default::default()
        };
        let payload = build(&measurement(Direction::Upload), ProbeToolKind::Iperf3, &config);
        assert_eq!(payload.body, "bw.up.host1 12345000 1700000000\n");
    }

    #[test]
    fn test_influx_iperf_record() {
        let payload = build(&measurement(Direction::Upload), ProbeToolKind::Iperf3, &influx_config());
        assert_eq!(payload.target, "http://influx.example.com/write");
        assert_eq!(
            payload.body,
            "bandwidth,testType=bandwidth.upload,iperfDestination=host1,iperfSource=probe-01 iperfResultsBps=12345000"
        );
    }

    #[test]
    fn test_influx_netperf_record_uses_download_field() {
        let payload = build(&measurement(Direction::Download), ProbeToolKind::Netperf, &influx_config());
        assert_eq!(
            payload.body,
            "bandwidth,testType=bandwidth.download,iperfDestination=host1,iperfSource=probe-01 iperfDownloadResultsBps=12345000"
        );
    }
}

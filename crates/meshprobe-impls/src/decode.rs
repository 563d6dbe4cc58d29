//! Response decoders, one per [`ProtocolVersion`].

use meshprobe_core::{Channel, DecodeError, Measurement, Node, ProtocolVersion, ResponseDecoder};

/// The decoder for a configured protocol version.
#[derive(Debug, Clone, Copy)]
pub enum Decoder {
    /// See [`JsonDecoder`].
    Json(JsonDecoder),
    /// See [`CsvDecoder`].
    Csv(CsvDecoder),
}

impl Decoder {
    /// Selects the decoder for `version`.
    pub fn for_version(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::Json => Decoder::Json(JsonDecoder),
            ProtocolVersion::Csv => Decoder::Csv(CsvDecoder),
        }
    }
}

impl ResponseDecoder for Decoder {
    fn decode(&self, body: &[u8]) -> Result<Measurement, DecodeError> {
        match self {
            Decoder::Json(d) => d.decode(body),
            Decoder::Csv(d) => d.decode(body),
        }
    }
}

/// Decodes a JSON object with `source`, `destination`, `wireless_channel`, `rate_mbps` (or
/// `throughput`) and an optional `timestamp`, which may be a string or a number. When both rate
/// fields are present, `rate_mbps` wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

#[derive(Debug, serde::Deserialize)]
struct JsonMeasurement {
    source: Node,
    destination: Node,
    wireless_channel: Channel,
    #[serde(default)]
    rate_mbps: Option<f64>,
    #[serde(default)]
    throughput: Option<f64>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
}

impl ResponseDecoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Measurement, DecodeError> {
        let m: JsonMeasurement = serde_json::from_slice(body)?;
        let throughput = m
            .rate_mbps
            .or(m.throughput)
            .ok_or(DecodeError::MissingColumn("rate_mbps"))?;
        let timestamp = match m.timestamp {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(n @ serde_json::Value::Number(_)) => Some(n.to_string()),
            Some(other) => {
                return Err(DecodeError::InvalidField {
                    field: "timestamp",
                    value: other.to_string(),
                })
            }
        };
        Ok(Measurement {
            source: m.source,
            destination: m.destination,
            wireless_channel: m.wireless_channel,
            throughput,
            timestamp,
        })
    }
}

/// Decodes a CSV table with a header row and exactly one data row. Columns are located by name:
/// `source`, `destination`, `wireless_channel`, `throughput` (or `rate_mbps`) and an optional
/// `timestamp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl ResponseDecoder for CsvDecoder {
    fn decode(&self, body: &[u8]) -> Result<Measurement, DecodeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(body);
        let headers = reader.headers()?.clone();
        let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h));
        let required = |name: &'static str, aliases: &[&str]| {
            column(aliases).ok_or(DecodeError::MissingColumn(name))
        };
        let source = required("source", &["source"])?;
        let destination = required("destination", &["destination"])?;
        let channel = required("wireless_channel", &["wireless_channel"])?;
        let throughput = required("throughput", &["throughput", "rate_mbps"])?;
        let timestamp = column(&["timestamp"]);

        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        let record = match &records[..] {
            [record] => record,
            _ => {
                return Err(DecodeError::WrongNrRows {
                    expected: 1,
                    got: records.len(),
                })
            }
        };
        // Short rows are rejected by the reader, so every located column exists
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        Ok(Measurement {
            source: parse("source", field(source))?,
            destination: parse("destination", field(destination))?,
            wireless_channel: parse("wireless_channel", field(channel))?,
            throughput: parse("throughput", field(throughput))?,
            timestamp: timestamp
                .map(field)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
        })
    }
}

fn parse<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> Node {
        s.parse().unwrap()
    }

    #[test]
    fn json_decodes_rate_mbps() -> anyhow::Result<()> {
        let body = br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":6,
                        "rate_mbps":54.5,"timestamp":"2024-05-01T12:00:00Z","path":["1.1.1.1"]}"#;
        let m = JsonDecoder.decode(body)?;
        assert_eq!(
            m,
            Measurement {
                source: node("10.0.0.1"),
                destination: node("10.0.0.2"),
                wireless_channel: Channel::new(6),
                throughput: 54.5,
                timestamp: Some("2024-05-01T12:00:00Z".into()),
            }
        );
        Ok(())
    }

    #[test]
    fn json_accepts_throughput_and_numeric_timestamp() -> anyhow::Result<()> {
        let body = br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":11,
                        "throughput":12,"timestamp":1714564800}"#;
        let m = JsonDecoder.decode(body)?;
        assert_eq!(m.throughput, 12.0);
        assert_eq!(m.timestamp.as_deref(), Some("1714564800"));
        Ok(())
    }

    #[test]
    fn json_with_both_rate_fields_prefers_rate_mbps() -> anyhow::Result<()> {
        let body = br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":6,
                        "rate_mbps":5.0,"throughput":4.0}"#;
        assert_eq!(JsonDecoder.decode(body)?.throughput, 5.0);
        Ok(())
    }

    #[test]
    fn json_without_rate_fails() {
        let body = br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":6}"#;
        assert!(matches!(
            JsonDecoder.decode(body),
            Err(DecodeError::MissingColumn("rate_mbps"))
        ));
    }

    #[test]
    fn json_without_timestamp() -> anyhow::Result<()> {
        let body = br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":1,
                        "rate_mbps":1.0}"#;
        assert_eq!(JsonDecoder.decode(body)?.timestamp, None);
        Ok(())
    }

    #[test]
    fn json_rejects_bad_bodies() {
        let bodies: [&[u8]; 4] = [
            b"not json",
            br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":1}"#,
            br#"{"source":"nope","destination":"10.0.0.2","wireless_channel":1,"rate_mbps":1}"#,
            br#"{"source":"10.0.0.1","destination":"10.0.0.2","wireless_channel":1,
                 "rate_mbps":1,"timestamp":[1]}"#,
        ];
        for body in bodies {
            assert!(JsonDecoder.decode(body).is_err());
        }
    }

    #[test]
    fn csv_decodes_by_column_name() -> anyhow::Result<()> {
        let body = b"throughput, source, destination, wireless_channel\n\
                     33.3, 10.0.0.1, 10.0.0.2, 149\n";
        let m = CsvDecoder.decode(body)?;
        assert_eq!(m.source, node("10.0.0.1"));
        assert_eq!(m.destination, node("10.0.0.2"));
        assert_eq!(m.wireless_channel, Channel::new(149));
        assert_eq!(m.throughput, 33.3);
        assert_eq!(m.timestamp, None);
        Ok(())
    }

    #[test]
    fn csv_rejects_missing_columns_and_extra_rows() {
        let missing = b"source,destination,throughput\n10.0.0.1,10.0.0.2,1\n";
        assert!(matches!(
            CsvDecoder.decode(missing),
            Err(DecodeError::MissingColumn("wireless_channel"))
        ));
        let two_rows = b"source,destination,wireless_channel,throughput\n\
                         10.0.0.1,10.0.0.2,1,1\n10.0.0.1,10.0.0.2,6,1\n";
        assert!(matches!(
            CsvDecoder.decode(two_rows),
            Err(DecodeError::WrongNrRows { expected: 1, got: 2 })
        ));
        let bad_value = b"source,destination,wireless_channel,throughput\n10.0.0.1,10.0.0.2,x,1\n";
        assert!(matches!(
            CsvDecoder.decode(bad_value),
            Err(DecodeError::InvalidField {
                field: "wireless_channel",
                ..
            })
        ));
    }

    #[test]
    fn decoder_follows_protocol_version() -> anyhow::Result<()> {
        let csv = b"source,destination,wireless_channel,throughput\n10.0.0.1,10.0.0.2,1,2.5\n";
        assert!(Decoder::for_version(ProtocolVersion::Csv).decode(csv).is_ok());
        assert!(Decoder::for_version(ProtocolVersion::Json).decode(csv).is_err());
        Ok(())
    }
}

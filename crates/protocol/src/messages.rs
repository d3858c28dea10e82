use serde::{Deserialize, Serialize};

use crate::LINE_TERMINATOR;
use crate::error::ProtocolError;
use crate::telemetry::{Sample, WindowStats};

/// Encoding used for raw sample lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// `Temperatura: 25.50 °C, Humedad: 57.00 %`
    #[default]
    Human,
    /// `DATA 25.50 57.00`
    Data,
    /// One JSON object per line.
    Json,
}

/// Encodes a sample as a single terminated line.
pub fn encode_sample(sample: &Sample, format: PayloadFormat) -> Result<Vec<u8>, ProtocolError> {
    if !sample.temperature.is_finite() {
        return Err(ProtocolError::NonFinite("temperature"));
    }
    if !sample.humidity.is_finite() {
        return Err(ProtocolError::NonFinite("humidity"));
    }

    let mut line = match format {
        PayloadFormat::Human => format!(
            "Temperatura: {:.2} °C, Humedad: {:.2} %",
            sample.temperature, sample.humidity
        )
        .into_bytes(),
        PayloadFormat::Data => {
            format!("DATA {:.2} {:.2}", sample.temperature, sample.humidity).into_bytes()
        }
        PayloadFormat::Json => serde_json::to_vec(sample)?,
    };
    line.push(LINE_TERMINATOR);
    Ok(line)
}

/// Encodes window statistics as a terminated `STATS` line.
///
/// Field order: temperature avg/max/min, then humidity avg/max/min.
pub fn encode_stats(stats: &WindowStats) -> Vec<u8> {
    let mut line = format!(
        "STATS {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
        stats.temp_avg, stats.temp_max, stats.temp_min, stats.hum_avg, stats.hum_max, stats.hum_min
    )
    .into_bytes();
    line.push(LINE_TERMINATOR);
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample::now(25.5, 57.0)
    }

    #[test]
    fn human_line() {
        let line = encode_sample(&sample(), PayloadFormat::Human).unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "Temperatura: 25.50 °C, Humedad: 57.00 %\n"
        );
    }

    #[test]
    fn data_line() {
        let line = encode_sample(&sample(), PayloadFormat::Data).unwrap();
        assert_eq!(line, b"DATA 25.50 57.00\n");
    }

    #[test]
    fn json_line_is_single_line() {
        let line = encode_sample(&sample(), PayloadFormat::Json).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let body = &line[..line.len() - 1];
        assert!(!body.contains(&b'\n'));

        let parsed: Sample = serde_json::from_slice(body).unwrap();
        assert_eq!(parsed.temperature, 25.5);
        assert_eq!(parsed.humidity, 57.0);
    }

    #[test]
    fn negative_values_keep_two_decimals() {
        let line = encode_sample(&Sample::now(-3.5, 0.0), PayloadFormat::Data).unwrap();
        assert_eq!(line, b"DATA -3.50 0.00\n");
    }

    #[test]
    fn non_finite_rejected() {
        let err = encode_sample(&Sample::now(f32::NAN, 57.0), PayloadFormat::Human).unwrap_err();
        assert!(matches!(err, ProtocolError::NonFinite("temperature")));

        let err = encode_sample(&Sample::now(25.0, f32::INFINITY), PayloadFormat::Json).unwrap_err();
        assert!(matches!(err, ProtocolError::NonFinite("humidity")));
    }

    #[test]
    fn stats_line() {
        let stats = WindowStats {
            temp_avg: 22.0,
            temp_max: 24.0,
            temp_min: 20.0,
            hum_avg: 50.0,
            hum_max: 60.0,
            hum_min: 40.0,
            count: 3,
        };
        assert_eq!(
            encode_stats(&stats),
            b"STATS 22.00 24.00 20.00 50.00 60.00 40.00\n"
        );
    }

    #[test]
    fn format_names() {
        assert_eq!(
            serde_json::to_string(&PayloadFormat::Human).unwrap(),
            "\"human\""
        );
        let f: PayloadFormat = serde_json::from_str("\"data\"").unwrap();
        assert_eq!(f, PayloadFormat::Data);
        assert_eq!(PayloadFormat::default(), PayloadFormat::Human);
    }
}

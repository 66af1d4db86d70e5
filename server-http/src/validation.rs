use crate::provider::TempoDataRequest;
use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

#[derive(Debug, PartialEq)]
pub enum ValidationError {
    InvalidTimestamp {
        field: &'static str,
        value: String,
    },
    EmptyWindow,
    InvalidBoundingBox {
        reason: &'static str,
    },
    EmptyVariable,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidTimestamp { field, value } => {
                write!(f, "Invalid {}: '{}' is not an ISO 8601 timestamp", field, value)
            }
            ValidationError::EmptyWindow => write!(f, "start_time must be before end_time"),
            ValidationError::InvalidBoundingBox { reason } => {
                write!(f, "Invalid bbox: {}", reason)
            }
            ValidationError::EmptyVariable => write!(f, "Variable names cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse an ISO 8601 timestamp. Offsets are honoured; naive times are UTC.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

/// Check a TEMPO request before it is fingerprinted or sent anywhere.
pub fn validate_tempo_request(request: &TempoDataRequest) -> Result<(), ValidationError> {
    let start = parse_timestamp("start_time", &request.start_time)?;
    let end = parse_timestamp("end_time", &request.end_time)?;

    if start >= end {
        return Err(ValidationError::EmptyWindow);
    }

    if let Some(bbox) = &request.bbox {
        validate_bbox(bbox)?;
    }

    if let Some(variables) = &request.variables {
        if variables.iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::EmptyVariable);
        }
    }

    Ok(())
}

fn validate_bbox(bbox: &[f64]) -> Result<(), ValidationError> {
    let [west, south, east, north] = bbox else {
        return Err(ValidationError::InvalidBoundingBox {
            reason: "expected [west, south, east, north]",
        });
    };

    if !bbox.iter().all(|c| c.is_finite()) {
        return Err(ValidationError::InvalidBoundingBox {
            reason: "coordinates must be finite",
        });
    }

    if !(-180.0..=180.0).contains(west) || !(-180.0..=180.0).contains(east) {
        return Err(ValidationError::InvalidBoundingBox {
            reason: "longitude must be within [-180, 180]",
        });
    }

    if !(-90.0..=90.0).contains(south) || !(-90.0..=90.0).contains(north) {
        return Err(ValidationError::InvalidBoundingBox {
            reason: "latitude must be within [-90, 90]",
        });
    }

    // West may exceed east for boxes crossing the antimeridian.
    if south > north {
        return Err(ValidationError::InvalidBoundingBox {
            reason: "south must not exceed north",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: &str, end: &str) -> TempoDataRequest {
        TempoDataRequest {
            start_time: start.to_string(),
            end_time: end.to_string(),
            bbox: None,
            variables: None,
        }
    }

    #[test]
    fn test_accepts_rfc3339_and_naive_times() {
        assert!(validate_tempo_request(&request("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")).is_ok());
        assert!(
            validate_tempo_request(&request("2024-01-01T00:00:00", "2024-01-01T06:30:00.250")).is_ok()
        );
        assert!(
            validate_tempo_request(&request("2024-01-01T02:00:00+02:00", "2024-01-01T01:00:00Z"))
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_unparseable_time() {
        let err = validate_tempo_request(&request("yesterday", "2024-01-02T00:00:00Z")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidTimestamp {
                field: "start_time",
                value: "yesterday".into()
            }
        );
    }

    #[test]
    fn test_rejects_empty_or_inverted_window() {
        let same = request("2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z");
        assert_eq!(validate_tempo_request(&same), Err(ValidationError::EmptyWindow));

        let inverted = request("2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z");
        assert_eq!(validate_tempo_request(&inverted), Err(ValidationError::EmptyWindow));
    }

    #[test]
    fn test_bbox_rules() {
        let mut req = request("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");

        req.bbox = Some(vec![-125.0, 24.0, -66.0, 50.0]);
        assert!(validate_tempo_request(&req).is_ok());

        // Antimeridian crossing
        req.bbox = Some(vec![170.0, -10.0, -170.0, 10.0]);
        assert!(validate_tempo_request(&req).is_ok());

        req.bbox = Some(vec![-125.0, 24.0, -66.0]);
        assert!(matches!(
            validate_tempo_request(&req),
            Err(ValidationError::InvalidBoundingBox { .. })
        ));

        req.bbox = Some(vec![-125.0, 60.0, -66.0, 50.0]);
        assert!(validate_tempo_request(&req).is_err());

        req.bbox = Some(vec![-190.0, 24.0, -66.0, 50.0]);
        assert!(validate_tempo_request(&req).is_err());
    }

    #[test]
    fn test_rejects_blank_variable() {
        let mut req = request("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");
        req.variables = Some(vec!["no2".into(), " ".into()]);
        assert_eq!(validate_tempo_request(&req), Err(ValidationError::EmptyVariable));
    }
}

//! Encoded polyline codec (signed deltas in 5-bit groups, offset by 63).
//!
//! Decoding is deliberately forgiving: some upstream responses arrive
//! truncated, so a stream that ends mid-group yields the points decoded so far
//! and out-of-range points are dropped rather than failing the whole geometry.

use crate::models::Coordinate;

/// Precision used by the standard polyline format (1e-5 degrees).
pub const DEFAULT_PRECISION: u32 = 5;

/// Largest shift that still fits a 64-bit accumulator.
const MAX_SHIFT: u32 = 60;

pub fn decode_polyline(encoded: &str, precision: u32) -> Vec<Coordinate> {
    let factor = 10f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat = 0i64;
    let mut lon = 0i64;
    let mut points = Vec::new();
    let mut dropped = 0usize;

    while index < bytes.len() {
        let Some(dlat) = next_value(bytes, &mut index) else {
            break;
        };
        let Some(dlon) = next_value(bytes, &mut index) else {
            break;
        };
        lat = lat.saturating_add(dlat);
        lon = lon.saturating_add(dlon);

        let point = Coordinate {
            latitude: lat as f64 / factor,
            longitude: lon as f64 / factor,
        };
        if point.is_valid() {
            points.push(point);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} out-of-range polyline points", dropped);
    }
    if index < bytes.len() {
        tracing::debug!(
            "Polyline stream ended early at byte {} of {}",
            index,
            bytes.len()
        );
    }

    points
}

pub fn encode_polyline(points: &[Coordinate], precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;
    for point in points {
        let lat = (point.latitude * factor).round() as i64;
        let lon = (point.longitude * factor).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

/// Read one zig-zag encoded value; `None` when the stream ends mid-group or
/// hits a byte outside the polyline alphabet.
fn next_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*index)?;
        *index += 1;
        let chunk = i64::from(byte) - 63;
        if !(0..64).contains(&chunk) || shift > MAX_SHIFT {
            return None;
        }
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Some(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

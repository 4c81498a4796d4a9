//! Turn-level guidance text derived from route geometry.
//!
//! One threshold table is used everywhere, for geometry-derived turns and for
//! maneuvers reported by a remote service alike:
//!
//! | bearing change | instruction          |
//! |----------------|----------------------|
//! | < 20°          | continue straight    |
//! | < 45°          | bear slightly        |
//! | < 120°         | turn                 |
//! | < 160°         | turn sharp           |
//! | otherwise      | make a U-turn        |

use crate::models::{Coordinate, Maneuver, Route};
use crate::spatial::{distance_m, path_length_m};
use crate::validator::turn_angle;
use serde::{Deserialize, Serialize};

/// Within this distance of the destination the route is complete.
pub const ARRIVAL_RADIUS_M: f64 = 20.0;

const SLIGHT_TURN_DEG: f64 = 20.0;
const TURN_DEG: f64 = 45.0;
const SHARP_TURN_DEG: f64 = 120.0;
const U_TURN_DEG: f64 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Straight,
    SlightLeft,
    SlightRight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
}

impl TurnDirection {
    /// Classify a signed bearing change (positive = clockwise = right).
    pub fn from_angle(delta_deg: f64) -> Self {
        let magnitude = delta_deg.abs();
        let right = delta_deg > 0.0;
        if magnitude < SLIGHT_TURN_DEG {
            TurnDirection::Straight
        } else if magnitude < TURN_DEG {
            if right {
                TurnDirection::SlightRight
            } else {
                TurnDirection::SlightLeft
            }
        } else if magnitude < SHARP_TURN_DEG {
            if right {
                TurnDirection::Right
            } else {
                TurnDirection::Left
            }
        } else if magnitude < U_TURN_DEG {
            if right {
                TurnDirection::SharpRight
            } else {
                TurnDirection::SharpLeft
            }
        } else {
            TurnDirection::UTurn
        }
    }

    /// Parse a maneuver modifier as used by OSRM-style services.
    pub fn from_modifier(modifier: &str) -> Option<Self> {
        let direction = match modifier.trim().to_ascii_lowercase().as_str() {
            "straight" => TurnDirection::Straight,
            "slight left" => TurnDirection::SlightLeft,
            "slight right" => TurnDirection::SlightRight,
            "left" => TurnDirection::Left,
            "right" => TurnDirection::Right,
            "sharp left" => TurnDirection::SharpLeft,
            "sharp right" => TurnDirection::SharpRight,
            "uturn" | "u-turn" => TurnDirection::UTurn,
            _ => return None,
        };
        Some(direction)
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            TurnDirection::Straight => "continue straight",
            TurnDirection::SlightLeft => "bear slightly left",
            TurnDirection::SlightRight => "bear slightly right",
            TurnDirection::Left => "turn left",
            TurnDirection::Right => "turn right",
            TurnDirection::SharpLeft => "turn sharp left",
            TurnDirection::SharpRight => "turn sharp right",
            TurnDirection::UTurn => "make a U-turn",
        }
    }
}

/// The next thing the traveller has to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub text: String,
    /// Distance along the route until the instruction applies.
    pub distance_m: f64,
    pub turn: Option<TurnDirection>,
    pub arrived: bool,
}

/// Next significant bend ahead of `position` on `route`.
pub fn next_instruction(route: &Route, position: Coordinate) -> Instruction {
    let points = route.points();
    let destination = route.last();

    if distance_m(position, destination) <= ARRIVAL_RADIUS_M {
        return Instruction {
            text: "You have arrived".to_string(),
            distance_m: 0.0,
            turn: None,
            arrived: true,
        };
    }

    let next = next_vertex(points, position);
    let lead_in = distance_m(position, points[next]);

    for j in next.max(1)..points.len().saturating_sub(1) {
        let Some(angle) = turn_angle(points[j - 1], points[j], points[j + 1]) else {
            continue;
        };
        let turn = TurnDirection::from_angle(angle);
        if turn == TurnDirection::Straight {
            continue;
        }
        let distance = lead_in + path_length_m(&points[next..=j]);
        return Instruction {
            text: format!("In {}, {}", format_distance(distance), turn.phrase()),
            distance_m: distance,
            turn: Some(turn),
            arrived: false,
        };
    }

    let distance = lead_in + path_length_m(&points[next..]);
    Instruction {
        text: format!(
            "Continue straight for {} to your destination",
            format_distance(distance)
        ),
        distance_m: distance,
        turn: Some(TurnDirection::Straight),
        arrived: false,
    }
}

/// Render a remote maneuver with the same wording table.
pub fn maneuver_text(maneuver: &Maneuver) -> String {
    let street = maneuver
        .street
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match maneuver.kind.as_str() {
        "depart" => match street {
            Some(name) => format!("Head out on {}", name),
            None => "Head out".to_string(),
        },
        "arrive" => "You have arrived".to_string(),
        "roundabout" | "rotary" => "Enter the roundabout".to_string(),
        _ => {
            let turn = maneuver
                .modifier
                .as_deref()
                .and_then(TurnDirection::from_modifier)
                .unwrap_or(TurnDirection::Straight);
            match street {
                Some(name) => format!("{} onto {}", capitalize(turn.phrase()), name),
                None => capitalize(turn.phrase()),
            }
        }
    }
}

/// "80 m" below a kilometre (rounded to 10 m), "1.4 km" above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{} m", ((meters / 10.0).round() * 10.0) as i64)
    } else {
        format!("{:.1} km", meters / 1_000.0)
    }
}

/// Index of the next vertex the traveller has not passed yet.
fn next_vertex(points: &[Coordinate], position: Coordinate) -> usize {
    let nearest = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance_m(position, **a).total_cmp(&distance_m(position, **b)))
        .map(|(index, _)| index)
        .unwrap_or(0);

    if nearest + 1 >= points.len() {
        return nearest;
    }
    let segment = distance_m(points[nearest], points[nearest + 1]);
    if distance_m(position, points[nearest + 1]) < segment {
        nearest + 1
    } else {
        nearest
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

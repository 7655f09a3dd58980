//! Polyline geometry for road segments
//!
//! Converts a path parameter in [0, 1] into a world position. Only the
//! headless summary needs poses; traffic logic works purely on `t`.

use super::types::Position;

/// A road curve approximated by straight pieces between control points
#[derive(Debug, Clone, PartialEq)]
pub struct RoadCurve {
    points: Vec<Position>,
    /// Cumulative length at each point, `cumulative[0] == 0`
    cumulative: Vec<f32>,
}

impl RoadCurve {
    /// Builds a curve through `points`. Fewer than two points yields a zero-length curve.
    pub fn new(points: Vec<Position>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].distance(point);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    pub fn straight(start: Position, end: Position) -> Self {
        Self::new(vec![start, end])
    }

    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn start(&self) -> Option<Position> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Position> {
        self.points.last().copied()
    }

    /// Position at path parameter `t` (clamped to [0, 1])
    pub fn position_at(&self, t: f32) -> Position {
        let Some(first) = self.points.first() else {
            return Position::default();
        };
        let length = self.length();
        if length <= 0.0 {
            return *first;
        }

        let target = t.clamp(0.0, 1.0) * length;
        // first index whose cumulative length reaches the target
        let index = self
            .cumulative
            .partition_point(|&d| d < target)
            .clamp(1, self.points.len() - 1);

        let piece_start = self.cumulative[index - 1];
        let piece_length = self.cumulative[index] - piece_start;
        if piece_length <= 0.0 {
            return self.points[index];
        }
        let local = (target - piece_start) / piece_length;
        self.points[index - 1].lerp(&self.points[index], local)
    }
}

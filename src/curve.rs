//! Slider path geometry.
//!
//! A [`Curve`] covers a single traversal of a slider. It is built once from
//! the control points and answers "where on the path is `fraction` of the way
//! along"; span repetition and reversal are applied by the slider.
//!
//! Four strategies exist, picked from the curve-type letter:
//! - Linear: every control point is an anchor. The declared pixel length is
//!   laid over the straight segments, and the final segment absorbs whatever
//!   is left, so the slider may stop short of or overshoot its last node.
//! - Passthrough: an arc through exactly three points. Collinear or short
//!   node lists fall back to Linear, longer ones to Bezier.
//! - Bezier: chained segments split at repeated nodes (red anchors), sampled
//!   with de Casteljau into a polyline. Positions interpolate that polyline by
//!   sample index, not by arc length.
//! - Catmull: a Catmull-Rom spline walked in fixed parameter steps until the
//!   requested arc length is covered.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::Vec2;

/// Below this circumcenter divisor three points count as collinear.
const COLLINEAR_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    Linear,      // L
    Passthrough, // P
    Bezier,      // B
    Catmull,     // C
}

impl CurveType {
    pub fn from_char(c: char) -> Self {
        match c {
            'L' => CurveType::Linear,
            'P' => CurveType::Passthrough,
            'B' => CurveType::Bezier,
            _ => CurveType::Catmull, // 'C' and anything unrecognised
        }
    }

    pub fn as_char(self) -> char {
        match self {
            CurveType::Linear => 'L',
            CurveType::Passthrough => 'P',
            CurveType::Bezier => 'B',
            CurveType::Catmull => 'C',
        }
    }
}

/// Circle through three points, swept from the first point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Arc {
    center: Vec2,
    radius: f64,
    start_angle: f64,
    /// `1.0` for increasing angles, `-1.0` otherwise.
    direction: f64,
}

impl Arc {
    fn through(a: Vec2, b: Vec2, c: Vec2) -> Option<Self> {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < COLLINEAR_EPSILON {
            return None;
        }

        let (a_sq, b_sq, c_sq) = (a.length_squared(), b.length_squared(), c.length_squared());
        let center = Vec2::new(
            (a_sq * (b.y - c.y) + b_sq * (c.y - a.y) + c_sq * (a.y - b.y)) / d,
            (a_sq * (c.x - b.x) + b_sq * (a.x - c.x) + c_sq * (b.x - a.x)) / d,
        );
        let radius = a.distance(center);

        // Winding of a -> b -> c decides which way round the circle we go.
        let winding = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let direction = if winding > 0.0 { 1.0 } else { -1.0 };

        Some(Self {
            center,
            radius,
            start_angle: (a.y - center.y).atan2(a.x - center.x),
            direction,
        })
    }

    fn position_at_distance(&self, distance: f64) -> Vec2 {
        let angle = self.start_angle + self.direction * distance / self.radius;
        Vec2::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }
}

/// The strategy actually used after degenerate inputs were resolved.
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Linear,
    Arc(Arc),
    Bezier,
    Catmull { segment_lengths: Vec<f64> },
}

/// Path of one slider span.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    curve_type: CurveType,
    shape: Shape,
    nodes: Vec<Vec2>,
    /// Arc length the slider covers per span.
    length: f64,
    step: f64,
    path: Vec<Vec2>,
}

impl Curve {
    /// Builds the path through `nodes`, the first of which is the slider head.
    ///
    /// `pixel_length` is the declared length used by Linear and Passthrough
    /// paths; `curve_length` is the timing-derived length Bezier and Catmull
    /// paths are cut to.
    pub fn new(
        curve_type: CurveType,
        nodes: Vec<Vec2>,
        pixel_length: f64,
        curve_length: f64,
        config: &EngineConfig,
    ) -> Self {
        let shape = resolve_shape(curve_type, &nodes, config.curve_step);
        let length = match shape {
            Shape::Linear | Shape::Arc(_) => pixel_length,
            Shape::Bezier | Shape::Catmull { .. } => curve_length,
        };

        let mut curve = Self {
            curve_type,
            shape,
            nodes,
            length,
            step: config.curve_step,
            path: Vec::new(),
        };
        curve.path = curve.sample_path(config.sample_spacing);
        curve
    }

    /// The curve type letter the slider declared.
    pub fn curve_type(&self) -> CurveType {
        self.curve_type
    }

    /// The strategy used after fallbacks, e.g. `Linear` for a collinear
    /// passthrough slider.
    pub fn effective_type(&self) -> CurveType {
        match self.shape {
            Shape::Linear => CurveType::Linear,
            Shape::Arc(_) => CurveType::Passthrough,
            Shape::Bezier => CurveType::Bezier,
            Shape::Catmull { .. } => CurveType::Catmull,
        }
    }

    pub fn nodes(&self) -> &[Vec2] {
        &self.nodes
    }

    /// Sampled polyline of one span, from the head to the span end.
    pub fn path(&self) -> &[Vec2] {
        &self.path
    }

    /// Nodes repeated back to back, which split Bezier segments.
    pub fn red_anchors(&self) -> Vec<Vec2> {
        self.nodes
            .windows(2)
            .filter(|pair| pair[0] == pair[1])
            .map(|pair| pair[0])
            .collect()
    }

    /// Position `fraction` (0 to 1) of the way along one span.
    pub fn position_at(&self, fraction: f64) -> Vec2 {
        let fraction = fraction.clamp(0.0, 1.0);
        match &self.shape {
            Shape::Linear => linear_position(&self.nodes, fraction * self.length),
            Shape::Arc(arc) => arc.position_at_distance(fraction * self.length),
            Shape::Bezier => indexed_position(&self.path, fraction),
            Shape::Catmull { segment_lengths } => {
                self.catmull_position(segment_lengths, fraction * self.length)
            }
        }
    }

    fn sample_path(&self, spacing: f64) -> Vec<Vec2> {
        match &self.shape {
            Shape::Linear => linear_path(&self.nodes, self.length),
            Shape::Bezier => bezier_path(&self.nodes, self.length, self.step, spacing),
            Shape::Arc(arc) => {
                let arc = *arc;
                let length = self.length;
                let mut sampler = Sampler::new(arc.position_at_distance(0.0), spacing);
                let steps = step_count(self.step);
                for i in 1..steps {
                    sampler.feed(arc.position_at_distance(length * i as f64 / steps as f64));
                }
                sampler.finish(self.position_at(1.0))
            }
            Shape::Catmull { .. } => {
                let Some(&head) = self.nodes.first() else {
                    return Vec::new();
                };
                let mut sampler = Sampler::new(head, spacing);
                let steps = step_count(self.step);
                'segments: for segment in catmull_segments(&self.nodes) {
                    for i in 1..=steps {
                        let point = catmull_point(&segment, i as f64 / steps as f64);
                        if sampler.travelled + sampler.last_point.distance(point) >= self.length {
                            break 'segments;
                        }
                        sampler.feed(point);
                    }
                }
                sampler.finish(self.position_at(1.0))
            }
        }
    }

    fn catmull_position(&self, segment_lengths: &[f64], distance: f64) -> Vec2 {
        let Some(&head) = self.nodes.first() else {
            return Vec2::default();
        };
        if distance <= 0.0 {
            return head;
        }

        let steps = step_count(self.step);
        let mut travelled = 0.0;
        for (segment, &segment_length) in catmull_segments(&self.nodes).zip(segment_lengths) {
            if travelled + segment_length < distance {
                travelled += segment_length;
                continue;
            }

            let mut previous = segment[1];
            for i in 1..=steps {
                let point = catmull_point(&segment, i as f64 / steps as f64);
                let step_length = previous.distance(point);
                if travelled + step_length >= distance {
                    let t = if step_length > 0.0 {
                        (distance - travelled) / step_length
                    } else {
                        0.0
                    };
                    return previous.lerp(point, t);
                }
                travelled += step_length;
                previous = point;
            }
            return previous;
        }

        self.nodes.last().copied().unwrap_or(head)
    }
}

fn resolve_shape(curve_type: CurveType, nodes: &[Vec2], step: f64) -> Shape {
    match curve_type {
        CurveType::Linear => Shape::Linear,
        CurveType::Bezier => Shape::Bezier,
        CurveType::Catmull => Shape::Catmull {
            segment_lengths: catmull_segment_lengths(nodes, step),
        },
        CurveType::Passthrough => match nodes {
            [a, b, c] => match Arc::through(*a, *b, *c) {
                Some(arc) => Shape::Arc(arc),
                None => {
                    tracing::warn!("Collinear passthrough slider, treating as linear");
                    Shape::Linear
                }
            },
            _ if nodes.len() > 3 => {
                tracing::warn!(nodes = nodes.len(), "Passthrough slider with too many nodes, treating as bezier");
                Shape::Bezier
            }
            _ => Shape::Linear,
        },
    }
}

fn step_count(step: f64) -> usize {
    ((1.0 / step).round() as usize).max(1)
}

/// Keeps a sample once the distance travelled since the last kept one reaches
/// the spacing.
struct Sampler {
    points: Vec<Vec2>,
    last_point: Vec2,
    pending: f64,
    spacing: f64,
    travelled: f64,
}

impl Sampler {
    fn new(start: Vec2, spacing: f64) -> Self {
        Self {
            points: vec![start],
            last_point: start,
            pending: 0.0,
            spacing,
            travelled: 0.0,
        }
    }

    fn feed(&mut self, point: Vec2) {
        let distance = self.last_point.distance(point);
        self.pending += distance;
        self.travelled += distance;
        self.last_point = point;
        if self.pending >= self.spacing {
            self.points.push(point);
            self.pending = 0.0;
        }
    }

    fn finish(mut self, end: Vec2) -> Vec<Vec2> {
        if self.points.last() != Some(&end) {
            self.points.push(end);
        }
        self.points
    }
}

fn linear_position(nodes: &[Vec2], distance: f64) -> Vec2 {
    let Some(&head) = nodes.first() else {
        return Vec2::default();
    };
    let mut remaining = distance;
    let last_segment = nodes.len().saturating_sub(2);
    for (i, pair) in nodes.windows(2).enumerate() {
        let segment_length = pair[0].distance(pair[1]);
        if remaining <= segment_length || i == last_segment {
            let direction = (pair[1] - pair[0]).normalized();
            return pair[0] + direction * remaining;
        }
        remaining -= segment_length;
    }
    head
}

fn linear_path(nodes: &[Vec2], length: f64) -> Vec<Vec2> {
    let Some(&head) = nodes.first() else {
        return Vec::new();
    };
    let mut path = vec![head];
    let mut travelled = 0.0;
    for pair in nodes.windows(2).take(nodes.len().saturating_sub(2)) {
        travelled += pair[0].distance(pair[1]);
        if travelled >= length {
            break;
        }
        path.push(pair[1]);
    }
    let end = linear_position(nodes, length);
    if path.last() != Some(&end) {
        path.push(end);
    }
    path
}

/// Splits control points into Bezier segments at repeated nodes.
fn bezier_segments(nodes: &[Vec2]) -> Vec<Vec<Vec2>> {
    let mut segments = Vec::new();
    let Some(&head) = nodes.first() else {
        return segments;
    };
    let mut current = vec![head];
    for pair in nodes.windows(2) {
        if pair[0] == pair[1] {
            if current.len() > 1 {
                segments.push(std::mem::replace(&mut current, vec![pair[1]]));
            }
        } else {
            current.push(pair[1]);
        }
    }
    if current.len() > 1 {
        segments.push(current);
    }
    segments
}

/// De Casteljau evaluation, reusing `scratch` between calls.
fn de_casteljau(points: &[Vec2], t: f64, scratch: &mut Vec<Vec2>) -> Vec2 {
    scratch.clear();
    scratch.extend_from_slice(points);
    for level in (1..points.len()).rev() {
        for i in 0..level {
            scratch[i] = scratch[i].lerp(scratch[i + 1], t);
        }
    }
    scratch.first().copied().unwrap_or_default()
}

fn bezier_path(nodes: &[Vec2], length: f64, step: f64, spacing: f64) -> Vec<Vec2> {
    let Some(&head) = nodes.first() else {
        return Vec::new();
    };
    let steps = step_count(step);
    let mut sampler = Sampler::new(head, spacing);
    let mut scratch = Vec::new();

    for segment in bezier_segments(nodes) {
        for i in 1..=steps {
            let point = de_casteljau(&segment, i as f64 / steps as f64, &mut scratch);
            let step_length = sampler.last_point.distance(point);
            if sampler.travelled + step_length >= length {
                let t = if step_length > 0.0 {
                    (length - sampler.travelled) / step_length
                } else {
                    0.0
                };
                let end = sampler.last_point.lerp(point, t);
                return sampler.finish(end);
            }
            sampler.feed(point);
        }
    }

    // The control points describe a shorter path than the slider needs; carry
    // on in the direction of the last sample.
    let end = sampler.last_point;
    let shortfall = length - sampler.travelled;
    let before_end = sampler
        .points
        .iter()
        .rev()
        .find(|&&p| p != end)
        .copied()
        .unwrap_or(end);
    let extended = end + (end - before_end).normalized() * shortfall;
    sampler.finish(extended)
}

/// Interpolates between the two samples around `fraction` of the sample count.
fn indexed_position(path: &[Vec2], fraction: f64) -> Vec2 {
    match path {
        [] => Vec2::default(),
        [only] => *only,
        _ => {
            let position = fraction * (path.len() - 1) as f64;
            let index = (position.floor() as usize).min(path.len() - 2);
            path[index].lerp(path[index + 1], position - index as f64)
        }
    }
}

/// Control quadruples of each spline segment, doubling the end points.
fn catmull_segments(nodes: &[Vec2]) -> impl Iterator<Item = [Vec2; 4]> + '_ {
    (0..nodes.len().saturating_sub(1)).map(move |i| {
        let p0 = if i > 0 { nodes[i - 1] } else { nodes[i] };
        let p3 = nodes.get(i + 2).copied().unwrap_or(nodes[i + 1]);
        [p0, nodes[i], nodes[i + 1], p3]
    })
}

fn catmull_point(segment: &[Vec2; 4], t: f64) -> Vec2 {
    let [p0, p1, p2, p3] = *segment;
    let t2 = t * t;
    let t3 = t2 * t;

    let axis = |a: f64, b: f64, c: f64, d: f64| {
        0.5 * (2.0 * b
            + (-a + c) * t
            + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2
            + (-a + 3.0 * b - 3.0 * c + d) * t3)
    };

    Vec2::new(axis(p0.x, p1.x, p2.x, p3.x), axis(p0.y, p1.y, p2.y, p3.y))
}

fn catmull_segment_lengths(nodes: &[Vec2], step: f64) -> Vec<f64> {
    let steps = step_count(step);
    catmull_segments(nodes)
        .map(|segment| {
            let mut previous = segment[1];
            let mut length = 0.0;
            for i in 1..=steps {
                let point = catmull_point(&segment, i as f64 / steps as f64);
                length += previous.distance(point);
                previous = point;
            }
            length
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn curve(curve_type: CurveType, nodes: &[(f64, f64)], length: f64) -> Curve {
        let nodes = nodes.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        Curve::new(curve_type, nodes, length, length, &EngineConfig::default())
    }

    fn assert_point(actual: Vec2, x: f64, y: f64, epsilon: f64) {
        assert_abs_diff_eq!(actual.x, x, epsilon = epsilon);
        assert_abs_diff_eq!(actual.y, y, epsilon = epsilon);
    }

    #[test]
    fn test_curve_type_letters() {
        assert_eq!(CurveType::from_char('L'), CurveType::Linear);
        assert_eq!(CurveType::from_char('P'), CurveType::Passthrough);
        assert_eq!(CurveType::from_char('B'), CurveType::Bezier);
        assert_eq!(CurveType::from_char('C'), CurveType::Catmull);
        assert_eq!(CurveType::from_char('?'), CurveType::Catmull);
    }

    #[test]
    fn test_linear_final_segment_absorbs_declared_length() {
        // Nodes span 100 + 100 px but the slider declares 250 px.
        let c = curve(CurveType::Linear, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)], 250.0);
        assert_point(c.position_at(0.0), 0.0, 0.0, 1e-9);
        assert_point(c.position_at(0.2), 50.0, 0.0, 1e-9);
        assert_point(c.position_at(0.6), 100.0, 50.0, 1e-9);
        assert_point(c.position_at(1.0), 100.0, 150.0, 1e-9);
        assert_point(*c.path().last().unwrap(), 100.0, 150.0, 1e-9);
    }

    #[test]
    fn test_linear_stops_short_of_last_node() {
        let c = curve(CurveType::Linear, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)], 50.0);
        assert_point(c.position_at(1.0), 50.0, 0.0, 1e-9);
        assert_eq!(c.path().len(), 2);
    }

    #[test]
    fn test_passthrough_half_circle() {
        let radius = 50.0;
        let half = std::f64::consts::PI * radius;
        let c = curve(CurveType::Passthrough, &[(0.0, 0.0), (50.0, 50.0), (100.0, 0.0)], half);
        assert_eq!(c.effective_type(), CurveType::Passthrough);
        assert_point(c.position_at(0.0), 0.0, 0.0, 1e-9);
        assert_point(c.position_at(0.5), 50.0, 50.0, 1e-9);
        assert_point(c.position_at(1.0), 100.0, 0.0, 1e-9);
    }

    #[test]
    fn test_passthrough_winding_picks_direction() {
        let half = std::f64::consts::PI * 50.0;
        let c = curve(CurveType::Passthrough, &[(0.0, 0.0), (50.0, -50.0), (100.0, 0.0)], half);
        assert_point(c.position_at(0.5), 50.0, -50.0, 1e-9);
    }

    #[test]
    fn test_passthrough_fallbacks() {
        let collinear = curve(CurveType::Passthrough, &[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)], 100.0);
        assert_eq!(collinear.effective_type(), CurveType::Linear);
        assert_point(collinear.position_at(1.0), 100.0, 0.0, 1e-9);

        let short = curve(CurveType::Passthrough, &[(0.0, 0.0), (0.0, 80.0)], 80.0);
        assert_eq!(short.effective_type(), CurveType::Linear);

        let long = curve(
            CurveType::Passthrough,
            &[(0.0, 0.0), (50.0, 50.0), (100.0, 0.0), (150.0, 50.0)],
            100.0,
        );
        assert_eq!(long.effective_type(), CurveType::Bezier);
        assert_eq!(long.curve_type().as_char(), 'P');
    }

    #[test]
    fn test_single_node_never_panics() {
        for curve_type in [CurveType::Linear, CurveType::Passthrough, CurveType::Bezier, CurveType::Catmull] {
            let c = curve(curve_type, &[(30.0, 40.0)], 0.0);
            let p = c.position_at(0.5);
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }

    #[test]
    fn test_bezier_samples_are_spaced() {
        let c = curve(CurveType::Bezier, &[(0.0, 0.0), (100.0, 0.0)], 100.0);
        let path = c.path();
        assert_point(path[0], 0.0, 0.0, 1e-9);
        assert_point(*path.last().unwrap(), 100.0, 0.0, 1e-6);
        for pair in path.windows(2).take(path.len() - 2) {
            assert!(pair[0].distance(pair[1]) >= 1.99);
        }
        assert_point(c.position_at(0.5), 50.0, 0.0, 1.0);
    }

    #[test]
    fn test_bezier_red_anchor_splits_segments() {
        let c = curve(
            CurveType::Bezier,
            &[(0.0, 0.0), (100.0, 0.0), (100.0, 0.0), (100.0, 100.0)],
            200.0,
        );
        assert_eq!(c.red_anchors(), vec![Vec2::new(100.0, 0.0)]);
        // Two straight segments: the corner is reached exactly at the middle.
        let corner_distance = c
            .path()
            .iter()
            .map(|p| p.distance(Vec2::new(100.0, 0.0)))
            .fold(f64::INFINITY, f64::min);
        assert!(corner_distance < 2.0);
        assert_point(c.position_at(1.0), 100.0, 100.0, 1e-6);
    }

    #[test]
    fn test_bezier_cut_to_length() {
        let c = curve(CurveType::Bezier, &[(0.0, 0.0), (200.0, 0.0)], 100.0);
        assert_point(c.position_at(1.0), 100.0, 0.0, 1e-6);
    }

    #[test]
    fn test_bezier_extended_to_length() {
        let c = curve(CurveType::Bezier, &[(0.0, 0.0), (50.0, 0.0)], 80.0);
        assert_point(c.position_at(1.0), 80.0, 0.0, 1e-6);
    }

    #[test]
    fn test_catmull_walks_arc_length() {
        let c = curve(CurveType::Catmull, &[(0.0, 0.0), (100.0, 0.0)], 100.0);
        assert_point(c.position_at(0.0), 0.0, 0.0, 1e-9);
        assert_point(c.position_at(1.0), 100.0, 0.0, 1e-6);
        let middle = c.position_at(0.5);
        assert_abs_diff_eq!(middle.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(middle.x, 50.0, epsilon = 0.1);
    }

    #[test]
    fn test_catmull_switches_segments() {
        let c = curve(
            CurveType::Catmull,
            &[(0.0, 0.0), (100.0, 0.0), (200.0, 0.0)],
            200.0,
        );
        let later = c.position_at(0.75);
        assert!(later.x > 100.0);
        assert_point(*c.path().last().unwrap(), 200.0, 0.0, 1e-6);
    }
}

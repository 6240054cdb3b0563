//! Trend normalization: map a metric series onto a drawing surface.

use serde::{Deserialize, Serialize};

/// A coordinate on the drawing surface. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Optional explicit value range. A missing side is derived from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl TrendBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Project `values` onto a `width` x `height` surface.
///
/// Only finite values are plotted; `None`, NaN and infinities keep their
/// index position but produce no point. Fewer than two plottable values
/// yield an empty result. A zero, negative or non-finite span is treated
/// as 1, so a flat series is drawn along the bottom edge.
///
/// ```
/// use obdwatch::data::trend::{normalize, TrendBounds};
///
/// let points = normalize(&[Some(0.0), Some(1.0), Some(2.0), Some(3.0)], 300.0, 100.0, TrendBounds::default());
/// let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
/// assert_eq!(xs, vec![0.0, 100.0, 200.0, 300.0]);
/// assert_eq!(points[3].y, 0.0);
/// ```
pub fn normalize(values: &[Option<f64>], width: f64, height: f64, bounds: TrendBounds) -> Vec<Point> {
    let plottable = || {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i, v)))
    };

    if plottable().take(2).count() < 2 {
        return Vec::new();
    }

    let min = bounds
        .min
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| plottable().map(|(_, v)| v).fold(f64::INFINITY, f64::min));
    let max = bounds
        .max
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| plottable().map(|(_, v)| v).fold(f64::NEG_INFINITY, f64::max));

    let span = max - min;
    let span = if span > 0.0 && span.is_finite() { span } else { 1.0 };
    let step = width / (values.len() - 1) as f64;

    plottable()
        .map(|(i, v)| Point {
            x: i as f64 * step,
            y: height - ((v - min) / span) * height,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unbounded(values: &[Option<f64>]) -> Vec<Point> {
        normalize(values, 100.0, 50.0, TrendBounds::default())
    }

    #[test]
    fn test_fewer_than_two_valid_is_empty() {
        assert!(unbounded(&[]).is_empty());
        assert!(unbounded(&[Some(1.0)]).is_empty());
        assert!(unbounded(&[Some(1.0), None, Some(f64::NAN)]).is_empty());
    }

    #[test]
    fn test_even_spacing_across_width() {
        let points = normalize(
            &[Some(0.0), Some(1.0), Some(2.0), Some(3.0)],
            300.0,
            90.0,
            TrendBounds::default(),
        );

        assert_eq!(points.len(), 4);
        assert_eq!(points.iter().map(|p| p.x).collect::<Vec<_>>(), vec![0.0, 100.0, 200.0, 300.0]);
        for (point, expected) in points.iter().zip([90.0, 60.0, 30.0, 0.0]) {
            assert!((point.y - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_series_has_equal_y() {
        let points = unbounded(&[Some(42.0), Some(42.0), Some(42.0)]);

        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.y == points[0].y));
        assert_eq!(points[0].y, 50.0);
    }

    #[test]
    fn test_interior_gaps_keep_index_position() {
        let points = unbounded(&[Some(0.0), None, Some(f64::NAN), Some(1.0), Some(2.0)]);

        assert_eq!(points.iter().map(|p| p.x).collect::<Vec<_>>(), vec![0.0, 75.0, 100.0]);
    }

    #[test]
    fn test_explicit_bounds() {
        let points = normalize(&[Some(25.0), Some(75.0)], 10.0, 100.0, TrendBounds::new(0.0, 100.0));

        assert_eq!(points[0].y, 75.0);
        assert_eq!(points[1].y, 25.0);
    }

    #[test]
    fn test_one_sided_bound() {
        let bounds = TrendBounds {
            min: Some(0.0),
            max: None,
        };
        let points = normalize(&[Some(50.0), Some(100.0)], 10.0, 100.0, bounds);

        assert_eq!(points[0].y, 50.0);
        assert_eq!(points[1].y, 0.0);
    }

    #[test]
    fn test_degenerate_bounds_use_unit_span() {
        let points = normalize(&[Some(5.0), Some(5.5)], 10.0, 10.0, TrendBounds::new(5.0, 5.0));

        assert_eq!(points[0].y, 10.0);
        assert_eq!(points[1].y, 5.0);

        let inverted = normalize(&[Some(5.0), Some(6.0)], 10.0, 10.0, TrendBounds::new(5.0, 1.0));
        assert_eq!(inverted[1].y, 0.0);
    }
}

//! Grid-cell spatial prefilter.
//!
//! Merchants are bucketed into fixed-size lat/lng cells. A radius query scans
//! every cell touching the box that circumscribes the search circle, so the
//! candidate set is a superset of the true result. The exact haversine check
//! downstream removes the extra points.

use std::collections::HashMap;

use crate::geo::Coordinate;
use crate::CoreError;

/// Default cell edge in degrees (~1.1 km of latitude).
pub const DEFAULT_CELL_SIZE_DEGREES: f64 = 0.01;

/// Smallest accepted cell edge (~11 cm). Keeps cell indices far from the
/// `i64` limits.
pub const MIN_CELL_SIZE_DEGREES: f64 = 1e-6;

/// Largest accepted cell edge.
pub const MAX_CELL_SIZE_DEGREES: f64 = 90.0;

/// Identifier of a grid cell: floored `lat / size` and `lng / size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: i64,
    pub col: i64,
}

/// Closed degree range on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    min: f64,
    max: f64,
}

/// Box circumscribing a search circle. Longitude may be split in two when the
/// box crosses the antimeridian.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBounds {
    lat: Span,
    lng: Vec<Span>,
}

impl SearchBounds {
    /// Compute the bounding box of all points within `radius_meters` of
    /// `origin` on a sphere of radius `earth_radius_meters`.
    ///
    /// Longitude half-width is `asin(sin θ / cos φ)`, the exact extent of a
    /// spherical cap, which is never narrower than `θ / cos φ`.
    #[must_use]
    pub fn around(origin: Coordinate, radius_meters: f64, earth_radius_meters: f64) -> Self {
        let angular = (radius_meters.max(0.0) / earth_radius_meters).min(std::f64::consts::PI);
        let lat_half = angular.to_degrees();
        let min_lat = origin.latitude() - lat_half;
        let max_lat = origin.latitude() + lat_half;

        let reaches_pole = min_lat <= -90.0 || max_lat >= 90.0;
        let lat = Span {
            min: min_lat.max(-90.0),
            max: max_lat.min(90.0),
        };

        let ratio = angular.sin() / origin.latitude().to_radians().cos();
        if reaches_pole || !ratio.is_finite() || ratio >= 1.0 {
            return Self {
                lat,
                lng: vec![Span {
                    min: -180.0,
                    max: 180.0,
                }],
            };
        }

        let lng_half = ratio.asin().to_degrees();
        let min_lng = origin.longitude() - lng_half;
        let max_lng = origin.longitude() + lng_half;

        let lng = split_longitude(min_lng, max_lng);

        Self { lat, lng }
    }

    /// True if `point` lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        let lat_ok = point.latitude() >= self.lat.min && point.latitude() <= self.lat.max;
        lat_ok
            && self
                .lng
                .iter()
                .any(|s| point.longitude() >= s.min && point.longitude() <= s.max)
    }
}

/// Longitude spans for `[min_lng, max_lng]`, split in two when the range
/// reaches the antimeridian. A range ending exactly on ±180 also scans the
/// other side, since both values name the same meridian.
fn split_longitude(min_lng: f64, max_lng: f64) -> Vec<Span> {
    if min_lng <= -180.0 {
        vec![
            Span {
                min: (min_lng + 360.0).min(180.0),
                max: 180.0,
            },
            Span {
                min: -180.0,
                max: max_lng,
            },
        ]
    } else if max_lng >= 180.0 {
        vec![
            Span {
                min: min_lng,
                max: 180.0,
            },
            Span {
                min: -180.0,
                max: (max_lng - 360.0).max(-180.0),
            },
        ]
    } else {
        vec![Span {
            min: min_lng,
            max: max_lng,
        }]
    }
}

/// Immutable cell index over a merchant slice. Stores positions into that
/// slice, not the merchants themselves.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_size_degrees: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    len: usize,
}

impl GridIndex {
    /// Index `points`, where position `i` in the iterator becomes entry `i`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if `cell_size_degrees` is not
    /// within [`MIN_CELL_SIZE_DEGREES`, `MAX_CELL_SIZE_DEGREES`].
    pub fn build<I>(cell_size_degrees: f64, points: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        if !(MIN_CELL_SIZE_DEGREES..=MAX_CELL_SIZE_DEGREES).contains(&cell_size_degrees) {
            return Err(CoreError::InvariantViolation(format!(
                "grid cell size must be within [{MIN_CELL_SIZE_DEGREES}, {MAX_CELL_SIZE_DEGREES}], got {cell_size_degrees}"
            )));
        }

        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        let mut len = 0;
        for (index, point) in points.into_iter().enumerate() {
            cells
                .entry(cell_key(cell_size_degrees, point))
                .or_default()
                .push(index);
            len += 1;
        }

        Ok(Self {
            cell_size_degrees,
            cells,
            len,
        })
    }

    #[must_use]
    pub fn cell_size_degrees(&self) -> f64 {
        self.cell_size_degrees
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry positions whose cell intersects the search box around `origin`.
    ///
    /// Output is sorted ascending and free of duplicates.
    #[must_use]
    pub fn candidates(
        &self,
        origin: Coordinate,
        radius_meters: f64,
        earth_radius_meters: f64,
    ) -> Vec<usize> {
        let bounds = SearchBounds::around(origin, radius_meters, earth_radius_meters);
        self.candidates_in(&bounds)
    }

    fn candidates_in(&self, bounds: &SearchBounds) -> Vec<usize> {
        let size = self.cell_size_degrees;

        let row_min = floor_index(bounds.lat.min, size);
        let row_max = floor_index(bounds.lat.max, size);

        // Cell counts in i128 so extreme spans cannot overflow.
        let rows = i128::from(row_max) - i128::from(row_min) + 1;
        let mut scanned_cells: i128 = 0;
        for span in &bounds.lng {
            let cols = i128::from(floor_index(span.max, size))
                - i128::from(floor_index(span.min, size))
                + 1;
            scanned_cells = scanned_cells.saturating_add(rows.saturating_mul(cols));
        }

        let mut out = Vec::new();
        // A box wider than the occupied set is cheaper to answer by walking
        // the occupied cells and testing their keys.
        if scanned_cells > i128::try_from(self.cells.len()).unwrap_or(i128::MAX) {
            for (key, entries) in &self.cells {
                if key.row >= row_min
                    && key.row <= row_max
                    && self.col_in_bounds(key.col, bounds)
                {
                    out.extend_from_slice(entries);
                }
            }
        } else {
            for span in &bounds.lng {
                let col_min = floor_index(span.min, size);
                let col_max = floor_index(span.max, size);
                for row in row_min..=row_max {
                    for col in col_min..=col_max {
                        if let Some(entries) = self.cells.get(&CellKey { row, col }) {
                            out.extend_from_slice(entries);
                        }
                    }
                }
            }
        }

        out.sort_unstable();
        out.dedup();
        out
    }

    fn col_in_bounds(&self, col: i64, bounds: &SearchBounds) -> bool {
        let size = self.cell_size_degrees;
        bounds
            .lng
            .iter()
            .any(|s| col >= floor_index(s.min, size) && col <= floor_index(s.max, size))
    }
}

/// Cell holding `point` for a given cell size.
#[must_use]
pub fn cell_key(cell_size_degrees: f64, point: Coordinate) -> CellKey {
    CellKey {
        row: floor_index(point.latitude(), cell_size_degrees),
        col: floor_index(point.longitude(), cell_size_degrees),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn floor_index(degrees: f64, size: f64) -> i64 {
    // |degrees| <= 180 and size >= MIN_CELL_SIZE_DEGREES keeps this well inside i64.
    (degrees / size).floor() as i64
}

use ndarray::prelude::*;
use rayon::prelude::*;

use super::error::{ModelError, Result};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

// tolerance for coordinate comparisons, in degrees
const EPS: f64 = 1e-12;

/// A planar point.  Zone boundaries use x = longitude and y = latitude.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Point2d {
    pub x_coord: f64,
    pub y_coord: f64,
}

impl Point2d {
    pub fn new(x_coord: f64, y_coord: f64) -> Point2d {
        Point2d{x_coord, y_coord}
    }

    pub fn minus(&self, other: &Point2d) -> Point2d {
        Point2d::new(self.x_coord - other.x_coord, self.y_coord - other.y_coord)
    }

    pub fn cross(&self, other: &Point2d) -> f64 {
        self.x_coord * other.y_coord - self.y_coord * other.x_coord
    }
}

/// A geographic position, in degrees.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> LatLon {
        LatLon{lat, lon}
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &LatLon) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let hh = (dlat / 2.).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.).sin().powi(2);
        2. * EARTH_RADIUS_KM * hh.sqrt().min(1.).asin()
    }
}

/// Computes the great-circle distance between every pair of points.
pub fn haversine_distances(points: &[LatLon]) -> Array<f64, Ix2> {
    let size = points.len();
    let rows: Vec<f64> = (0..size).into_par_iter()
        .flat_map_iter(|ii| points.iter().map(move |pj| points[ii].haversine_km(pj)))
        .collect();
    // the vector has exactly size * size entries, so this can't fail
    Array::from_shape_vec((size, size), rows).unwrap_or_else(|_| Array::zeros((size, size)))
}

/// A simple polygon given by its outer ring.  The ring is stored open: the first vertex is
/// not repeated at the end.
#[derive(PartialEq, Debug, Clone)]
pub struct Polygon {
    ring: Vec<Point2d>,
}

impl Polygon {
    pub fn new(mut ring: Vec<Point2d>) -> Result<Polygon> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(ModelError::Geometry(
                format!("a polygon needs at least 3 distinct vertices, got {}", ring.len())));
        }
        if ring.iter().any(|pp| !pp.x_coord.is_finite() || !pp.y_coord.is_finite()) {
            return Err(ModelError::Geometry(String::from("non-finite polygon vertex")));
        }
        Ok(Polygon{ring})
    }

    /// Parses the outer ring of a WKT `POLYGON ((x y, x y, ...))`.  Holes are ignored.
    pub fn from_wkt(wkt: &str) -> Result<Polygon> {
        let trimmed = wkt.trim();
        let body = match trimmed.get(..7) {
            Some(head) if head.eq_ignore_ascii_case("POLYGON") => trimmed[7..].trim(),
            _ => return Err(ModelError::Geometry(format!("not a WKT polygon: {}", wkt))),
        };
        let body = body.strip_prefix('(').and_then(|bb| bb.trim_start().strip_prefix('('))
            .ok_or_else(|| ModelError::Geometry(format!("malformed WKT polygon: {}", wkt)))?;
        let outer = match body.find(')') {
            Some(end) => &body[..end],
            None => return Err(ModelError::Geometry(format!("unterminated WKT ring: {}", wkt))),
        };

        let mut ring = vec![];
        for pair in outer.split(',') {
            let coords: Vec<&str> = pair.split_whitespace().collect();
            if coords.len() < 2 {
                return Err(ModelError::Geometry(format!("bad WKT coordinate `{}`", pair)));
            }
            let parse = |ss: &str| ss.parse::<f64>().map_err(|_| ModelError::Parse{
                field: String::from("WKT coordinate"),
                value: String::from(ss),
            });
            ring.push(Point2d::new(parse(coords[0])?, parse(coords[1])?));
        }
        Polygon::new(ring)
    }

    /// An axis-aligned rectangle with the given corners, in (lon, lat) order.
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Polygon {
        Polygon{ring: vec![
            Point2d::new(min_lon, min_lat),
            Point2d::new(max_lon, min_lat),
            Point2d::new(max_lon, max_lat),
            Point2d::new(min_lon, max_lat),
        ]}
    }

    pub fn vertices(&self) -> &[Point2d] {
        &self.ring
    }

    fn edges<'a>(&'a self) -> impl Iterator<Item = (Point2d, Point2d)> + 'a {
        let nn = self.ring.len();
        (0..nn).map(move |ii| (self.ring[ii], self.ring[(ii + 1) % nn]))
    }

    fn signed_area(&self) -> f64 {
        self.edges().map(|(aa, bb)| aa.cross(&bb)).sum::<f64>() / 2.
    }

    /// Area-weighted centroid.  Falls back to the vertex mean for degenerate rings.
    pub fn centroid(&self) -> LatLon {
        let area = self.signed_area();
        if area.abs() < EPS * EPS {
            let nn = self.ring.len() as f64;
            let lon = self.ring.iter().map(|pp| pp.x_coord).sum::<f64>() / nn;
            let lat = self.ring.iter().map(|pp| pp.y_coord).sum::<f64>() / nn;
            return LatLon::new(lat, lon);
        }
        let mut cx = 0.;
        let mut cy = 0.;
        for (aa, bb) in self.edges() {
            let cross = aa.cross(&bb);
            cx += (aa.x_coord + bb.x_coord) * cross;
            cy += (aa.y_coord + bb.y_coord) * cross;
        }
        LatLon::new(cy / (6. * area), cx / (6. * area))
    }

    fn bbox(&self) -> (f64, f64, f64, f64) {
        self.ring.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), pp| (x0.min(pp.x_coord), y0.min(pp.y_coord),
                                    x1.max(pp.x_coord), y1.max(pp.y_coord)))
    }

    fn on_boundary(&self, point: &Point2d) -> bool {
        self.edges().any(|(aa, bb)| on_segment(point, &aa, &bb))
    }

    /// True if the point lies in the interior, not on the boundary.
    pub fn strictly_contains(&self, point: &Point2d) -> bool {
        if self.on_boundary(point) {
            return false;
        }
        // even-odd ray casting towards +x
        let mut inside = false;
        for (aa, bb) in self.edges() {
            if (aa.y_coord > point.y_coord) != (bb.y_coord > point.y_coord) {
                let x_at = aa.x_coord + (point.y_coord - aa.y_coord) * (bb.x_coord - aa.x_coord)
                    / (bb.y_coord - aa.y_coord);
                if point.x_coord < x_at {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// True if the boundaries of the two polygons meet while their interiors stay disjoint.
    pub fn touches(&self, other: &Polygon) -> bool {
        let (ax0, ay0, ax1, ay1) = self.bbox();
        let (bx0, by0, bx1, by1) = other.bbox();
        if ax1 < bx0 - EPS || bx1 < ax0 - EPS || ay1 < by0 - EPS || by1 < ay0 - EPS {
            return false;
        }

        let mut contact = false;
        for (aa, bb) in self.edges() {
            for (cc, dd) in other.edges() {
                if properly_cross(&aa, &bb, &cc, &dd) {
                    return false;
                }
                contact = contact || segments_meet(&aa, &bb, &cc, &dd);
            }
        }
        if !contact {
            return false;
        }

        let interior_probe = |pp: &Polygon, qq: &Polygon| {
            let centroid = pp.centroid();
            pp.ring.iter().any(|vv| qq.strictly_contains(vv)) ||
                qq.strictly_contains(&Point2d::new(centroid.lon, centroid.lat)) ||
                pp.edge_piece_midpoints(qq).iter().any(|mm| qq.strictly_contains(mm))
        };
        !interior_probe(self, other) && !interior_probe(other, self)
    }

    // Midpoints of this polygon's edges, each edge split wherever a vertex of `other` lies on
    // it.  With no proper crossings, every piece is either inside, outside, or on the boundary
    // of `other`.
    fn edge_piece_midpoints(&self, other: &Polygon) -> Vec<Point2d> {
        let mut midpoints = vec![];
        for (aa, bb) in self.edges() {
            let dir = bb.minus(&aa);
            let len_sq = dir.x_coord.powi(2) + dir.y_coord.powi(2);
            if len_sq < EPS * EPS {
                continue;
            }
            let mut params = vec![0., 1.];
            for vv in other.ring.iter().filter(|vv| on_segment(vv, &aa, &bb)) {
                let offset = vv.minus(&aa);
                params.push((offset.x_coord * dir.x_coord + offset.y_coord * dir.y_coord) / len_sq);
            }
            params.sort_by(|t1, t2| t1.partial_cmp(t2).unwrap_or(std::cmp::Ordering::Equal));
            for pair in params.windows(2) {
                let mid = (pair[0] + pair[1]) / 2.;
                midpoints.push(Point2d::new(aa.x_coord + mid * dir.x_coord,
                                            aa.y_coord + mid * dir.y_coord));
            }
        }
        midpoints
    }
}

fn orientation(aa: &Point2d, bb: &Point2d, cc: &Point2d) -> f64 {
    bb.minus(aa).cross(&cc.minus(aa))
}

fn sign(value: f64) -> i8 {
    if value > EPS {
        1
    } else if value < -EPS {
        -1
    } else {
        0
    }
}

fn on_segment(pp: &Point2d, aa: &Point2d, bb: &Point2d) -> bool {
    sign(orientation(aa, bb, pp)) == 0 &&
        pp.x_coord >= aa.x_coord.min(bb.x_coord) - EPS &&
        pp.x_coord <= aa.x_coord.max(bb.x_coord) + EPS &&
        pp.y_coord >= aa.y_coord.min(bb.y_coord) - EPS &&
        pp.y_coord <= aa.y_coord.max(bb.y_coord) + EPS
}

// crossing at a point interior to both segments
fn properly_cross(aa: &Point2d, bb: &Point2d, cc: &Point2d, dd: &Point2d) -> bool {
    let o1 = sign(orientation(aa, bb, cc));
    let o2 = sign(orientation(aa, bb, dd));
    let o3 = sign(orientation(cc, dd, aa));
    let o4 = sign(orientation(cc, dd, bb));
    o1 * o2 < 0 && o3 * o4 < 0
}

fn segments_meet(aa: &Point2d, bb: &Point2d, cc: &Point2d, dd: &Point2d) -> bool {
    properly_cross(aa, bb, cc, dd) ||
        on_segment(cc, aa, bb) || on_segment(dd, aa, bb) ||
        on_segment(aa, cc, dd) || on_segment(bb, cc, dd)
}

use crate::models::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn polyline_length_m(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Position of every vertex along the polyline as a fraction of its length.
///
/// Uses cumulative great-circle chord length. A polyline without length
/// (all points identical) falls back to evenly spaced vertex indices.
pub fn vertex_fractions(polyline: &[Coordinate]) -> Vec<f64> {
    let n = polyline.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mut cumulative = Vec::with_capacity(n);
    cumulative.push(0.0);
    let mut total = 0.0;
    for w in polyline.windows(2) {
        total += haversine_m(w[0], w[1]);
        cumulative.push(total);
    }

    if total > 0.0 {
        cumulative.iter().map(|d| d / total).collect()
    } else {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }
}

/// Index of the first vertex (from 1) whose fraction reaches `fraction`,
/// together with the interpolated point between it and its predecessor.
fn locate(polyline: &[Coordinate], fractions: &[f64], fraction: f64) -> (usize, Coordinate) {
    let last = polyline.len() - 1;
    let index = (1..=last)
        .find(|&i| fractions[i] >= fraction)
        .unwrap_or(last);
    let prev = fractions[index - 1];
    let cur = fractions[index];
    let t = if cur > prev {
        ((fraction - prev) / (cur - prev)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (index, polyline[index - 1].interpolate(polyline[index], t))
}

/// The leading part of `polyline` covering `fraction` (0..=1) of its length:
/// every vertex before the cut plus the interpolated cut point.
pub fn polyline_prefix(polyline: &[Coordinate], fraction: f64) -> Vec<Coordinate> {
    if polyline.len() < 2 {
        return polyline.to_vec();
    }
    let fractions = vertex_fractions(polyline);
    let (index, cut) = locate(polyline, &fractions, fraction.clamp(0.0, 1.0));
    let mut prefix = Vec::with_capacity(index + 1);
    prefix.extend_from_slice(&polyline[..index]);
    prefix.push(cut);
    prefix
}

/// The part of `polyline` between the fractions `from` and `to`, both ends
/// interpolated.
pub fn polyline_slice(polyline: &[Coordinate], from: f64, to: f64) -> Vec<Coordinate> {
    if polyline.len() < 2 {
        return polyline.to_vec();
    }
    let from = from.clamp(0.0, 1.0);
    let to = to.clamp(from, 1.0);
    let fractions = vertex_fractions(polyline);
    let (_, start) = locate(polyline, &fractions, from);
    let (_, end) = locate(polyline, &fractions, to);

    let mut slice = vec![start];
    slice.extend(
        polyline
            .iter()
            .zip(&fractions)
            .filter(|(_, f)| **f > from && **f < to)
            .map(|(c, _)| *c),
    );
    slice.push(end);
    slice
}

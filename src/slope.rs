//! Mass dependence of the t' slope parameter

use crate::{
    error::{GeneratorError, Result},
    numeric::Float,
};

/// Tabulated inverse slope parameter of the t' distribution versus X mass
///
/// Values in between tabulated masses are linearly interpolated, values
/// outside of the table are linearly extrapolated from the two closest points.
///
#[derive(Clone, Debug, PartialEq)]
pub struct SlopeTable {
    /// X masses (GeV/c^2), strictly increasing
    masses: Vec<Float>,

    /// Inverse slope parameters ((GeV/c)^2) at these masses
    inv_slopes: Vec<Float>,
}
//
impl SlopeTable {
    /// Build a table from (mass, inverse slope) pairs
    ///
    /// Interpolation is only meaningful on a sorted mass axis, so tables whose
    /// masses are not strictly increasing are rejected.
    ///
    pub fn new(points: impl IntoIterator<Item = (Float, Float)>) -> Result<Self> {
        let (masses, inv_slopes): (Vec<Float>, Vec<Float>) = points.into_iter().unzip();
        if masses.is_empty() {
            return Err(GeneratorError::InvalidSlopeTable(
                "at least one point is needed".to_owned(),
            ));
        }
        if let Some((mass, inv_slope)) = masses
            .iter()
            .zip(&inv_slopes)
            .find(|(m, s)| !m.is_finite() || !s.is_finite())
        {
            return Err(GeneratorError::InvalidSlopeTable(format!(
                "non-finite point ({mass}, {inv_slope})"
            )));
        }
        if let Some(pair) = masses.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(GeneratorError::InvalidSlopeTable(format!(
                "masses must be strictly increasing, found {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { masses, inv_slopes })
    }

    /// Number of tabulated points
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Inverse slope parameter at a given X mass
    pub fn value_at(&self, mass: Float) -> Float {
        let num_points = self.len();
        if num_points == 1 || mass < 0. {
            return self.inv_slopes[0];
        }

        // Pick the two points to inter/extrapolate from
        let lower = if mass < self.masses[0] {
            0
        } else if mass >= self.masses[num_points - 2] {
            num_points - 2
        } else {
            // First bracketing interval wins
            (0..num_points - 2)
                .find(|&i| self.masses[i] <= mass && mass < self.masses[i + 1])
                .unwrap_or(num_points - 2)
        };
        let upper = lower + 1;

        let (m_1, m_2) = (self.masses[lower], self.masses[upper]);
        let (s_1, s_2) = (self.inv_slopes[lower], self.inv_slopes[upper]);
        s_1 + (s_2 - s_1) / (m_2 - m_1) * (mass - m_1)
    }
}

/// Inverse slope at some mass, defaulting to 1 (GeV/c)^2 without a table
pub fn inv_slope_at(table: Option<&SlopeTable>, mass: Float) -> Float {
    table.map_or(1., |table| table.value_at(mass))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_table() -> SlopeTable {
        SlopeTable::new([(1.0, 2.0), (2.0, 4.0), (3.0, 5.0)]).unwrap()
    }

    fn assert_close(a: Float, b: Float) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn interpolation_and_extrapolation() {
        let table = reference_table();
        assert_close(table.value_at(0.5), 1.0);
        assert_close(table.value_at(1.0), 2.0);
        assert_close(table.value_at(1.5), 3.0);
        assert_close(table.value_at(2.0), 4.0);
        assert_close(table.value_at(2.5), 4.5);
        assert_close(table.value_at(10.0), 12.0);
    }

    #[test]
    fn degenerate_tables() {
        assert_eq!(inv_slope_at(None, 1.3), 1.);

        let single = SlopeTable::new([(1.5, 7.0)]).unwrap();
        assert_eq!(single.value_at(0.1), 7.0);
        assert_eq!(single.value_at(100.), 7.0);
        assert_eq!(inv_slope_at(Some(&single), 3.), 7.0);

        let table = reference_table();
        assert_eq!(table.value_at(-1.), 2.0);
    }

    #[test]
    fn two_point_table_is_a_line() {
        let table = SlopeTable::new([(1.0, 1.0), (2.0, 3.0)]).unwrap();
        assert_close(table.value_at(0.0), -1.0);
        assert_close(table.value_at(1.25), 1.5);
        assert_close(table.value_at(4.0), 7.0);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        assert!(SlopeTable::new(Vec::new()).is_err());
        assert!(SlopeTable::new([(2.0, 1.0), (1.0, 2.0)]).is_err());
        assert!(SlopeTable::new([(1.0, 1.0), (1.0, 2.0)]).is_err());
        assert!(SlopeTable::new([(1.0, Float::NAN)]).is_err());
    }
}

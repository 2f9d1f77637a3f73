//! Variable state and the basis map.

use std::fmt;

/// Simplex status of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarStatus {
    Basic,
    AtLower,
    AtUpper,
    /// `lower == upper`
    Fixed,
    /// Non-basic with both bounds infinite
    Free,
    /// Non-basic strictly between its bounds
    SuperBasic,
}

impl fmt::Display for VarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarStatus::Basic => "B",
            VarStatus::AtLower => "LB",
            VarStatus::AtUpper => "UB",
            VarStatus::Fixed => "FX",
            VarStatus::Free => "FR",
            VarStatus::SuperBasic => "SB",
        };
        write!(f, "{}", s)
    }
}

/// Bounds, values, reduced costs, statuses and flags of all `n + m`
/// variables. Structural columns come first, then one logical per row.
#[derive(Debug, Clone)]
pub struct VariableStore {
    n: usize,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub value: Vec<f64>,
    pub dj: Vec<f64>,
    status: Vec<VarStatus>,
    flagged: Vec<bool>,
}

impl VariableStore {
    pub fn new(n: usize, m: usize) -> Self {
        let total = n + m;
        Self {
            n,
            lower: vec![0.0; total],
            upper: vec![0.0; total],
            value: vec![0.0; total],
            dj: vec![0.0; total],
            status: vec![VarStatus::AtLower; total],
            flagged: vec![false; total],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    #[inline]
    pub fn num_structural(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn status(&self, j: usize) -> VarStatus {
        self.status[j]
    }

    #[inline]
    pub fn set_status(&mut self, j: usize, status: VarStatus) {
        self.status[j] = status;
    }

    pub fn statuses(&self) -> &[VarStatus] {
        &self.status
    }

    #[inline]
    pub fn is_basic(&self, j: usize) -> bool {
        self.status[j] == VarStatus::Basic
    }

    #[inline]
    pub fn is_flagged(&self, j: usize) -> bool {
        self.flagged[j]
    }

    #[inline]
    pub fn set_flagged(&mut self, j: usize) {
        self.flagged[j] = true;
    }

    #[inline]
    pub fn clear_flagged(&mut self, j: usize) {
        self.flagged[j] = false;
    }

    /// Clear every flag; returns how many were set.
    pub fn unflag_all(&mut self) -> usize {
        let count = self.num_flagged();
        self.flagged.fill(false);
        count
    }

    pub fn num_flagged(&self) -> usize {
        self.flagged.iter().filter(|&&f| f).count()
    }

    /// Status a non-basic variable should carry at its current value.
    pub fn classify(&self, j: usize, tolerance: f64) -> VarStatus {
        let (l, u, v) = (self.lower[j], self.upper[j], self.value[j]);
        if l == u {
            VarStatus::Fixed
        } else if l.is_finite() && v <= l + tolerance {
            VarStatus::AtLower
        } else if u.is_finite() && v >= u - tolerance {
            VarStatus::AtUpper
        } else if !l.is_finite() && !u.is_finite() {
            VarStatus::Free
        } else {
            VarStatus::SuperBasic
        }
    }

    /// Reclassify a non-basic variable and snap it onto the bound it sits at.
    pub fn settle_nonbasic(&mut self, j: usize, tolerance: f64) -> VarStatus {
        let status = self.classify(j, tolerance);
        match status {
            VarStatus::AtLower | VarStatus::Fixed => self.value[j] = self.lower[j],
            VarStatus::AtUpper => self.value[j] = self.upper[j],
            _ => {}
        }
        self.status[j] = status;
        status
    }

    /// Place a non-basic variable at a bound (lower when finite).
    pub fn place_at_bound(&mut self, j: usize) {
        let (l, u) = (self.lower[j], self.upper[j]);
        if l == u {
            self.value[j] = l;
            self.status[j] = VarStatus::Fixed;
        } else if l.is_finite() {
            self.value[j] = l;
            self.status[j] = VarStatus::AtLower;
        } else if u.is_finite() {
            self.value[j] = u;
            self.status[j] = VarStatus::AtUpper;
        } else {
            self.value[j] = 0.0;
            self.status[j] = VarStatus::Free;
        }
    }

    /// Room left to move from the current value; infinite for free directions.
    pub fn room(&self, j: usize, direction: f64) -> f64 {
        if direction > 0.0 {
            (self.upper[j] - self.value[j]).max(0.0)
        } else if direction < 0.0 {
            (self.value[j] - self.lower[j]).max(0.0)
        } else {
            0.0
        }
    }

    /// Distance to the nearer bound.
    pub fn distance_to_bound(&self, j: usize) -> f64 {
        (self.value[j] - self.lower[j])
            .min(self.upper[j] - self.value[j])
            .max(0.0)
    }

    /// Bound violation of variable `j` (zero when feasible within `tolerance`).
    pub fn violation(&self, j: usize, tolerance: f64) -> f64 {
        let v = self.value[j];
        if v < self.lower[j] - tolerance {
            self.lower[j] - v
        } else if v > self.upper[j] + tolerance {
            v - self.upper[j]
        } else {
            0.0
        }
    }

    /// First variable with `lower > upper + tolerance`.
    pub fn crossed_bounds(&self, tolerance: f64) -> Option<usize> {
        (0..self.len()).find(|&j| self.lower[j] > self.upper[j] + tolerance)
    }

    pub fn structural_values(&self) -> &[f64] {
        &self.value[..self.n]
    }
}

/// Bijection between rows and basic variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasisMap {
    pivot_variable: Vec<usize>,
    row_of: Vec<Option<usize>>,
}

impl BasisMap {
    /// All-logical basis: row `i` holds variable `n + i`.
    pub fn slack(n: usize, m: usize) -> Self {
        let mut row_of = vec![None; n + m];
        for (i, slot) in row_of.iter_mut().skip(n).enumerate() {
            *slot = Some(i);
        }
        Self {
            pivot_variable: (n..n + m).collect(),
            row_of,
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.pivot_variable.len()
    }

    #[inline]
    pub fn variable(&self, row: usize) -> usize {
        self.pivot_variable[row]
    }

    #[inline]
    pub fn row_of(&self, var: usize) -> Option<usize> {
        self.row_of[var]
    }

    pub fn variables(&self) -> &[usize] {
        &self.pivot_variable
    }

    /// Put `entering` in `row`; returns the variable that left.
    pub fn replace(&mut self, row: usize, entering: usize) -> usize {
        let leaving = self.pivot_variable[row];
        self.row_of[leaving] = None;
        self.row_of[entering] = Some(row);
        self.pivot_variable[row] = entering;
        leaving
    }

    /// Check that rows and basic variables correspond one to one and agree
    /// with the status array.
    pub fn is_consistent(&self, statuses: &[VarStatus]) -> bool {
        if self.row_of.len() != statuses.len() {
            return false;
        }
        for (row, &var) in self.pivot_variable.iter().enumerate() {
            if var >= statuses.len() || self.row_of[var] != Some(row) {
                return false;
            }
            if statuses[var] != VarStatus::Basic {
                return false;
            }
        }
        let basic_count = statuses.iter().filter(|&&s| s == VarStatus::Basic).count();
        let mapped = self.row_of.iter().filter(|r| r.is_some()).count();
        basic_count == self.pivot_variable.len() && mapped == self.pivot_variable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let mut vars = VariableStore::new(4, 0);
        vars.lower = vec![0.0, 1.0, f64::NEG_INFINITY, 0.0];
        vars.upper = vec![10.0, 1.0, f64::INFINITY, 10.0];
        vars.value = vec![1e-9, 1.0, 3.0, 4.0];
        assert_eq!(vars.classify(0, 1e-7), VarStatus::AtLower);
        assert_eq!(vars.classify(1, 1e-7), VarStatus::Fixed);
        assert_eq!(vars.classify(2, 1e-7), VarStatus::Free);
        assert_eq!(vars.classify(3, 1e-7), VarStatus::SuperBasic);

        vars.settle_nonbasic(0, 1e-7);
        assert_eq!(vars.value[0], 0.0);
    }

    #[test]
    fn test_basis_replace_keeps_bijection() {
        let mut vars = VariableStore::new(2, 2);
        let mut basis = BasisMap::slack(2, 2);
        vars.set_status(2, VarStatus::Basic);
        vars.set_status(3, VarStatus::Basic);
        assert!(basis.is_consistent(vars.statuses()));

        let leaving = basis.replace(1, 0);
        assert_eq!(leaving, 3);
        vars.set_status(0, VarStatus::Basic);
        vars.set_status(3, VarStatus::AtLower);
        assert!(basis.is_consistent(vars.statuses()));
        assert_eq!(basis.row_of(0), Some(1));
        assert_eq!(basis.row_of(3), None);
    }

    #[test]
    fn test_inconsistent_status_detected() {
        let vars = VariableStore::new(2, 1);
        let basis = BasisMap::slack(2, 1);
        // Variable 2 is mapped but not marked basic.
        assert!(!basis.is_consistent(vars.statuses()));
    }
}

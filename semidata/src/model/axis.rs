use crate::error::ValidationErrorKind;

/// Ordered breakpoints of a table axis. Always non-empty, finite and
/// strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    values: Vec<f64>,
}

impl Axis {
    pub fn new(values: Vec<f64>) -> Result<Self, ValidationErrorKind> {
        if values.is_empty() {
            return Err(ValidationErrorKind::EmptyAxis);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationErrorKind::NotFinite);
        }
        for (index, pair) in values.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ValidationErrorKind::NotIncreasing {
                    index: index + 1,
                    previous: pair[0],
                    value: pair[1],
                });
            }
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Index of the breakpoint exactly equal to `value`.
    pub fn position(&self, value: f64) -> Option<usize> {
        self.values.iter().position(|v| *v == value)
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_increasing_values() {
        let axis = Axis::new(vec![-20.0, 0.0, 10.0, 20.0]).unwrap();
        assert_eq!(axis.len(), 4);
        assert_eq!(axis.position(10.0), Some(2));
        assert_eq!(axis.first(), -20.0);
        assert_eq!(axis.last(), 20.0);
    }

    #[test]
    fn rejects_empty_axis() {
        assert_eq!(Axis::new(vec![]), Err(ValidationErrorKind::EmptyAxis));
    }

    #[test]
    fn rejects_repeated_breakpoint() {
        let err = Axis::new(vec![25.0, 125.0, 125.0]).unwrap_err();
        assert_eq!(
            err,
            ValidationErrorKind::NotIncreasing {
                index: 2,
                previous: 125.0,
                value: 125.0
            }
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        assert_eq!(
            Axis::new(vec![0.0, f64::NAN]),
            Err(ValidationErrorKind::NotFinite)
        );
    }
}

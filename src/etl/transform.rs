//! Transformer trait for data transformation

use eyre::Result;

/// Transformer trait for converting items one at a time
///
/// # Example
/// ```
/// use mds_extract::etl::Transformer;
/// use eyre::Result;
///
/// struct Upper;
///
/// impl Transformer for Upper {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.to_uppercase())
///     }
/// }
///
/// assert_eq!(Upper.transform("abc".to_string()).unwrap(), "ABC");
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items, stopping at the first failure
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Halve;

    impl Transformer for Halve {
        type Input = i32;
        type Output = i32;

        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            if input % 2 != 0 {
                eyre::bail!("{} is odd", input);
            }
            Ok(input / 2)
        }
    }

    #[test]
    fn test_transform_many() {
        assert_eq!(Halve.transform_many(vec![2, 4, 6]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_transform_many_stops_at_first_error() {
        let err = Halve.transform_many(vec![2, 3, 5]).unwrap_err();
        assert_eq!(err.to_string(), "3 is odd");
    }
}

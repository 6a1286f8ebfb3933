use std::fmt;

/// The value produced by a [`Gauge`] callback.
///
/// Only numeric values are reported. Other values are skipped by the reporter.
#[derive(Clone, Debug, PartialEq)]
pub enum GaugeValue {
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A boolean, which is not numeric.
    Bool(bool),
    /// A string, which is not numeric.
    Text(String),
    /// No value is available.
    None,
}

impl GaugeValue {
    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            GaugeValue::Int(value) => Some(value as f64),
            GaugeValue::UInt(value) => Some(value as f64),
            GaugeValue::Float(value) => Some(value),
            GaugeValue::Bool(_) | GaugeValue::Text(_) | GaugeValue::None => None,
        }
    }
}

macro_rules! impl_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for GaugeValue {
                fn from(value: $source) -> Self {
                    GaugeValue::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from!(Int, i64, i8, i16, i32, i64);
impl_from!(UInt, u64, u8, u16, u32, u64);
impl_from!(Float, f64, f32, f64);
impl_from!(Bool, bool, bool);
impl_from!(Text, String, String, &str);

impl<T: Into<GaugeValue>> From<Option<T>> for GaugeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(GaugeValue::None, Into::into)
    }
}

type GaugeFn = dyn Fn() -> GaugeValue + Send + Sync;

/// A metric whose value is computed by a callback whenever it is read.
pub struct Gauge {
    callback: Box<GaugeFn>,
}

impl Gauge {
    /// Creates a gauge from a callback.
    ///
    /// # Example
    ///
    /// ```
    /// use tally_metrics::{Gauge, GaugeValue};
    ///
    /// let gauge = Gauge::new(|| 42u32);
    /// assert_eq!(gauge.value(), GaugeValue::UInt(42));
    /// ```
    pub fn new<F, V>(callback: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        Self {
            callback: Box::new(move || callback().into()),
        }
    }

    /// Invokes the callback and returns the current value.
    pub fn value(&self) -> GaugeValue {
        (self.callback)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(GaugeValue::from(-3i32).as_f64(), Some(-3.0));
        assert_eq!(GaugeValue::from(7u8).as_f64(), Some(7.0));
        assert_eq!(GaugeValue::from(0.5f32).as_f64(), Some(0.5));
    }

    #[test]
    fn test_non_numeric_values() {
        assert_eq!(GaugeValue::from("up").as_f64(), None);
        assert_eq!(GaugeValue::from(true).as_f64(), None);
        assert_eq!(GaugeValue::from(None::<f64>).as_f64(), None);
        assert_eq!(GaugeValue::from(Some(1.5)).as_f64(), Some(1.5));
    }

    #[test]
    fn test_gauge_reads_callback() {
        let source = Arc::new(AtomicU64::new(1));
        let gauge = Gauge::new({
            let source = Arc::clone(&source);
            move || source.load(Ordering::Relaxed)
        });

        assert_eq!(gauge.value(), GaugeValue::UInt(1));
        source.store(9, Ordering::Relaxed);
        assert_eq!(gauge.value(), GaugeValue::UInt(9));
    }
}

//! Push-style output for decoded records.

/// A decoded record together with the key path it came from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Collected<T> {
    /// Full path of the key the record was decoded from.
    pub key_path: String,

    /// The decoded record.
    pub item: T,
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> Collected<T> {
    /// Serializes the record as a single JSON line.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::error::ArtifactError::format_error(format!("JSON encoding failed: {}", e)))
    }
}

/// Receives decoded records one at a time.
pub trait Sink<T> {
    /// Accepts one record.
    fn push(&mut self, record: Collected<T>);
}

impl<T> Sink<T> for Vec<Collected<T>> {
    fn push(&mut self, record: Collected<T>) {
        Vec::push(self, record);
    }
}

/// Adapts a closure into a [`Sink`].
///
/// ```
/// use reg_artifacts::sink::{Collected, FnSink, Sink};
///
/// let mut paths = Vec::new();
/// let mut sink = FnSink(|record: Collected<u32>| paths.push(record.key_path));
/// sink.push(Collected { key_path: "HKLM\\System".into(), item: 1 });
/// drop(sink);
/// assert_eq!(paths, vec!["HKLM\\System"]);
/// ```
pub struct FnSink<F>(pub F);

impl<T, F: FnMut(Collected<T>)> Sink<T> for FnSink<F> {
    fn push(&mut self, record: Collected<T>) {
        (self.0)(record)
    }
}

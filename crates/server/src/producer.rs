//! The pluggable source of outgoing lines.

/// Produces the next line of text to send.
///
/// Called synchronously once per send iteration, so implementations should be
/// fast relative to the configured delay. Returned lines must not contain
/// `\n` or `\r`; the server replaces offending bytes with spaces.
///
/// Any `FnMut() -> String` closure is a producer:
///
/// ```ignore
/// let mut n = 0;
/// let producer = move || {
///     n += 1;
///     format!("line-{n}")
/// };
/// ```
pub trait LineProducer: Send {
    /// Build the next line, without a trailing delimiter.
    fn build_line(&mut self) -> String;
}

impl<F> LineProducer for F
where
    F: FnMut() -> String + Send,
{
    fn build_line(&mut self) -> String {
        self()
    }
}

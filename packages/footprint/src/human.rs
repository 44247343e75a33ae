use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// A byte count that displays with a binary prefix.
///
/// Counts below 1 KiB are shown as whole bytes, counts below 1 MiB as kilobytes with three
/// decimals and anything larger as megabytes with three decimals.
///
/// # Example
///
/// ```
/// use footprint::HumanSize;
///
/// assert_eq!(HumanSize(512).to_string(), "512 B");
/// assert_eq!(HumanSize(1536).to_string(), "1.500 KB");
/// assert_eq!(HumanSize(3 * 1024 * 1024).to_string(), "3.000 MB");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[expect(
    clippy::exhaustive_structs,
    reason = "a transparent wrapper, the inner value is the whole point"
)]
pub struct HumanSize(pub usize);

impl fmt::Display for HumanSize {
    #[expect(
        clippy::cast_precision_loss,
        reason = "display rounds to three decimals anyway"
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;

        if bytes < KIB {
            write!(f, "{bytes} B")
        } else if bytes < MIB {
            write!(f, "{:.3} KB", bytes as f64 / KIB as f64)
        } else {
            write!(f, "{:.3} MB", bytes as f64 / MIB as f64)
        }
    }
}

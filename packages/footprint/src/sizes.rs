use std::fmt;

use foldhash::{HashMap, HashMapExt};

use crate::{HumanSize, TypeDesc};

/// The result of a scan: bytes attributed to each root and to each type.
///
/// Every byte reachable from the scanned roots is counted exactly once. It is attributed to
/// the first root (in name order) through which it was reached and to the type of the value
/// that was billed for it.
///
/// # Example
///
/// ```
/// use footprint::RootSet;
///
/// let names = vec!["alpha".to_string(), "beta".to_string()];
/// let counts = vec![1_u64, 2, 3];
///
/// let mut roots = RootSet::new();
/// roots.add("names", &names);
/// roots.add("counts", &counts);
///
/// let sizes = roots.scan().unwrap();
///
/// assert_eq!(
///     sizes.total(),
///     sizes.root("names").unwrap() + sizes.root("counts").unwrap()
/// );
/// assert!(sizes.type_size("alloc::string::String").is_some());
///
/// println!("{sizes}");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Sizes {
    by_root: HashMap<String, usize>,
    by_type: HashMap<&'static str, TypeSize>,

    bitmap_bytes: usize,
    bitmap_utilization: f64,
    buffer_spans: usize,
}

impl Sizes {
    pub(crate) fn new() -> Self {
        Self {
            by_root: HashMap::new(),
            by_type: HashMap::new(),
            bitmap_bytes: 0,
            bitmap_utilization: 0.0,
            buffer_spans: 0,
        }
    }

    /// Total bytes across all roots.
    #[must_use]
    pub fn total(&self) -> usize {
        self.by_root.values().fold(0, |sum, bytes| {
            sum.checked_add(*bytes)
                .expect("total exceeds usize - this indicates an unrealistic scenario")
        })
    }

    /// Bytes attributed to the named root, if it was scanned.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<usize> {
        self.by_root.get(name).copied()
    }

    /// Bytes attributed to each scanned root, in no particular order.
    pub fn roots(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_root
            .iter()
            .map(|(name, bytes)| (name.as_str(), *bytes))
    }

    /// Bytes attributed to the named type, if any value of it was billed.
    ///
    /// Type names are as reported by [`std::any::type_name`].
    #[must_use]
    pub fn type_size(&self, name: &str) -> Option<&TypeSize> {
        self.by_type.get(name)
    }

    /// Bytes attributed to each type, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = (&'static str, &TypeSize)> {
        self.by_type.iter().map(|(name, size)| (*name, size))
    }

    /// Bytes of memory used by the visited-memory bitmap of the scan.
    #[must_use]
    pub fn bitmap_bytes(&self) -> usize {
        self.bitmap_bytes
    }

    /// Mean fraction of set bits in the allocated blocks of the visited-memory bitmap.
    #[must_use]
    pub fn bitmap_utilization(&self) -> f64 {
        self.bitmap_utilization
    }

    /// Number of disjoint buffer extents the scan discovered.
    #[must_use]
    pub fn buffer_spans(&self) -> usize {
        self.buffer_spans
    }

    /// Prints the report to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        println!("{self}");
    }

    pub(crate) fn add_value(&mut self, root: &str, desc: &TypeDesc, bytes: usize) {
        add_to(&mut self.by_root, root, bytes);

        let type_size = self.by_type.entry(desc.name()).or_default();
        add_to(&mut type_size.by_root, root, bytes);
        type_size.total = type_size
            .total
            .checked_add(bytes)
            .expect("type total exceeds usize - this indicates an unrealistic scenario");
    }

    pub(crate) fn set_diagnostics(&mut self, bitmap_bytes: usize, utilization: f64, spans: usize) {
        self.bitmap_bytes = bitmap_bytes;
        self.bitmap_utilization = utilization;
        self.buffer_spans = spans;
    }
}

fn add_to(totals: &mut HashMap<String, usize>, root: &str, bytes: usize) {
    if let Some(total) = totals.get_mut(root) {
        *total = total
            .checked_add(bytes)
            .expect("root total exceeds usize - this indicates an unrealistic scenario");
    } else {
        totals.insert(root.to_owned(), bytes);
    }
}

impl fmt::Display for Sizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const TOTAL: &str = "TOTAL";

        let mut lines: Vec<_> = self.types().map(|(name, size)| (name, size.total)).collect();
        lines.sort_by(|(a_name, a_bytes), (b_name, b_bytes)| {
            b_bytes.cmp(a_bytes).then_with(|| a_name.cmp(b_name))
        });

        let width = lines
            .iter()
            .map(|(name, _)| name.len())
            .fold(TOTAL.len(), usize::max);

        writeln!(f, "{TOTAL:<width$} {}", HumanSize(self.total()))?;

        for (name, bytes) in lines {
            writeln!(f, "{name:<width$} {}", HumanSize(bytes))?;
        }

        Ok(())
    }
}

/// Bytes attributed to one type.
#[derive(Clone, Debug, Default)]
pub struct TypeSize {
    total: usize,
    by_root: HashMap<String, usize>,
}

impl TypeSize {
    /// Total bytes billed to the type across all roots.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Bytes billed to the type under the named root.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<usize> {
        self.by_root.get(name).copied()
    }

    /// Bytes billed to the type under each root, in no particular order.
    pub fn roots(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_root
            .iter()
            .map(|(name, bytes)| (name.as_str(), *bytes))
    }
}

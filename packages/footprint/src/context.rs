//! The graph walker.
//!
//! Every scan function returns the "extra" bytes of the value it scanned: memory owned by the
//! value outside of its in-place representation, such as the buffer of a vector. The in-place
//! size itself is accounted for by whoever owns the value in place.

use foldhash::{HashMap, HashMapExt};
use smallvec::SmallVec;
use tracing::trace;

use crate::bitmap::Bitmap;
use crate::spans::SpanIndex;
use crate::{
    Address, ChannelView, Elements, Entries, Error, Fields, MemSize, Result, Sizes, TypeDesc,
    TypeInfoCache, View,
};

/// Remaining stack below which a nested scan continues on a new stack segment.
const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each stack segment allocated for deep object graphs.
const STACK_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// State of one scan over any number of roots.
///
/// Cycles and shared memory are handled by two mechanisms:
///
/// * `seen` marks every byte that has been accounted for. A value whose first byte is marked
///   is skipped entirely.
/// * `visiting` holds the types of the values currently on the scan stack, per address, so a
///   cycle back to a value that is still being scanned is cut. An aggregate shares its address
///   with its first field, so several values can be on the stack at the same address.
///
/// Buffers shared between several views are additionally tracked in `buffers`, which tells
/// which parts of a newly seen buffer were already known.
#[derive(Debug)]
pub(crate) struct ScanContext<'c> {
    types: &'c TypeInfoCache,

    seen: Bitmap,
    visiting: HashMap<Address, SmallVec<[TypeDesc; 2]>>,
    buffers: SpanIndex,

    sizes: Sizes,
    current_root: String,
}

impl<'c> ScanContext<'c> {
    pub(crate) fn new(types: &'c TypeInfoCache) -> Self {
        Self {
            types,
            seen: Bitmap::new(),
            visiting: HashMap::new(),
            buffers: SpanIndex::new(),
            sizes: Sizes::new(),
            current_root: String::new(),
        }
    }

    /// Scans everything reachable from `root` that has not yet been billed to an earlier root.
    pub(crate) fn scan_root(&mut self, name: &str, root: &dyn MemSize) -> Result<()> {
        name.clone_into(&mut self.current_root);

        let addr = Address::of(root);
        trace!(root = name, %addr, type_name = root.dyn_type_desc().name(), "scanning root");

        self.scan(addr, root, true)?;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Sizes {
        self.sizes.set_diagnostics(
            self.seen.size(),
            self.seen.utilization(),
            self.buffers.len(),
        );

        self.sizes
    }

    /// Scans a value located at `addr`, or at no stable address if `addr` is invalid.
    ///
    /// If `bill` is set, the value's size plus any extra memory it owns is billed to the current
    /// root under the type of the value.
    ///
    /// The walk recurses once per level of the object graph. Graphs can be arbitrarily deep, so
    /// the stack is extended on the heap whenever it is about to run out.
    fn scan(&mut self, addr: Address, value: &dyn MemSize, bill: bool) -> Result<usize> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.scan_value(addr, value, bill)
        })
    }

    fn scan_value(&mut self, addr: Address, value: &dyn MemSize, bill: bool) -> Result<usize> {
        let desc = value.dyn_type_desc();

        if addr.is_valid() {
            if self.seen.is_marked(addr.get()) {
                return Ok(0);
            }

            // A value at an address already on the stack is only a revisit if it has the type
            // of a value being visited there. A pointer that shares the address of its enclosing
            // struct, such as a first field of type `Box<Self>`, points elsewhere.
            let revisit = self
                .visiting
                .get(&addr)
                .is_some_and(|active| active.contains(&desc));

            if revisit {
                return Ok(0);
            }

            self.visiting.entry(addr).or_default().push(desc);
        }

        let extra = if self.types.needs_scan(&desc) {
            self.scan_content(addr, value, &desc)
        } else {
            Ok(0)
        };

        if addr.is_valid() {
            self.leave(addr);
            self.seen.mark_range(addr.get(), desc.size());
        }

        let extra = extra?;

        if bill {
            let bytes = desc
                .size()
                .checked_add(extra)
                .expect("value size exceeds usize - this indicates an unrealistic scenario");

            self.sizes.add_value(&self.current_root, &desc, bytes);
        }

        Ok(extra)
    }

    fn leave(&mut self, addr: Address) {
        let active = self
            .visiting
            .get_mut(&addr)
            .expect("every scanned address is on the stack until scanning it completes");

        active.pop();

        if active.is_empty() {
            self.visiting.remove(&addr);
        }
    }

    fn scan_content(&mut self, addr: Address, value: &dyn MemSize, desc: &TypeDesc) -> Result<usize> {
        let mut result = None;

        value.describe(&mut |view| {
            // Only the first view counts.
            if result.is_none() {
                result = Some(self.scan_view(addr, value, desc, view));
            }
        });

        result.unwrap_or_else(|| {
            Err(Error::MissingView {
                type_name: desc.name(),
            })
        })
    }

    fn scan_view(
        &mut self,
        addr: Address,
        value: &dyn MemSize,
        desc: &TypeDesc,
        view: View<'_>,
    ) -> Result<usize> {
        if view.kind() != desc.kind() {
            return Err(Error::KindMismatch {
                type_name: desc.name(),
                declared: desc.kind(),
                observed: view.kind(),
            });
        }

        match view {
            View::Scalar | View::Function => Ok(0),
            View::Pointer(target) => {
                if let Some(target) = target {
                    self.scan(Address::of(target), target, true)?;
                }

                // The target is billed under its own type.
                Ok(0)
            }
            View::Interface(payload) => self.scan_interface(payload),
            View::String { bytes } => Ok(bytes),
            View::Slice(elements) => self.scan_slice(&elements),
            View::Array(elements) => self.scan_array(addr, &elements),
            View::Map(entries) => self.scan_map(entries),
            View::Struct(fields) => self.scan_struct(addr, value, desc, &fields),
            View::Channel(channel) => Ok(channel_bytes(&channel)),
        }
    }

    fn scan_interface(&mut self, payload: Option<&dyn MemSize>) -> Result<usize> {
        let Some(payload) = payload else {
            return Ok(0);
        };

        let nested = self.scan(Address::INVALID, payload, false)?;

        // The payload of an interface lives outside the interface value itself, unless the
        // payload is just an indirection.
        let payload_desc = payload.dyn_type_desc();
        let inline = if self.types.is_reference_like(&payload_desc) {
            0
        } else {
            payload_desc.size()
        };

        Ok(nested
            .checked_add(inline)
            .expect("interface size exceeds usize - this indicates an unrealistic scenario"))
    }

    fn scan_struct(
        &mut self,
        addr: Address,
        value: &dyn MemSize,
        desc: &TypeDesc,
        fields: &Fields<'_>,
    ) -> Result<usize> {
        let base = Address::of(value);
        let mut extra = 0_usize;

        for field in fields.iter() {
            let field_desc = field.dyn_type_desc();

            let offset = Address::of(field)
                .distance_from(base)
                .filter(|offset| {
                    offset
                        .checked_add(field_desc.size())
                        .is_some_and(|end| end <= desc.size())
                })
                .ok_or(Error::FieldOutOfBounds {
                    type_name: desc.name(),
                    field_type: field_desc.name(),
                })?;

            let field_extra = self.scan(addr.offset(offset), field, false)?;
            extra = extra
                .checked_add(field_extra)
                .expect("struct size exceeds usize - this indicates an unrealistic scenario");
        }

        Ok(extra)
    }

    fn scan_slice(&mut self, elements: &Elements<'_>) -> Result<usize> {
        let (count, extra) = self.scan_array_mem(elements.base(), elements)?;

        Ok(count
            .checked_mul(elements.element_desc().size())
            .and_then(|bytes| bytes.checked_add(extra))
            .expect("slice size exceeds usize - this indicates an unrealistic scenario"))
    }

    fn scan_array(&mut self, addr: Address, elements: &Elements<'_>) -> Result<usize> {
        // Array elements are part of the in-place size of the array, only what they own counts.
        let (_, extra) = self.scan_array_mem(addr, elements)?;
        Ok(extra)
    }

    /// Scans the elements of a buffer at `base`.
    ///
    /// Returns the number of elements not previously accounted for and the extra bytes owned by
    /// those elements. Without a stable base address, every element counts.
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "element offsets stay inside a buffer that exists in memory"
    )]
    fn scan_array_mem(&mut self, base: Address, elements: &Elements<'_>) -> Result<(usize, usize)> {
        let element_desc = elements.element_desc();
        let element_size = element_desc.size();

        if element_size == 0 {
            return Ok((0, 0));
        }

        let scan_elements = self.types.needs_scan(&element_desc);
        let capacity = elements.capacity();
        let len = elements.len();

        if !base.is_valid() {
            let mut extra = 0;

            if scan_elements {
                for index in 0..len {
                    if let Some(element) = elements.get(index) {
                        extra += self.scan(Address::INVALID, element, false)?;
                    }
                }
            }

            return Ok((capacity, extra));
        }

        let buffer_len = element_size
            .checked_mul(capacity)
            .expect("buffer size exceeds usize - the buffer cannot exist");

        let absorbed = self.buffers.insert(base.get(), buffer_len);

        // A buffer never seen before, in whole or in part, that owns nothing further can be
        // accounted for in one go.
        if !scan_elements && absorbed.is_empty() && !self.seen.any_marked(base.get(), buffer_len)
        {
            self.seen.mark_range(base.get(), buffer_len);
            return Ok((capacity, 0));
        }

        let mut count = 0;
        let mut extra = 0;

        for index in 0..capacity {
            let addr = base.offset(index * element_size);

            if absorbed.contains(addr.get()) || self.seen.is_marked(addr.get()) {
                continue;
            }

            // Spare capacity is charged for but holds no values.
            if scan_elements && index < len {
                if let Some(element) = elements.get(index) {
                    extra += self.scan(addr, element, false)?;
                }
            }

            self.seen.mark_range(addr.get(), element_size);
            count += 1;
        }

        Ok((count, extra))
    }

    fn scan_map(&mut self, entries: Entries<'_>) -> Result<usize> {
        let len = entries.len();
        let key_desc = entries.key_desc();
        let value_desc = entries.value_desc();

        let inline = key_desc
            .size()
            .checked_add(value_desc.size())
            .and_then(|entry| entry.checked_mul(len))
            .expect("map size exceeds usize - this indicates an unrealistic scenario");

        if !self.types.needs_scan(&key_desc) && !self.types.needs_scan(&value_desc) {
            return Ok(inline);
        }

        // Keys and values have no stable address as far as the scan is concerned.
        let mut extra = inline;

        for (key, value) in entries.into_entries() {
            let key_extra = self.scan(Address::INVALID, key, false)?;
            let value_extra = self.scan(Address::INVALID, value, false)?;

            extra = extra
                .checked_add(key_extra)
                .and_then(|extra| extra.checked_add(value_extra))
                .expect("map size exceeds usize - this indicates an unrealistic scenario");
        }

        Ok(extra)
    }
}

fn channel_bytes(channel: &ChannelView) -> usize {
    channel
        .capacity()
        .checked_mul(channel.element_desc().size())
        .expect("channel buffer exceeds usize - this indicates an unrealistic scenario")
}

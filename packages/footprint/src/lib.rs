#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Measures how much memory is retained by the values reachable from a set of named roots.
//!
//! A scan walks the object graph below each root, following owned buffers, boxes, reference
//! counted pointers, map entries and so on. Every byte is counted once, even when it is
//! reachable through multiple paths, and cycles are cut. The result attributes each byte to
//! the root it was first reached from and to the type of the value that owns it.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms for
//! high-performance hardware-aware programming in Rust.
//!
//! # Walking values
//!
//! Values take part in a scan by implementing [`MemSize`]. Implementations are provided for
//! common standard library types, `parking_lot` locks and `crossbeam` channels. Your own types
//! can implement the trait by hand or via [`impl_mem_size!`].
//!
//! Values behind locks and `RefCell` are inspected only if they can be accessed without
//! waiting. Contents that are exclusively held elsewhere during a scan are skipped.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::rc::Rc;
//!
//! use footprint::RootSet;
//!
//! struct Document {
//!     title: String,
//!     body: Vec<u8>,
//! }
//!
//! footprint::impl_mem_size!(Document { title, body });
//!
//! let shared = Rc::new(Document {
//!     title: "shared".to_string(),
//!     body: vec![0; 4096],
//! });
//!
//! let mut by_id = HashMap::new();
//! by_id.insert(1_u32, Rc::clone(&shared));
//! by_id.insert(2_u32, Rc::clone(&shared));
//!
//! let recent = vec![Rc::clone(&shared)];
//!
//! let mut roots = RootSet::new();
//! roots.add("by_id", &by_id);
//! roots.add("recent", &recent);
//!
//! let sizes = roots.scan().unwrap();
//!
//! // The document is reachable from both roots but billed once, to the first root by name.
//! assert!(sizes.root("by_id").unwrap() > 4096);
//! assert!(sizes.root("recent").unwrap() < 4096);
//!
//! println!("{sizes}");
//! ```

mod address;
mod bitmap;
mod context;
mod error;
mod human;
mod impls_channel;
mod impls_std;
mod impls_sync;
mod mem_size;
mod roots;
mod sizes;
mod spans;
mod type_desc;
mod type_info;
mod view;

pub use address::*;
pub use error::*;
pub use human::*;
pub use mem_size::*;
pub use roots::*;
pub use sizes::*;
pub use type_desc::*;
pub use type_info::*;
pub use view::*;

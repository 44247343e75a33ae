//! `MemSize` for `crossbeam` channels.
//!
//! Only the buffer of a channel is charged. A bounded channel allocates room for its capacity
//! up front, while an unbounded channel only holds what is currently queued. Queued messages
//! are never walked, as that is not possible without receiving them.
//!
//! The buffer is shared by every endpoint of the channel, but an endpoint cannot tell where the
//! buffer lives, so it has no address to deduplicate on. Each `Sender` and each `Receiver`
//! therefore charges the whole buffer. A scan that reaches several endpoints of one channel
//! counts its buffer once per endpoint.

use crossbeam::channel::{Receiver, Sender};

use crate::{ChannelView, Kind, MemSize, TypeDesc, View};

fn buffer_len(capacity: Option<usize>, queued: usize) -> usize {
    capacity.unwrap_or(queued)
}

/// Charges the whole buffer of the channel, even if other endpoints of the same channel are
/// also reachable.
impl<T: MemSize> MemSize for Sender<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Channel)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let len = buffer_len(self.capacity(), self.len());
        visit(View::Channel(ChannelView::new::<T>(len)));
    }
}

/// Charges the whole buffer of the channel, even if other endpoints of the same channel are
/// also reachable.
impl<T: MemSize> MemSize for Receiver<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Channel)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let len = buffer_len(self.capacity(), self.len());
        visit(View::Channel(ChannelView::new::<T>(len)));
    }
}

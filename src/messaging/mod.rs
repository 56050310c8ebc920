//! Typed publish/subscribe messaging.
//!
//! Every model communicates through named messages held in a per-process
//! [`MessageBus`]. A message is a fixed-layout record of `f64` elements with a
//! ring buffer of historical writes. Reads are time-qualified: a read at time
//! `t` returns the latest write visible at or before `t`, or a zero payload if
//! nothing has been written yet.
//!
//! # Declaring a message type
//!
//! ```
//! use orrery::message;
//! use orrery::messaging::Message;
//!
//! message! {
//!     /// Example record.
//!     pub struct WheelSpeedMsg {
//!         speeds: [f64; 4],
//!         valid: bool,
//!     }
//! }
//!
//! assert_eq!(WheelSpeedMsg::size(), 5);
//! assert_eq!(WheelSpeedMsg::default().speeds, [0.0; 4]);
//! ```

pub mod bridge;
pub mod bus;
pub mod logger;
pub mod payloads;
pub mod ring;

pub use bridge::{InterfaceBridge, TimeAlignment};
pub use bus::{MessageBus, MessageHeader, MessageId, MessageInfo};
pub use logger::MessageLogger;
pub use payloads::*;

use std::ops::Range;

/// Default ring depth, enough to double-buffer across processes.
pub const DEFAULT_BUFFER_COUNT: usize = 2;

/// Name and element count of one field of a message layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: &'static str,
    pub len: usize,
}

/// Returns the element range occupied by `field` in `layout`.
pub fn field_range(layout: &[FieldDesc], field: &str) -> Option<Range<usize>> {
    let mut offset = 0;
    for desc in layout {
        if desc.name == field {
            return Some(offset..offset + desc.len);
        }
        offset += desc.len;
    }
    None
}

/// A value that occupies a fixed number of `f64` elements.
pub trait Field: Sized {
    const LEN: usize;

    fn put(&self, out: &mut [f64]);

    fn get(src: &[f64]) -> Self;
}

impl Field for f64 {
    const LEN: usize = 1;

    fn put(&self, out: &mut [f64]) {
        out[0] = *self;
    }

    fn get(src: &[f64]) -> Self {
        src[0]
    }
}

impl Field for bool {
    const LEN: usize = 1;

    fn put(&self, out: &mut [f64]) {
        out[0] = if *self { 1.0 } else { 0.0 };
    }

    fn get(src: &[f64]) -> Self {
        src[0] != 0.0
    }
}

impl Field for u32 {
    const LEN: usize = 1;

    fn put(&self, out: &mut [f64]) {
        out[0] = *self as f64;
    }

    fn get(src: &[f64]) -> Self {
        src[0].max(0.0) as u32
    }
}

impl<const N: usize> Field for [f64; N] {
    const LEN: usize = N;

    fn put(&self, out: &mut [f64]) {
        out.copy_from_slice(self);
    }

    fn get(src: &[f64]) -> Self {
        let mut values = [0.0; N];
        values.copy_from_slice(src);
        values
    }
}

/// A fixed-layout message record.
///
/// Implemented through the [`message!`](crate::message) macro. `Default` is
/// the zero payload returned for messages that were never written.
pub trait Message: Clone + Default + Send + 'static {
    /// Type name checked when subscribing.
    const TYPE_NAME: &'static str;

    /// Field names and element counts in storage order.
    fn layout() -> &'static [FieldDesc];

    /// Total element count.
    fn size() -> usize {
        Self::layout().iter().map(|f| f.len).sum()
    }

    /// Writes the record into `out`, which has exactly `size()` elements.
    fn encode(&self, out: &mut [f64]);

    /// Reads a record from `src`, which has exactly `size()` elements.
    fn decode(src: &[f64]) -> Self;

    /// Encodes into a freshly allocated buffer.
    fn to_vec(&self) -> Vec<f64> {
        let mut out = vec![0.0; Self::size()];
        self.encode(&mut out);
        out
    }
}

/// Declares a message record and implements [`Message`] for it.
///
/// Fields may be `f64`, `bool`, `u32` or `[f64; N]`.
#[macro_export]
macro_rules! message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::messaging::Message for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn layout() -> &'static [$crate::messaging::FieldDesc] {
                const LAYOUT: &[$crate::messaging::FieldDesc] = &[
                    $(
                        $crate::messaging::FieldDesc {
                            name: stringify!($field),
                            len: <$ty as $crate::messaging::Field>::LEN,
                        },
                    )*
                ];
                LAYOUT
            }

            #[allow(unused_assignments, unused_variables, unused_mut)]
            fn encode(&self, out: &mut [f64]) {
                let mut offset = 0;
                $(
                    let len = <$ty as $crate::messaging::Field>::LEN;
                    $crate::messaging::Field::put(&self.$field, &mut out[offset..offset + len]);
                    offset += len;
                )*
            }

            #[allow(unused_assignments, unused_variables, unused_mut)]
            fn decode(src: &[f64]) -> Self {
                let mut offset = 0;
                $(
                    let len = <$ty as $crate::messaging::Field>::LEN;
                    let $field = <$ty as $crate::messaging::Field>::get(&src[offset..offset + len]);
                    offset += len;
                )*
                Self { $( $field, )* }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                let zeros = vec![0.0; <$name as $crate::messaging::Message>::size()];
                <$name as $crate::messaging::Message>::decode(&zeros)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::message! {
        struct SampleMsg {
            scalar: f64,
            flag: bool,
            count: u32,
            vector: [f64; 3],
        }
    }

    #[test]
    fn test_layout_and_size() {
        assert_eq!(SampleMsg::size(), 6);
        assert_eq!(SampleMsg::TYPE_NAME, "SampleMsg");
        assert_eq!(field_range(SampleMsg::layout(), "vector"), Some(3..6));
        assert_eq!(field_range(SampleMsg::layout(), "missing"), None);
    }

    #[test]
    fn test_encode_layout_order() {
        let msg = SampleMsg {
            scalar: 2.5,
            flag: true,
            count: 7,
            vector: [1.0, 2.0, 3.0],
        };
        assert_eq!(msg.to_vec(), vec![2.5, 1.0, 7.0, 1.0, 2.0, 3.0]);
        assert_eq!(SampleMsg::decode(&msg.to_vec()), msg);
    }

    #[test]
    fn test_default_is_zero_payload() {
        let msg = SampleMsg::default();
        assert_eq!(msg.to_vec(), vec![0.0; 6]);
        assert!(!msg.flag);
    }
}

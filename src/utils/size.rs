//! Approximate value sizes for cache accounting
//!
//! Estimates count payload bytes, not allocator overhead: a `String` is
//! its UTF-8 length, a `Vec<u8>` is its length, a number is its width.
//! The figure only has to be stable for a given value, since a cache
//! entry's size is fixed when it is inserted.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::mem::size_of;
use std::rc::Rc;
use std::sync::Arc;

/// Approximate in-memory footprint of a value, in bytes
pub trait SizeEstimate {
    fn estimated_size(&self) -> usize;
}

macro_rules! fixed_width {
    ($($t:ty),* $(,)?) => {
        $(
            impl SizeEstimate for $t {
                #[inline]
                fn estimated_size(&self) -> usize {
                    size_of::<$t>()
                }
            }
        )*
    };
}

fixed_width!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, ());

impl SizeEstimate for str {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl SizeEstimate for String {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl<T: SizeEstimate> SizeEstimate for [T] {
    fn estimated_size(&self) -> usize {
        self.iter().map(SizeEstimate::estimated_size).sum()
    }
}

impl<T: SizeEstimate> SizeEstimate for Vec<T> {
    fn estimated_size(&self) -> usize {
        self.as_slice().estimated_size()
    }
}

impl<T: SizeEstimate> SizeEstimate for VecDeque<T> {
    fn estimated_size(&self) -> usize {
        self.iter().map(SizeEstimate::estimated_size).sum()
    }
}

impl<T: SizeEstimate> SizeEstimate for Option<T> {
    fn estimated_size(&self) -> usize {
        self.as_ref().map_or(0, SizeEstimate::estimated_size)
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for &T {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Box<T> {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Arc<T> {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Rc<T> {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl<A: SizeEstimate, B: SizeEstimate> SizeEstimate for (A, B) {
    fn estimated_size(&self) -> usize {
        self.0.estimated_size() + self.1.estimated_size()
    }
}

impl<A: SizeEstimate, B: SizeEstimate, C: SizeEstimate> SizeEstimate for (A, B, C) {
    fn estimated_size(&self) -> usize {
        self.0.estimated_size() + self.1.estimated_size() + self.2.estimated_size()
    }
}

impl<K: SizeEstimate, V: SizeEstimate, S> SizeEstimate for HashMap<K, V, S> {
    fn estimated_size(&self) -> usize {
        self.iter()
            .map(|(k, v)| k.estimated_size() + v.estimated_size())
            .sum()
    }
}

impl<K: SizeEstimate, V: SizeEstimate> SizeEstimate for BTreeMap<K, V> {
    fn estimated_size(&self) -> usize {
        self.iter()
            .map(|(k, v)| k.estimated_size() + v.estimated_size())
            .sum()
    }
}

/// JSON values are measured by their compact serialized length.
impl SizeEstimate for serde_json::Value {
    fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_size_is_utf8_length() {
        assert_eq!("hello".estimated_size(), 5);
        assert_eq!(String::from("héllo").estimated_size(), 6);
    }

    #[test]
    fn test_numeric_sizes() {
        assert_eq!(1u8.estimated_size(), 1);
        assert_eq!(1u64.estimated_size(), 8);
        assert_eq!(1.0f32.estimated_size(), 4);
    }

    #[test]
    fn test_collection_sizes() {
        assert_eq!(vec![0u8; 40].estimated_size(), 40);
        assert_eq!(vec![1u32, 2, 3].estimated_size(), 12);
        assert_eq!(vec!["ab".to_string(), "cde".to_string()].estimated_size(), 5);

        let mut map = HashMap::new();
        map.insert("k".to_string(), 7u16);
        assert_eq!(map.estimated_size(), 3);
    }

    #[test]
    fn test_wrapper_sizes() {
        assert_eq!(Some(vec![0u8; 4]).estimated_size(), 4);
        assert_eq!(None::<String>.estimated_size(), 0);
        assert_eq!(Arc::new("xyz".to_string()).estimated_size(), 3);
        assert_eq!(Box::new(0u32).estimated_size(), 4);
        assert_eq!(("ab".to_string(), 1u8).estimated_size(), 3);
    }

    #[test]
    fn test_json_size() {
        let value = json!({"a": 1});
        assert_eq!(value.estimated_size(), r#"{"a":1}"#.len());
    }
}

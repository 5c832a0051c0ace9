//! Fixed-width index keys and the orderings used to compare them.

use std::cmp::Ordering;
use std::fmt;

/// A key that can be stored in a B+ tree page.
///
/// Every key of a given type occupies exactly `ENCODED_LEN` bytes on the
/// page. The encoding does not need to preserve order: nodes decode keys
/// and compare them with a [`KeyComparator`].
pub trait IndexKey: Copy + Send + Sync + fmt::Debug + 'static {
    /// Width of one encoded key in bytes.
    const ENCODED_LEN: usize;

    /// Write the key into `buf[..ENCODED_LEN]`.
    fn encode_into(&self, buf: &mut [u8]);

    /// Read a key from `buf[..ENCODED_LEN]`.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! impl_index_key_for_int {
    ($($ty:ty),*) => {
        $(
            impl IndexKey for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode_into(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_LEN].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode_from(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::ENCODED_LEN]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_index_key_for_int!(u32, u64, i32, i64);

impl<const N: usize> IndexKey for [u8; N] {
    const ENCODED_LEN: usize = N;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(self);
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        let mut key = [0u8; N];
        key.copy_from_slice(&buf[..N]);
        key
    }
}

/// A total order over keys, supplied when the tree is built.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<K: Ord> KeyComparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys with a closure.
///
/// # Example
/// ```
/// use pagetree::index::btree::{FnComparator, KeyComparator};
///
/// let reverse = FnComparator(|a: &u64, b: &u64| b.cmp(a));
/// assert!(reverse.compare(&1, &2).is_gt());
/// ```
#[derive(Clone, Copy)]
pub struct FnComparator<F>(pub F);

impl<K, F> KeyComparator<K> for FnComparator<F>
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

impl<F> fmt::Debug for FnComparator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnComparator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_encoded<K: IndexKey>(key: K) -> K {
        let mut buf = vec![0u8; K::ENCODED_LEN];
        key.encode_into(&mut buf);
        K::decode_from(&buf)
    }

    #[test]
    fn test_encoded_widths() {
        assert_eq!(<u32 as IndexKey>::ENCODED_LEN, 4);
        assert_eq!(<i64 as IndexKey>::ENCODED_LEN, 8);
        assert_eq!(<[u8; 16] as IndexKey>::ENCODED_LEN, 16);
    }

    #[test]
    fn test_signed_keys_keep_sign() {
        assert_eq!(decode_encoded(-42i32), -42);
        assert_eq!(decode_encoded(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_byte_array_key() {
        let key = *b"user:0001";
        assert_eq!(decode_encoded(key), key);
    }

    #[test]
    fn test_encode_ignores_trailing_bytes() {
        let mut buf = [0xAAu8; 12];
        7u32.encode_into(&mut buf);
        assert_eq!(&buf[..4], &7u32.to_le_bytes());
        assert_eq!(buf[4], 0xAA);
        assert_eq!(u32::decode_from(&buf), 7);
    }

    #[test]
    fn test_natural_and_closure_orders() {
        assert_eq!(NaturalOrder.compare(&1u64, &2u64), Ordering::Less);
        assert_eq!(NaturalOrder.compare(&-1i32, &-1i32), Ordering::Equal);

        let reverse = FnComparator(|a: &u64, b: &u64| b.cmp(a));
        assert_eq!(reverse.compare(&1, &2), Ordering::Greater);
    }
}

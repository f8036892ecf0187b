use std::fmt;

/// バイト列用拡張トレイト。
pub trait BytesExt {
    /// 先頭からビッグエンディアンで16ビット符号無し整数を読み込む。
    ///
    /// 事前に長さが2以上あると分かるようなコードであれば最適化が期待できる。
    fn read_be_16(&self) -> u16;

    /// 先頭からビッグエンディアンで24ビット符号無し整数を読み込む。
    fn read_be_24(&self) -> u32;

    /// 先頭からビッグエンディアンで32ビット符号無し整数を読み込む。
    ///
    /// 事前に長さが4以上あると分かるようなコードであれば最適化が期待できる。
    fn read_be_32(&self) -> u32;
}

impl BytesExt for [u8] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        u16::from_be_bytes(self[..2].try_into().unwrap())
    }

    #[inline]
    fn read_be_24(&self) -> u32 {
        u32::from_be_bytes([0, self[0], self[1], self[2]])
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        u32::from_be_bytes(self[..4].try_into().unwrap())
    }
}

/// 要素数`N`のヒープに確保される配列を、`f`を呼び出した戻り値で生成する。
pub fn boxed_array<T, const N: usize, F>(f: F) -> Box<[T; N]>
where
    F: FnMut(usize) -> T,
{
    let slice = (0..N).map(f).collect::<Vec<T>>().into_boxed_slice();

    // Safety: 要素数の分かっている`Box<[T]>`から`Box<[T; N]>`への変換でしかない
    unsafe { Box::from_raw(Box::into_raw(slice) as *mut [T; N]) }
}

/// `Debug`で16進数表記するためのラッパー。
pub struct UpperHex<T>(pub T);

impl<T: fmt::UpperHex> fmt::Debug for UpperHex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// 条件が常に一致しているものとして事前条件を示す。
///
/// 後続する処理ではこの条件が満たされることを前提とした最適化が行われる可能性がある。
///
/// # Safety
///
/// この条件が満たされない場合の動作は未定義である。
macro_rules! assume {
    ($cond:expr) => {{
        if cfg!(debug_assertions) {
            assert!($cond);
        } else if !($cond) {
            std::hint::unreachable_unchecked();
        }
    }};
}

/// 整数の新型に`Display`や各種16進数表記などの書式化を実装する。
macro_rules! delegate_fmt {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.get(), f)
            }
        }

        impl std::fmt::Binary for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Binary::fmt(&self.get(), f)
            }
        }

        impl std::fmt::Octal for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Octal::fmt(&self.get(), f)
            }
        }

        impl std::fmt::LowerHex for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::LowerHex::fmt(&self.get(), f)
            }
        }

        impl std::fmt::UpperHex for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::UpperHex::fmt(&self.get(), f)
            }
        }
    };
}

// マクロはpub useできない
pub(crate) use {assume, delegate_fmt};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_be() {
        assert_eq!(b"\x12\x34\x56\x78".read_be_16(), 0x1234);
        assert_eq!(b"\x12\x34\x56\x78".read_be_24(), 0x123456);
        assert_eq!(b"\x12\x34\x56\x78\x9A\xBC\xDE".read_be_32(), 0x12345678);
    }

    #[test]
    fn test_boxed_array() {
        assert_eq!(
            boxed_array::<Option<[u8; 64]>, 8192, _>(|_| None),
            (0..8192)
                .map(|_| None)
                .collect::<Vec<Option<[u8; 64]>>>()
                .try_into()
                .unwrap(),
        );
    }
}

//! 記述子に関する基礎の型。
//!
//! PSIPのテーブルでは記述子ループ長のビット数がテーブルごとに異なるため、
//! [`DescriptorBlock::read_masked`]でビット数を指定して読み取る。

use std::fmt;

use crate::utils::BytesExt;

/// パース前の記述子。
pub struct RawDescriptor<'a> {
    /// 記述子のタグ。
    pub tag: u8,

    /// 記述子の内容。
    pub data: &'a [u8],
}

impl<'a> fmt::Debug for RawDescriptor<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct PrintBytes<'a>(&'a [u8]);
        impl<'a> fmt::Debug for PrintBytes<'a> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} bytes", self.0.len())
            }
        }

        f.debug_struct("RawDescriptor")
            .field("tag", &crate::utils::UpperHex(self.tag))
            .field("data", &PrintBytes(self.data))
            .finish()
    }
}

/// 複数の記述子からなる記述子群。
#[derive(Clone, PartialEq, Eq)]
pub struct DescriptorBlock<'a>(&'a [u8]);

impl<'a> DescriptorBlock<'a> {
    /// 空の記述子群。
    pub const EMPTY: DescriptorBlock<'static> = DescriptorBlock(&[]);

    /// `data`から`length`バイト分の記述子群を読み取り後続データと共に返す。
    ///
    /// データ長が不足している場合は`None`を返す。
    // `length`が`u16`なのは規格上`u16`以上の長さになることがなく、
    // 呼び出し側でのキャストが無意味であるため。
    pub fn read_with_len(data: &'a [u8], length: u16) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        let block = data.get(..length as usize)?;
        Some((DescriptorBlock(block), &data[length as usize..]))
    }

    /// `data`の先頭2バイトから下位`bits`ビットを記述子ループ長として読み取り、
    /// 記述子群を後続データと共に返す。
    ///
    /// 上位の予約ビットは無視する。データ長が不足している場合は`None`を返す。
    pub fn read_masked(data: &'a [u8], bits: u32) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        debug_assert!(bits < 16);
        if data.len() < 2 {
            return None;
        }

        let length = data[0..=1].read_be_16() & ((1 << bits) - 1);
        DescriptorBlock::read_with_len(&data[2..], length)
    }

    /// 記述子群のバイト数を返す。
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 記述子群が空かどうかを返す。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 内包する記述子群のイテレーターを返す。
    #[inline]
    pub fn iter(&self) -> DescriptorIter<'a> {
        DescriptorIter(self.0)
    }

    /// 内包する記述子群から`tag`と一致する最初の記述子を返す。
    pub fn find(&self, tag: u8) -> Option<RawDescriptor<'a>> {
        self.iter().find(|d| d.tag == tag)
    }
}

impl<'a> fmt::Debug for DescriptorBlock<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DescriptorBlock(")?;
        f.debug_list().entries(self).finish()?;
        f.write_str(")")
    }
}

impl<'a> IntoIterator for &DescriptorBlock<'a> {
    type Item = RawDescriptor<'a>;
    type IntoIter = DescriptorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [`DescriptorBlock`]のイテレーター。
#[derive(Clone)]
pub struct DescriptorIter<'a>(&'a [u8]);

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = RawDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let [tag, length, ref rem @ ..] = *self.0 else {
            return None;
        };
        let data = rem.get(..length as usize)?;

        self.0 = &rem[length as usize..];
        Some(RawDescriptor { tag, data })
    }
}

impl<'a> std::iter::FusedIterator for DescriptorIter<'a> {}

impl<'a> fmt::Debug for DescriptorIter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DescriptorIter(")?;
        f.debug_list().entries(self.clone()).finish()?;
        f.write_str(")")
    }
}

//! 複数文字列構造（multiple string structure）。

use smallvec::SmallVec;

use crate::lang::LangCode;

/// 圧縮なし。
pub const COMPRESSION_NONE: u8 = 0x00;
/// Unicode U+0000～U+00FFの範囲から選択された文字。
pub const MODE_SELECTED_UNICODE: u8 = 0x00;
/// UTF-16で符号化された文字。
pub const MODE_UTF16: u8 = 0x3F;

/// 文字列のセグメント。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    /// 圧縮形式。
    pub compression_type: u8,
    /// 文字の符号化モード。
    pub mode: u8,
    /// 符号化された文字列。
    pub bytes: &'a [u8],
}

impl<'a> Segment<'a> {
    /// セグメントを文字列に復号する。
    ///
    /// 圧縮されている場合や対応していないモードの場合は`None`を返す。
    pub fn decode(&self) -> Option<String> {
        if self.compression_type != COMPRESSION_NONE {
            return None;
        }

        match self.mode {
            MODE_UTF16 => {
                let units = self
                    .bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]));
                Some(
                    char::decode_utf16(units)
                        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                        .collect(),
                )
            }
            MODE_SELECTED_UNICODE => match std::str::from_utf8(self.bytes) {
                Ok(s) => Some(s.to_owned()),
                // ISO 8859-1
                Err(_) => Some(self.bytes.iter().map(|&b| b as char).collect()),
            },
            _ => None,
        }
    }
}

/// 言語ごとの文字列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangString<'a> {
    /// 言語コード。
    pub lang_code: LangCode,
    /// 文字列を構成するセグメント。
    pub segments: SmallVec<[Segment<'a>; 1]>,
}

/// 複数の言語による文字列からなる構造。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipleString<'a>(pub SmallVec<[LangString<'a>; 1]>);

impl<'a> MultipleString<'a> {
    /// `data`から複数文字列構造を読み取る。
    ///
    /// 構造が`data`に収まらない場合は`None`を返す。
    pub fn read(data: &'a [u8]) -> Option<MultipleString<'a>> {
        let [number_strings, ref data @ ..] = *data else {
            return None;
        };

        let mut data = data;
        let mut strings = SmallVec::with_capacity(number_strings as usize);
        for _ in 0..number_strings {
            let [l1, l2, l3, number_segments, ref rem @ ..] = *data else {
                return None;
            };
            data = rem;

            let mut segments = SmallVec::with_capacity(number_segments as usize);
            for _ in 0..number_segments {
                let [compression_type, mode, number_bytes, ref rem @ ..] = *data else {
                    return None;
                };
                let bytes = rem.get(..number_bytes as usize)?;
                data = &rem[number_bytes as usize..];

                segments.push(Segment {
                    compression_type,
                    mode,
                    bytes,
                });
            }

            strings.push(LangString {
                lang_code: LangCode([l1, l2, l3]),
                segments,
            });
        }

        Some(MultipleString(strings))
    }

    /// 文字列の数を返す。
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 文字列がないかどうかを返す。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 言語を問わず、最初に復号できたセグメントの文字列を返す。
    pub fn first_text(&self) -> Option<String> {
        self.0
            .iter()
            .flat_map(|s| &s.segments)
            .find_map(|seg| seg.decode())
    }
}

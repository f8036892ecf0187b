//! 文字列構造で使用される言語の定義。

use std::fmt;

/// ISO 639-2で規定される3文字の言語コード。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LangCode(pub [u8; 3]);

impl LangCode {
    /// 英語。
    pub const ENG: LangCode = LangCode(*b"eng");
    /// スペイン語。
    pub const SPA: LangCode = LangCode(*b"spa");
    /// フランス語。
    pub const FRA: LangCode = LangCode(*b"fra");
    /// 韓国語。
    pub const KOR: LangCode = LangCode(*b"kor");
    /// 中国語。
    pub const ZHO: LangCode = LangCode(*b"zho");
    /// 言語なし。
    ///
    /// 言語コードを全て0にした場合や空白で埋めた場合に相当する。
    pub const UND: LangCode = LangCode(*b"und");

    /// `data`の先頭3バイトから言語コードを読み取る。
    #[inline]
    pub fn read(data: &[u8; 3]) -> LangCode {
        LangCode(*data)
    }

    /// 大文字小文字を区別せずに言語コードを比較する。
    #[inline]
    pub fn eq_ignore_case(&self, other: &LangCode) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.escape_ascii().fmt(f)
    }
}

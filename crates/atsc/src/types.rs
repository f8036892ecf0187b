//! ATSC A/65で定義されている、定数を伴う型。

/// MGTで告知されるテーブルの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableType(pub u16);

impl TableType {
    /// 地上波VCT（current_next_indicator = 1）
    pub const TVCT_CURRENT: TableType = TableType(0x0000);
    /// 地上波VCT（current_next_indicator = 0）
    pub const TVCT_NEXT: TableType = TableType(0x0001);
    /// ケーブルVCT（current_next_indicator = 1）
    pub const CVCT_CURRENT: TableType = TableType(0x0002);
    /// ケーブルVCT（current_next_indicator = 0）
    pub const CVCT_NEXT: TableType = TableType(0x0003);
    /// チャンネルETT
    pub const CHANNEL_ETT: TableType = TableType(0x0004);
    /// DCCSCT
    pub const DCCSCT: TableType = TableType(0x0005);
    // 0x0006 - 0x00FF 予約
    /// EIT-0
    pub const EIT_0: TableType = TableType(0x0100);
    /// EIT-127
    pub const EIT_127: TableType = TableType(0x017F);
    // 0x0180 - 0x01FF 予約
    /// ETT-0
    pub const ETT_0: TableType = TableType(0x0200);
    /// ETT-127
    pub const ETT_127: TableType = TableType(0x027F);

    /// EIT-`n`のテーブル種別を返す。
    ///
    /// `n`が127を超える場合は`None`を返す。
    #[inline]
    pub const fn eit(n: u8) -> Option<TableType> {
        if n > 127 {
            None
        } else {
            Some(TableType(Self::EIT_0.0 + n as u16))
        }
    }

    /// EITのテーブル種別であれば、その番号（EIT-`n`の`n`）を返す。
    #[inline]
    pub const fn eit_number(&self) -> Option<u8> {
        match self.0 {
            0x0100..=0x017F => Some((self.0 - Self::EIT_0.0) as u8),
            _ => None,
        }
    }

    /// ETTのテーブル種別かどうかを返す。
    #[inline]
    pub fn is_ett(&self) -> bool {
        matches!(self.0, 0x0004 | 0x0200..=0x027F)
    }

    /// RRTのテーブル種別かどうかを返す。
    #[inline]
    pub fn is_rrt(&self) -> bool {
        matches!(self.0, 0x0301..=0x03FF)
    }
}

/// 仮想チャンネルとそのイベントを結び付けるソース識別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u16);

impl SourceId {
    /// プリミティブ型として値を返す。
    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

crate::utils::delegate_fmt!(SourceId);

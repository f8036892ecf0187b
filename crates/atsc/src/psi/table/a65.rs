//! ATSC A/65で規定されるテーブルおよび関連する型の定義。

use crate::mss::MultipleString;
use crate::pid::Pid;
use crate::psi::desc::DescriptorBlock;
use crate::psi::{PsiSection, PsiTable};
use crate::time::GpsTime;
use crate::types::{SourceId, TableType};
use crate::utils::BytesExt;

/// MGTで告知されるテーブル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgtItem<'a> {
    /// テーブル種別。
    pub table_type: TableType,
    /// テーブルが伝送されるPID。
    pub pid: Pid,
    /// テーブルのバージョン番号（5ビット）。
    pub version_number: u8,
    /// テーブルの総バイト数。
    pub number_bytes: u32,
    /// 記述子の塊。
    pub descriptors: DescriptorBlock<'a>,
}

/// MGT（Master Guide Table）。
#[derive(Debug, PartialEq, Eq)]
pub struct Mgt<'a> {
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// 告知されるテーブルを格納する配列。
    pub items: Vec<MgtItem<'a>>,
    /// 記述子の塊。
    pub descriptors: DescriptorBlock<'a>,
}

impl<'a> Mgt<'a> {
    /// MGTのテーブルID。
    pub const TABLE_ID: u8 = 0xC7;

    /// EIT-0からEIT-(`count`-1)までを伝送するPIDを返す。
    pub fn eit_pids(&self, count: u8) -> impl Iterator<Item = Pid> + '_ {
        self.items.iter().filter_map(move |item| {
            let n = item.table_type.eit_number()?;
            (n < count).then_some(item.pid)
        })
    }
}

impl<'a> PsiTable<'a> for Mgt<'a> {
    fn read(psi: &PsiSection<'a>) -> Option<Mgt<'a>> {
        if psi.table_id != Self::TABLE_ID {
            log::debug!("invalid Mgt::table_id");
            return None;
        }
        if psi.syntax.is_none() {
            log::debug!("invalid Mgt::syntax");
            return None;
        }

        let data = psi.data;
        if data.len() < 3 {
            log::debug!("invalid Mgt");
            return None;
        }

        let protocol_version = data[0];
        let tables_defined = data[1..=2].read_be_16();

        let mut data = &data[3..];
        let mut items = Vec::with_capacity(tables_defined as usize);
        for _ in 0..tables_defined {
            if data.len() < 11 {
                log::debug!("invalid MgtItem");
                return None;
            }

            let table_type = TableType(data[0..=1].read_be_16());
            let pid = Pid::read(&data[2..=3]);
            let version_number = data[4] & 0b00011111;
            let number_bytes = data[5..=8].read_be_32();
            let Some((descriptors, rem)) = DescriptorBlock::read_masked(&data[9..], 12) else {
                log::debug!("invalid MgtItem::descriptors");
                return None;
            };
            data = rem;

            items.push(MgtItem {
                table_type,
                pid,
                version_number,
                number_bytes,
                descriptors,
            });
        }

        if data.first().map_or(true, |&b| b & 0xF0 != 0xF0) {
            log::debug!("invalid Mgt::descriptors_length");
            return None;
        }
        let Some((descriptors, _)) = DescriptorBlock::read_masked(data, 12) else {
            log::debug!("invalid Mgt::descriptors");
            return None;
        };

        Some(Mgt {
            protocol_version,
            items,
            descriptors,
        })
    }
}

/// VCTで定義される仮想チャンネル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VctItem {
    /// チャンネルの短縮名（最大7文字）。
    pub short_name: String,
    /// メジャーチャンネル番号。
    ///
    /// 1部構成のチャンネル番号の場合は、その番号全体が入る。
    pub major_channel_number: u16,
    /// マイナーチャンネル番号。
    ///
    /// 1部構成のチャンネル番号の場合は0となる。
    pub minor_channel_number: u16,
    /// チャンネルを伝送するTSの識別。
    pub channel_tsid: u16,
    /// 放送番組番号識別。
    pub program_number: u16,
    /// サービス形式種別（6ビット）。
    pub service_type: u8,
    /// ソース識別。
    pub source_id: SourceId,
}

impl VctItem {
    /// 短縮名の最大バイト数。
    pub const MAX_SHORT_NAME_BYTES: usize = 14;

    fn read_short_name(data: &[u8]) -> String {
        let units = data[..Self::MAX_SHORT_NAME_BYTES]
            .chunks_exact(2)
            .map(|c| c.read_be_16())
            .take_while(|&unit| unit != 0x0000);
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// チャンネル番号を`major-minor`、1部構成の場合は`major`の形式で表す文字列を返す。
    pub fn channel_number(&self) -> String {
        if self.minor_channel_number == 0 {
            self.major_channel_number.to_string()
        } else {
            format!("{}-{}", self.major_channel_number, self.minor_channel_number)
        }
    }
}

/// VCT（Virtual Channel Table）。
#[derive(Debug, PartialEq, Eq)]
pub struct Vct<'a> {
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// ケーブルVCTかどうか。
    pub is_cable: bool,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// 仮想チャンネルを格納する配列。
    pub items: Vec<VctItem>,
    /// 追加の記述子の塊。
    pub additional_descriptors: DescriptorBlock<'a>,
}

impl<'a> Vct<'a> {
    /// 地上波VCTのテーブルID。
    pub const TABLE_ID_TERRESTRIAL: u8 = 0xC8;
    /// ケーブルVCTのテーブルID。
    pub const TABLE_ID_CABLE: u8 = 0xC9;
}

impl<'a> PsiTable<'a> for Vct<'a> {
    fn read(psi: &PsiSection<'a>) -> Option<Vct<'a>> {
        let is_cable = match psi.table_id {
            Self::TABLE_ID_TERRESTRIAL => false,
            Self::TABLE_ID_CABLE => true,
            _ => {
                log::debug!("invalid Vct::table_id");
                return None;
            }
        };
        let Some(syntax) = psi.syntax.as_ref() else {
            log::debug!("invalid Vct::syntax");
            return None;
        };

        let data = psi.data;
        if data.len() < 2 {
            log::debug!("invalid Vct");
            return None;
        }

        let protocol_version = data[0];
        let num_channels_in_section = data[1];

        let mut data = &data[2..];
        let mut items = Vec::with_capacity(num_channels_in_section as usize);
        for _ in 0..num_channels_in_section {
            if data.len() < 32 {
                log::debug!("invalid VctItem");
                return None;
            }

            let short_name = VctItem::read_short_name(data);
            if data[14] & 0xF0 != 0xF0 {
                log::debug!("invalid VctItem::channel_number");
                return None;
            }
            let mut major_channel_number = data[14..=15].read_be_16() >> 2 & 0x03FF;
            let mut minor_channel_number = data[15..=16].read_be_16() & 0x03FF;
            if major_channel_number & 0x03F0 == 0x03F0 {
                // 1部構成のチャンネル番号
                major_channel_number = (major_channel_number & 0x0F) << 10 | minor_channel_number;
                minor_channel_number = 0;
            }
            let channel_tsid = data[22..=23].read_be_16();
            let program_number = data[24..=25].read_be_16();
            let service_type = data[27] & 0b00111111;
            let source_id = SourceId(data[28..=29].read_be_16());
            let Some((_, rem)) = DescriptorBlock::read_masked(&data[30..], 10) else {
                log::debug!("invalid VctItem::descriptors");
                return None;
            };
            data = rem;

            items.push(VctItem {
                short_name,
                major_channel_number,
                minor_channel_number,
                channel_tsid,
                program_number,
                service_type,
                source_id,
            });
        }

        if data.first().map_or(true, |&b| b & 0xFC != 0xFC) {
            log::debug!("invalid Vct::additional_descriptors_length");
            return None;
        }
        let Some((additional_descriptors, _)) = DescriptorBlock::read_masked(data, 10) else {
            log::debug!("invalid Vct::additional_descriptors");
            return None;
        };

        Some(Vct {
            transport_stream_id: syntax.table_id_extension,
            is_cable,
            section_number: syntax.section_number,
            last_section_number: syntax.last_section_number,
            protocol_version,
            items,
            additional_descriptors,
        })
    }
}

/// EITで定義されるイベント。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EitItem {
    /// イベント識別（14ビット）。
    pub event_id: u16,
    /// 番組名。
    ///
    /// 復号できる文字列がない場合は空となる。
    pub title: String,
    /// 開始時刻。
    pub start_time: GpsTime,
    /// 継続時間（秒）。
    pub duration: u32,
}

impl EitItem {
    fn read_title(data: &[u8]) -> String {
        if data.is_empty() {
            return String::new();
        }

        let Some(mss) = MultipleString::read(data) else {
            log::debug!("invalid EitItem::title");
            return String::new();
        };
        mss.first_text().unwrap_or_default()
    }
}

/// EIT（Event Information Table）。
#[derive(Debug, PartialEq, Eq)]
pub struct Eit {
    /// ソース識別。
    pub source_id: SourceId,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// イベントを格納する配列。
    pub items: Vec<EitItem>,
}

impl Eit {
    /// EITのテーブルID。
    pub const TABLE_ID: u8 = 0xCB;
}

impl PsiTable<'_> for Eit {
    fn read(psi: &PsiSection) -> Option<Eit> {
        if psi.table_id != Self::TABLE_ID {
            log::debug!("invalid Eit::table_id");
            return None;
        }
        let Some(syntax) = psi.syntax.as_ref() else {
            log::debug!("invalid Eit::syntax");
            return None;
        };

        let data = psi.data;
        if data.len() < 2 {
            log::debug!("invalid Eit");
            return None;
        }

        let protocol_version = data[0];
        let num_events_in_section = data[1];

        let mut data = &data[2..];
        let mut items = Vec::with_capacity(num_events_in_section as usize);
        for _ in 0..num_events_in_section {
            if data.len() < 10 {
                log::debug!("invalid EitItem");
                return None;
            }
            if data[0] & 0xC0 != 0xC0 {
                log::debug!("invalid EitItem::event_id");
                return None;
            }

            let event_id = data[0..=1].read_be_16() & 0x3FFF;
            let start_time = GpsTime(data[2..=5].read_be_32());
            let duration = data[6..=8].read_be_24() & 0x0F_FFFF;
            let title_length = data[9] as usize;
            let Some(title) = data[10..].get(..title_length) else {
                log::debug!("invalid EitItem::title_length");
                return None;
            };
            let title = EitItem::read_title(title);

            let desc_data = &data[10 + title_length..];
            if desc_data.first().map_or(true, |&b| b & 0xF0 != 0xF0) {
                log::debug!("invalid EitItem::descriptors_length");
                return None;
            }
            let Some((_, rem)) = DescriptorBlock::read_masked(desc_data, 12) else {
                log::debug!("invalid EitItem::descriptors");
                return None;
            };
            data = rem;

            items.push(EitItem {
                event_id,
                title,
                start_time,
                duration,
            });
        }

        Some(Eit {
            source_id: SourceId(syntax.table_id_extension),
            section_number: syntax.section_number,
            last_section_number: syntax.last_section_number,
            protocol_version,
            items,
        })
    }
}

//! MPEG2-TSのパケット。

use std::fmt;

use crate::pid::Pid;

/// TSパケットの同期バイト。
pub const SYNC_BYTE: u8 = 0x47;
/// TSパケットの大きさ。
pub const PACKET_SIZE: usize = 188;

/// MPEG2-TSのパケット。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Packet(pub [u8; PACKET_SIZE]);

impl Packet {
    /// パケットが正常かどうかを返す。
    ///
    /// 同期バイトやトランスポートエラーインジケーターによるエラー検知に加え、
    /// アダプテーションフィールド長の異常などパケットとしてあり得ない状態であることも判断材料である。
    pub fn is_normal(&self) -> bool {
        if self.sync_byte() != SYNC_BYTE {
            // 同期バイト不正
            return false;
        }
        if self.error_indicator() {
            // ビット誤りあり
            return false;
        }
        if self.adaptation_field_control() == 0b10 && self.adaptation_field_length_raw() > 183 {
            // アダプテーションフィールド長異常
            return false;
        }
        if self.adaptation_field_control() == 0b11 && self.adaptation_field_length_raw() > 182 {
            // アダプテーションフィールド長異常
            return false;
        }

        true
    }

    /// 同期バイトを返す。
    #[inline]
    pub fn sync_byte(&self) -> u8 {
        self.0[0]
    }

    /// トランスポートエラーインジケーターを返す。
    #[inline]
    pub fn error_indicator(&self) -> bool {
        self.0[1] & 0b10000000 != 0
    }

    /// ペイロードユニット開始インジケーターを返す。
    #[inline]
    pub fn unit_start_indicator(&self) -> bool {
        self.0[1] & 0b01000000 != 0
    }

    /// トランスポート優先度を返す。
    #[inline]
    pub fn priority(&self) -> bool {
        self.0[1] & 0b00100000 != 0
    }

    /// PIDを返す。
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid::read(&self.0[1..])
    }

    /// トランスポートスクランブル制御（2ビット）を返す。
    #[inline]
    pub fn scrambling_control(&self) -> u8 {
        (self.0[3] & 0b11000000) >> 6
    }

    /// アダプテーションフィールド制御（2ビット）を返す。
    #[inline]
    pub fn adaptation_field_control(&self) -> u8 {
        (self.0[3] & 0b00110000) >> 4
    }

    /// 連続性指標（4ビット）を返す。
    #[inline]
    pub fn continuity_counter(&self) -> u8 {
        self.0[3] & 0b00001111
    }

    /// パケットがアダプテーションフィールドを含むかどうかを返す。
    #[inline]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control() & 0b10 != 0
    }

    #[inline]
    fn adaptation_field_length_raw(&self) -> u8 {
        self.0[4]
    }

    /// アダプテーションフィールドがある場合、adaptation_field_lengthを返す。
    #[inline]
    pub fn adaptation_field_length(&self) -> Option<u8> {
        self.has_adaptation_field()
            .then(|| self.adaptation_field_length_raw())
    }

    /// パケットがペイロードを含むかどうかを返す。
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control() & 0b01 != 0
    }

    /// ペイロードを返す。
    ///
    /// アダプテーションフィールドがある場合、その分（`1 + adaptation_field_length`バイト）を読み飛ばす。
    pub fn payload(&self) -> Option<&[u8]> {
        if !self.has_payload() {
            None
        } else if let Some(afl) = self.adaptation_field_length() {
            let offset = 4 + 1 + afl as usize;
            self.0.get(offset..)
        } else {
            self.0.get(4..)
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("sync_byte", &self.sync_byte())
            .field("error_indicator", &self.error_indicator())
            .field("unit_start_indicator", &self.unit_start_indicator())
            .field("priority", &self.priority())
            .field("pid", &self.pid())
            .field("scrambling_control", &self.scrambling_control())
            .field("adaptation_field_control", &self.adaptation_field_control())
            .field("continuity_counter", &self.continuity_counter())
            .finish_non_exhaustive()
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = std::array::TryFromSliceError;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Packet, Self::Error> {
        value.try_into().map(Packet)
    }
}

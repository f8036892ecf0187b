//! MPEG2-TSのパケットを分離し、PSIPのセクションを組み立てるためのモジュール。

use arrayvec::ArrayVec;

use crate::packet::{Packet, PACKET_SIZE};
use crate::pid::{Pid, PidTable};
use crate::psi::{PsiError, PsiSection};

/// 各PIDにおける処理方法を設定するテーブル。
///
/// 型パラメータ`T`には`Filter::Tag`を指定する。
pub struct Table<T>(PidTable<Option<PacketState<T>>>);

impl<T: Copy> Table<T> {
    /// 何も設定されていない空のテーブルを生成する。
    #[inline]
    pub fn new() -> Table<T> {
        Table(PidTable::from_fn(|_| None))
    }

    /// `pid`のパケットに処理が設定されているかどうかを返す。
    #[inline]
    pub fn is_set(&self, pid: Pid) -> bool {
        self.0[pid].is_some()
    }

    /// `pid`のパケットに設定されたタグを返す。
    #[inline]
    pub fn get_tag(&self, pid: Pid) -> Option<T> {
        self.0[pid].as_ref().map(|s| s.tag)
    }

    /// `pid`のパケットをPSIとして分離するよう設定する。
    ///
    /// 既に設定されていた場合、組み立て途中のセクションは破棄される。
    /// `tag`により、MGTで告知されるなど動的に変わるPIDの代わりに定数でパケット種別を区別することができる。
    #[inline]
    pub fn set_as_psi(&mut self, pid: Pid, tag: T) {
        self.0[pid] = Some(PacketState::new(tag));
    }

    /// `pid`のパケットで何も処理しないよう設定を解除する。
    #[inline]
    pub fn unset(&mut self, pid: Pid) {
        self.0[pid] = None;
    }

    /// 処理が設定されているPIDの数を返す。
    pub fn len(&self) -> usize {
        self.0.iter().filter(|s| s.is_some()).count()
    }

    /// 処理が設定されているPIDがないかどうかを返す。
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.is_none())
    }
}

impl<T: Copy> Default for Table<T> {
    #[inline]
    fn default() -> Table<T> {
        Table::new()
    }
}

/// パケットの分離における状況。
pub struct Context<'a, T> {
    packet: &'a Packet,
    tag: T,
    table: &'a mut Table<T>,
}

impl<'a, T: Copy> Context<'a, T> {
    /// 分離対象のパケットを返す。
    #[inline]
    pub fn packet(&self) -> &Packet {
        self.packet
    }

    /// 現在のPIDに設定されたタグを返す。
    #[inline]
    pub fn tag(&self) -> T {
        self.tag
    }

    /// 各PIDにおける処理方法を設定するテーブルを返す。
    #[inline]
    pub fn table(&mut self) -> &mut Table<T> {
        self.table
    }
}

/// [`Demuxer`]に渡すフィルターで、パケットを処理するために各メソッドが呼ばれる。
pub trait Filter {
    /// パケットの種類を識別するためのタグに使う型。
    type Tag: Copy;

    /// フィルター初期化時に呼ばれ、各PIDにおける処理方法を設定するテーブルを返す。
    fn on_setup(&mut self) -> Table<Self::Tag>;

    /// CRCの検証を通ったPSIセクションを分離した際に呼ばれる。
    fn on_psi_section(&mut self, ctx: &mut Context<Self::Tag>, psi: &PsiSection);

    /// 処理対象のPIDで連続性指標の不連続を検知した際に呼ばれる。
    fn on_discontinued(&mut self, pid: Pid) {
        let _ = pid;
    }

    /// トランスポートエラーインジケーターが立ったパケットを受け取った際に呼ばれる。
    fn on_transport_error(&mut self) {}

    /// 同期バイトの不正などパケットとしてあり得ない状態のパケットを受け取った際に呼ばれる。
    fn on_format_error(&mut self) {}
}

impl<T: Filter + ?Sized> Filter for &mut T {
    type Tag = T::Tag;

    #[inline]
    fn on_setup(&mut self) -> Table<Self::Tag> {
        (**self).on_setup()
    }

    #[inline]
    fn on_psi_section(&mut self, ctx: &mut Context<Self::Tag>, psi: &PsiSection) {
        (**self).on_psi_section(ctx, psi)
    }

    #[inline]
    fn on_discontinued(&mut self, pid: Pid) {
        (**self).on_discontinued(pid)
    }

    #[inline]
    fn on_transport_error(&mut self) {
        (**self).on_transport_error()
    }

    #[inline]
    fn on_format_error(&mut self) {
        (**self).on_format_error()
    }
}

/// [`Demuxer`]が処理したパケットやセクションの統計。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    /// 受け取ったパケットの数。
    pub packets: u64,
    /// 同期バイトの不正などで捨てたパケットの数。
    pub format_errors: u64,
    /// トランスポートエラーインジケーターが立っていたパケットの数。
    pub transport_errors: u64,
    /// 処理対象のPIDで検知した連続性指標の不連続の数。
    pub discontinuities: u64,
    /// CRCが一致せず捨てたセクションの数。
    pub crc_errors: u64,
    /// 長さが足りず捨てたセクションの数。
    pub corrupted: u64,
}

/// TSパケットを分離する。
pub struct Demuxer<T: Filter> {
    filter: T,
    table: Table<T::Tag>,
    stats: Stats,
    // 前回の`feed`で余ったパケットの断片
    carry: ArrayVec<u8, PACKET_SIZE>,
}

impl<T: Filter> Demuxer<T> {
    /// `Demuxer`を生成する。
    pub fn new(mut filter: T) -> Demuxer<T> {
        let table = filter.on_setup();
        Demuxer {
            filter,
            table,
            stats: Stats::default(),
            carry: ArrayVec::new(),
        }
    }

    /// 内包するフィルターを参照で返す。
    #[inline]
    pub fn get_filter(&self) -> &T {
        &self.filter
    }

    /// 内包するフィルターを可変参照で返す。
    #[inline]
    pub fn get_filter_mut(&mut self) -> &mut T {
        &mut self.filter
    }

    /// `Demuxer`を消費して内包するフィルターを返す。
    #[inline]
    pub fn into_filter(self) -> T {
        self.filter
    }

    /// 各PIDにおける処理方法を設定するテーブルを返す。
    #[inline]
    pub fn table(&self) -> &Table<T::Tag> {
        &self.table
    }

    /// これまでの統計を返す。
    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// 任意の位置で区切られたTSのバイト列を処理する。
    ///
    /// 188バイトに満たない末尾は保持され、次の呼び出しで続くバイト列と繋げて処理される。
    pub fn feed(&mut self, data: &[u8]) {
        let mut data = data;

        if !self.carry.is_empty() {
            let len = std::cmp::min(self.carry.remaining_capacity(), data.len());
            let _result = self.carry.try_extend_from_slice(&data[..len]);
            debug_assert!(_result.is_ok());
            data = &data[len..];

            if !self.carry.is_full() {
                return;
            }
            if let Ok(buf) = std::mem::take(&mut self.carry).into_inner() {
                self.feed_packet(&Packet(buf));
            }
        }

        let mut chunks = data.chunks_exact(PACKET_SIZE);
        for chunk in &mut chunks {
            if let Ok(packet) = Packet::try_from(chunk) {
                self.feed_packet(&packet);
            }
        }

        let _result = self.carry.try_extend_from_slice(chunks.remainder());
        debug_assert!(_result.is_ok());
    }

    /// [`Packet`]を処理してパケットを分離する。
    pub fn feed_packet(&mut self, packet: &Packet) {
        self.stats.packets += 1;

        if packet.error_indicator() {
            self.stats.transport_errors += 1;
            self.filter.on_transport_error();
            return;
        }
        if !packet.is_normal() {
            self.stats.format_errors += 1;
            self.filter.on_format_error();
            return;
        }

        let pid = packet.pid();
        let Some(state) = self.table.0[pid].as_mut() else {
            return;
        };
        let tag = state.tag;

        let payload = match packet.payload() {
            Some(payload) if !payload.is_empty() => payload,
            _ => return,
        };

        // 所有権を切り離すためにパケット処理中は取り出しておく
        let Some(mut section) = state.section.take() else {
            return;
        };

        let mut ctx = Context {
            packet,
            tag,
            table: &mut self.table,
        };
        section.write(
            &mut self.filter,
            &mut ctx,
            &mut self.stats,
            packet.continuity_counter(),
            packet.unit_start_indicator(),
            payload,
        );

        // フィルター内でテーブルの設定がされていなければ値を戻す
        if let Some(state @ PacketState { section: None, .. }) = &mut self.table.0[pid] {
            state.section = Some(section);
        }
    }
}

struct PacketState<T> {
    tag: T,
    section: Option<PartialSection>,
}

impl<T> PacketState<T> {
    #[inline]
    pub fn new(tag: T) -> PacketState<T> {
        PacketState {
            tag,
            section: Some(PartialSection::new()),
        }
    }
}

/// 組み立て途中のセクション。
struct PartialSection {
    last_cc: Option<u8>,
    // 最大のセクションにペイロード1つ分を足した大きさ
    buffer: Box<ArrayVec<u8, { 3 + 0x0FFF + 184 }>>,
}

impl PartialSection {
    fn new() -> PartialSection {
        PartialSection {
            last_cc: None,
            buffer: Box::new(ArrayVec::new()),
        }
    }

    pub fn write<T: Filter>(
        &mut self,
        filter: &mut T,
        ctx: &mut Context<T::Tag>,
        stats: &mut Stats,
        cc: u8,
        is_start: bool,
        payload: &[u8],
    ) {
        let pid = ctx.packet.pid();

        if let Some(last_cc) = self.last_cc {
            if cc != (last_cc + 1) & 0x0F {
                log::debug!("discontinued: {:?}", pid);
                stats.discontinuities += 1;
                filter.on_discontinued(pid);
                self.buffer.clear();
            }
        }
        self.last_cc = Some(cc);

        if !is_start {
            // 先頭が分からないデータは捨てる
            if !self.buffer.is_empty() {
                self.append(payload);
                self.extract(filter, ctx, stats);
            }
            return;
        }

        let pointer = payload[0] as usize;
        let rem = &payload[1..];
        if pointer > rem.len() {
            log::debug!("invalid pointer_field: {:?}", pid);
            self.buffer.clear();
            return;
        }
        let (prev, next) = rem.split_at(pointer);

        if !self.buffer.is_empty() {
            // 前のセクションの残り
            self.append(prev);
            self.extract(filter, ctx, stats);
            self.buffer.clear();
        }

        self.append(next);
        self.extract(filter, ctx, stats);
    }

    fn append(&mut self, data: &[u8]) {
        // バッファに収まる形でdataを追記
        let len = std::cmp::min(self.buffer.remaining_capacity(), data.len());
        let _result = self.buffer.try_extend_from_slice(&data[..len]);
        debug_assert!(_result.is_ok());
    }

    fn extract<T: Filter>(&mut self, filter: &mut T, ctx: &mut Context<T::Tag>, stats: &mut Stats) {
        let mut buf = self.buffer.as_slice();
        loop {
            let psi_len = match PsiSection::parse(buf) {
                Err(PsiError::InsufficientLength) => break,
                Err(PsiError::EndOfPsi) => {
                    // 以降はスタッフィング
                    buf = &[];
                    break;
                }
                Err(PsiError::Corrupted(psi_len)) => {
                    log::debug!("psi section corrupted: {:?}", ctx.packet.pid());
                    stats.corrupted += 1;
                    psi_len
                }
                Err(PsiError::Crc32(psi_len)) => {
                    log::debug!("psi section crc32 error: {:?}", ctx.packet.pid());
                    stats.crc_errors += 1;
                    psi_len
                }
                Ok((psi, psi_len)) => {
                    filter.on_psi_section(ctx, &psi);
                    psi_len
                }
            };

            // 読み込んだPSIセクションの分バッファを進める
            buf = &buf[psi_len..];
        }

        if buf.len() < self.buffer.len() {
            // 処理した部分を捨てる
            let remaining = buf.len();
            let offset = self.buffer.len() - remaining;
            self.buffer.copy_within(offset.., 0);
            self.buffer.truncate(remaining);
        }
    }
}

//! PSIPのテーブルを読み取り、チャンネルと番組表を対応付けるフィルター。

use std::sync::mpsc;

use crate::demux;
use crate::pid::Pid;
use crate::psi::table::{Eit, EitItem, Mgt, Vct, VctItem};
use crate::psi::{PsiSection, PsiTable};
use crate::types::SourceId;

/// ソース識別から仮想チャンネルを得るための、受信順を保持する連想配列。
pub type ChannelMap = indexmap::IndexMap<SourceId, VctItem, fxhash::FxBuildHasher>;

/// [`Correlator`]から結果を受け取るためのトレイト。
pub trait Listener {
    /// MGTによりEITを伝送するPIDが新たに判明した際に呼ばれる。
    ///
    /// 同じPIDについては一度しか呼ばれない。
    fn on_pid_discovered(&mut self, pid: Pid);

    /// EITのイベントを、対応する仮想チャンネルと共に読み取った際に呼ばれる。
    fn on_channel_events_decoded(&mut self, channel: &VctItem, events: Vec<EitItem>);

    /// VCTにより仮想チャンネルが更新された際に呼ばれる。
    fn on_channels_updated(&mut self, channels: &ChannelMap) {
        let _ = channels;
    }
}

impl<L: Listener + ?Sized> Listener for &mut L {
    #[inline]
    fn on_pid_discovered(&mut self, pid: Pid) {
        (**self).on_pid_discovered(pid)
    }

    #[inline]
    fn on_channel_events_decoded(&mut self, channel: &VctItem, events: Vec<EitItem>) {
        (**self).on_channel_events_decoded(channel, events)
    }

    #[inline]
    fn on_channels_updated(&mut self, channels: &ChannelMap) {
        (**self).on_channels_updated(channels)
    }
}

/// [`Listener`]の各メソッドに対応するイベント。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsipEvent {
    /// [`Listener::on_pid_discovered`]に相当する。
    PidDiscovered(Pid),
    /// [`Listener::on_channel_events_decoded`]に相当する。
    ChannelEventsDecoded {
        /// イベントを放送する仮想チャンネル。
        channel: VctItem,
        /// 読み取ったイベント。
        events: Vec<EitItem>,
    },
}

impl Listener for Vec<PsipEvent> {
    fn on_pid_discovered(&mut self, pid: Pid) {
        self.push(PsipEvent::PidDiscovered(pid));
    }

    fn on_channel_events_decoded(&mut self, channel: &VctItem, events: Vec<EitItem>) {
        self.push(PsipEvent::ChannelEventsDecoded {
            channel: channel.clone(),
            events,
        });
    }
}

impl Listener for mpsc::Sender<PsipEvent> {
    fn on_pid_discovered(&mut self, pid: Pid) {
        if self.send(PsipEvent::PidDiscovered(pid)).is_err() {
            log::debug!("receiver disconnected");
        }
    }

    fn on_channel_events_decoded(&mut self, channel: &VctItem, events: Vec<EitItem>) {
        let event = PsipEvent::ChannelEventsDecoded {
            channel: channel.clone(),
            events,
        };
        if self.send(event).is_err() {
            log::debug!("receiver disconnected");
        }
    }
}

/// [`Correlator`]の設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// MGTやVCTを伝送するPID。
    pub base_pid: Pid,
    /// 読み取るEITの数。
    ///
    /// 1であればEIT-0のみ、2であればEIT-0とEIT-1を読み取る。
    pub eit_count: u8,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            base_pid: Pid::PSIP_BASE,
            eit_count: 1,
        }
    }
}

/// [`Correlator`]が処理したテーブルの統計。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    /// 壊れていて読み取れなかったテーブルの数。
    pub broken_tables: u64,
    /// 対応する仮想チャンネルがなく捨てたEITの数。
    pub uncorrelated_eits: u64,
}

mod sealed {
    // モジュール直下に定義するとE0446で怒られるので封印
    #[derive(Debug, Clone, Copy)]
    pub enum Tag {
        Base,
        Eit,
    }
}

use sealed::Tag;

/// PSIPのテーブルを読み取り、EITを仮想チャンネルと対応付けるフィルター。
pub struct Correlator<L> {
    listener: L,
    options: Options,
    stats: Stats,

    channels: ChannelMap,
}

impl<L> Correlator<L> {
    /// 既定の設定で`Correlator`を生成する。
    #[inline]
    pub fn new(listener: L) -> Correlator<L> {
        Correlator::with_options(listener, Options::default())
    }

    /// `options`を設定して`Correlator`を生成する。
    pub fn with_options(listener: L, options: Options) -> Correlator<L> {
        Correlator {
            listener,
            options,
            stats: Stats::default(),

            channels: ChannelMap::default(),
        }
    }

    /// 内包する`Listener`を参照で返す。
    #[inline]
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// 内包する`Listener`を可変参照で返す。
    #[inline]
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// `Correlator`を消費して内包する`Listener`を返す。
    #[inline]
    pub fn into_listener(self) -> L {
        self.listener
    }

    /// 設定を返す。
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// これまでの統計を返す。
    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// これまでに受信したすべての仮想チャンネルを返す。
    ///
    /// 戻り値は最初に受信した順に並ぶ[`IndexMap`]で、キーはソース識別である。
    ///
    /// [`IndexMap`]: indexmap::IndexMap
    #[inline]
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }
}

impl<L: Listener> Correlator<L> {
    fn on_mgt(&mut self, ctx: &mut demux::Context<Tag>, psi: &PsiSection) {
        let Some(mgt) = Mgt::read(psi) else {
            self.stats.broken_tables += 1;
            return;
        };

        for pid in mgt.eit_pids(self.options.eit_count) {
            if ctx.table().is_set(pid) {
                continue;
            }

            log::info!("EIT discovered: {:?}", pid);
            ctx.table().set_as_psi(pid, Tag::Eit);
            self.listener.on_pid_discovered(pid);
        }
    }

    fn on_vct(&mut self, psi: &PsiSection) {
        let Some(vct) = Vct::read(psi) else {
            self.stats.broken_tables += 1;
            return;
        };

        for item in vct.items {
            self.channels.insert(item.source_id, item);
        }
        self.listener.on_channels_updated(&self.channels);
    }

    fn on_eit(&mut self, psi: &PsiSection) {
        let Some(eit) = Eit::read(psi) else {
            self.stats.broken_tables += 1;
            return;
        };
        let Some(channel) = self.channels.get(&eit.source_id) else {
            log::debug!("no channel for EIT: source_id={}", eit.source_id);
            self.stats.uncorrelated_eits += 1;
            return;
        };

        self.listener.on_channel_events_decoded(channel, eit.items);
    }
}

impl<L: Listener> demux::Filter for Correlator<L> {
    type Tag = Tag;

    fn on_setup(&mut self) -> demux::Table<Self::Tag> {
        let mut table = demux::Table::new();
        table.set_as_psi(self.options.base_pid, Tag::Base);
        table
    }

    fn on_psi_section(&mut self, ctx: &mut demux::Context<Self::Tag>, psi: &PsiSection) {
        log::trace!(
            "psi section: table_id=0x{:02X}, tag={:?}",
            psi.table_id,
            ctx.tag()
        );

        match psi.table_id {
            Mgt::TABLE_ID => self.on_mgt(ctx, psi),
            Vct::TABLE_ID_TERRESTRIAL | Vct::TABLE_ID_CABLE => self.on_vct(psi),
            Eit::TABLE_ID => self.on_eit(psi),
            _ => {}
        }
    }
}

/// PSIPを読み取る[`Demuxer`][demux::Demuxer]。
pub type PsipDemuxer<L> = demux::Demuxer<Correlator<L>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_SIZE;
    use crate::testing::{self, Channel, Event};
    use crate::time::GpsTime;

    const BASE_PID: u16 = 0x1FFB;
    const EIT0_PID: u16 = 0x1FFC;
    const EIT1_PID: u16 = 0x1FFD;

    fn mgt() -> Vec<u8> {
        testing::mgt(&[
            (0x0000, BASE_PID),
            (0x0004, 0x1FFE),
            (0x0100, EIT0_PID),
            (0x0101, EIT1_PID),
        ])
    }

    fn vct() -> Vec<u8> {
        testing::tvct(&[Channel {
            short_name: "KGO",
            major: 2,
            minor: 1,
            program_number: 1,
            source_id: 7,
        }])
    }

    fn eit(source_id: u16) -> Vec<u8> {
        testing::eit(
            source_id,
            &[Event {
                event_id: 1,
                title: "News",
                start_time: 1_000_000_000,
                duration: 1800,
            }],
        )
    }

    fn kgo() -> VctItem {
        VctItem {
            short_name: "KGO".to_owned(),
            major_channel_number: 2,
            minor_channel_number: 1,
            channel_tsid: 0x0001,
            program_number: 1,
            service_type: 0x02,
            source_id: SourceId(7),
        }
    }

    fn news() -> EitItem {
        EitItem {
            event_id: 1,
            title: "News".to_owned(),
            start_time: GpsTime(1_000_000_000),
            duration: 1800,
        }
    }

    fn demuxer() -> PsipDemuxer<Vec<PsipEvent>> {
        PsipDemuxer::new(Correlator::new(Vec::new()))
    }

    /// MGT、VCT、EITの順に並んだTS。
    fn stream() -> Vec<u8> {
        let mut base_cc = 0;
        let mut eit_cc = 0;
        let mut ts = testing::packetize(BASE_PID, &mut base_cc, &[mgt(), vct()]);
        ts.extend(testing::packetize(EIT0_PID, &mut eit_cc, &[eit(7)]));
        ts
    }

    fn expected() -> Vec<PsipEvent> {
        vec![
            PsipEvent::PidDiscovered(Pid::new(EIT0_PID)),
            PsipEvent::ChannelEventsDecoded {
                channel: kgo(),
                events: vec![news()],
            },
        ]
    }

    #[test]
    fn test_scenario() {
        let mut demuxer = demuxer();
        demuxer.feed(&stream());

        let correlator = demuxer.get_filter();
        assert_eq!(correlator.listener(), &expected());
        assert_eq!(correlator.channels().len(), 1);
        assert_eq!(correlator.channels()[&SourceId(7)], kgo());
        assert_eq!(correlator.stats(), &Stats::default());
        assert!(demuxer.table().is_set(Pid::new(EIT0_PID)));
        assert!(!demuxer.table().is_set(Pid::new(EIT1_PID)));
        assert!(!demuxer.table().is_set(Pid::new(0x1FFE)));
    }

    #[test]
    fn test_chunking_invariance() {
        let ts = stream();
        for chunk_size in [1, 2, 7, 100, 188, 189, 376, 1000] {
            let mut demuxer = demuxer();
            for chunk in ts.chunks(chunk_size) {
                demuxer.feed(chunk);
            }
            assert_eq!(
                demuxer.get_filter().listener(),
                &expected(),
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_idempotent_discovery() {
        let mut base_cc = 0;
        let ts = testing::packetize(BASE_PID, &mut base_cc, &[mgt(), mgt(), mgt()]);

        let mut demuxer = demuxer();
        demuxer.feed(&ts);
        demuxer.feed(&testing::packetize(BASE_PID, &mut base_cc, &[mgt()]));
        assert_eq!(
            demuxer.get_filter().listener(),
            &[PsipEvent::PidDiscovered(Pid::new(EIT0_PID))]
        );
    }

    #[test]
    fn test_eit_count() {
        let options = Options {
            eit_count: 2,
            ..Default::default()
        };
        let mut base_cc = 0;
        let ts = testing::packetize(BASE_PID, &mut base_cc, &[mgt()]);

        let mut demuxer = PsipDemuxer::new(Correlator::with_options(Vec::new(), options));
        demuxer.feed(&ts);
        assert_eq!(
            demuxer.get_filter().listener(),
            &[
                PsipEvent::PidDiscovered(Pid::new(EIT0_PID)),
                PsipEvent::PidDiscovered(Pid::new(EIT1_PID)),
            ]
        );
    }

    #[test]
    fn test_uncorrelated_eit() {
        let mut base_cc = 0;
        let mut eit_cc = 0;
        let mut ts = testing::packetize(BASE_PID, &mut base_cc, &[mgt()]);
        // VCTより前のEITは捨てる
        ts.extend(testing::packetize(EIT0_PID, &mut eit_cc, &[eit(7)]));
        ts.extend(testing::packetize(BASE_PID, &mut base_cc, &[vct()]));
        // VCTにないソース識別
        ts.extend(testing::packetize(EIT0_PID, &mut eit_cc, &[eit(8)]));
        ts.extend(testing::packetize(EIT0_PID, &mut eit_cc, &[eit(7)]));

        let mut demuxer = demuxer();
        demuxer.feed(&ts);
        assert_eq!(demuxer.get_filter().listener(), &expected());
        assert_eq!(demuxer.get_filter().stats().uncorrelated_eits, 2);
    }

    #[test]
    fn test_crc_error() {
        let mut broken = mgt();
        broken[12] ^= 0x04;

        let mut base_cc = 0;
        let ts = testing::packetize(BASE_PID, &mut base_cc, &[broken, vct()]);

        let mut demuxer = demuxer();
        demuxer.feed(&ts);
        assert!(demuxer.get_filter().listener().is_empty());
        assert_eq!(demuxer.get_filter().channels().len(), 1);
        assert_eq!(demuxer.stats().crc_errors, 1);
    }

    #[test]
    fn test_single_bit_flip() {
        let sec = mgt();
        for bit in 0..sec.len() * 8 {
            let mut broken = sec.clone();
            broken[bit / 8] ^= 0x80 >> (bit % 8);

            let mut base_cc = 0;
            let ts = testing::packetize(BASE_PID, &mut base_cc, &[broken]);

            let mut demuxer = demuxer();
            demuxer.feed(&ts);
            assert!(demuxer.get_filter().listener().is_empty(), "bit {}", bit);
        }
    }

    #[test]
    fn test_continuity_loss() {
        // 3パケットにまたがるEIT
        let events: Vec<_> = (0..16)
            .map(|i| Event {
                event_id: i,
                title: "Weather",
                start_time: 1_000_000_000 + i as u32 * 1800,
                duration: 1800,
            })
            .collect();
        let long_eit = testing::eit(7, &events);
        assert!(long_eit.len() > 183 + 184);

        let mut base_cc = 0;
        let mut eit_cc = 0;
        let mut ts = testing::packetize(BASE_PID, &mut base_cc, &[mgt(), vct()]);
        let eit_ts = testing::packetize(EIT0_PID, &mut eit_cc, &[long_eit, eit(7)]);
        // EITの2パケット目を落とす
        ts.extend_from_slice(&eit_ts[..PACKET_SIZE]);
        ts.extend_from_slice(&eit_ts[PACKET_SIZE * 2..]);

        let mut demuxer = demuxer();
        demuxer.feed(&ts);
        assert_eq!(demuxer.get_filter().listener(), &expected());
        assert_eq!(demuxer.stats().discontinuities, 1);
    }

    #[test]
    fn test_broken_table() {
        // 記述子ループ長の予約ビットが立っていないMGT
        let broken = testing::section(0xC7, 0x0000, &[0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut base_cc = 0;
        let ts = testing::packetize(BASE_PID, &mut base_cc, &[broken, vct()]);

        let mut demuxer = demuxer();
        demuxer.feed(&ts);
        assert!(demuxer.get_filter().listener().is_empty());
        assert_eq!(demuxer.get_filter().stats().broken_tables, 1);
        assert_eq!(demuxer.get_filter().channels().len(), 1);
    }

    #[test]
    fn test_channels_updated() {
        #[derive(Default)]
        struct Channels(Vec<Vec<SourceId>>);

        impl Listener for Channels {
            fn on_pid_discovered(&mut self, _: Pid) {}
            fn on_channel_events_decoded(&mut self, _: &VctItem, _: Vec<EitItem>) {}
            fn on_channels_updated(&mut self, channels: &ChannelMap) {
                self.0.push(channels.keys().copied().collect());
            }
        }

        let second = testing::tvct(&[
            Channel {
                short_name: "KQED",
                major: 9,
                minor: 1,
                program_number: 2,
                source_id: 8,
            },
            Channel {
                short_name: "KGO-2",
                major: 2,
                minor: 2,
                program_number: 3,
                source_id: 7,
            },
        ]);
        let mut base_cc = 0;
        let ts = testing::packetize(BASE_PID, &mut base_cc, &[vct(), second]);

        let mut listener = Channels::default();
        let mut demuxer = PsipDemuxer::new(Correlator::new(&mut listener));
        demuxer.feed(&ts);

        // 後から受信した同じソース識別で上書きする
        let channels = demuxer.get_filter().channels();
        assert_eq!(channels[&SourceId(7)].short_name, "KGO-2");
        assert_eq!(channels[&SourceId(8)].short_name, "KQED");
        drop(demuxer);

        assert_eq!(
            listener.0,
            [vec![SourceId(7)], vec![SourceId(7), SourceId(8)]]
        );
    }

    #[test]
    fn test_sender() {
        let (tx, rx) = mpsc::channel::<PsipEvent>();
        let mut demuxer = PsipDemuxer::new(Correlator::new(tx));
        demuxer.feed(&stream());
        drop(demuxer);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events, expected());
    }
}

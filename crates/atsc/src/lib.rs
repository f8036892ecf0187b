//! ATSC A/65に基づいたMPEG2-TSからPSIPを読み込むためのクレート。
//!
//! [`demux::Demuxer`]にTSのバイト列を任意の区切りで与えると、
//! [`filters::psip::Correlator`]がMGT・VCT・EITを読み取り、
//! 番組情報を仮想チャンネルと対応付けて[`filters::psip::Listener`]に渡す。

#![deny(missing_docs)]

pub mod crc32;
pub mod demux;
pub mod filters;
pub mod lang;
pub mod mss;
pub mod packet;
pub mod pid;
pub mod psi;
pub mod time;
pub mod types;
mod utils;

#[cfg(test)]
mod testing;

pub use filters::psip::{Correlator, Listener, PsipDemuxer, PsipEvent};
pub use packet::Packet;
pub use pid::Pid;

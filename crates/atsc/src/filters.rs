//! [`Demuxer`][crate::demux::Demuxer]に渡すフィルター。

pub mod psip;

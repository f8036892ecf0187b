//! PSIPテーブルの定義。

mod a65;

pub use a65::*;

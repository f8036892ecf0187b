//! PSIPにおける日付時刻。
//!
//! PSIPの時刻は1980年1月6日00:00:00からのGPS秒で表され、閏秒を含まない。
//! UTCに変換するにはSTTで告知されるGPS_UTC_offsetを差し引く必要がある。

use std::fmt::{self, Write};

fn write_hundreds<W: Write>(w: &mut W, n: u8) -> fmt::Result {
    let h = b'0' + n / 10;
    let l = b'0' + n % 10;
    w.write_char(h as char)?;
    w.write_char(l as char)
}

/// GPS時刻の起点（1980-01-06 00:00:00）のUNIX時刻。
pub const GPS_EPOCH: i64 = 315_964_800;

/// GPS秒で表された時刻。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsTime(pub u32);

impl GpsTime {
    /// GPS秒を返す。
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// `gps_utc_offset`（GPSとUTCの差の秒数）を適用してUNIX時刻に変換する。
    #[inline]
    pub fn to_unix(self, gps_utc_offset: u8) -> i64 {
        GPS_EPOCH + self.0 as i64 - gps_utc_offset as i64
    }

    /// 閏秒を考慮せずに暦の日付時刻へ変換する。
    pub fn to_date_time(self) -> DateTime {
        let secs = self.to_unix(0);
        let days = secs.div_euclid(86400);
        let rem = secs.rem_euclid(86400) as u32;

        // http://howardhinnant.github.io/date_algorithms.html#civil_from_days
        let z = days + 719468;
        let era = z.div_euclid(146097);
        let doe = z.rem_euclid(146097);
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = (yoe + era * 400 + (month <= 2) as i64) as u16;

        // 1970-01-01は木曜日
        let day_of_week = ((days + 3).rem_euclid(7) + 1) as u8;

        DateTime {
            year,
            month,
            day,
            day_of_week,
            hour: (rem / 3600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
        }
    }
}

impl fmt::Debug for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GpsTime({} = {})", self.0, self.to_date_time())
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_date_time(), f)
    }
}

/// 暦の日付時刻。
#[derive(Clone, PartialEq, Eq)]
pub struct DateTime {
    /// 年。
    pub year: u16,
    /// 月（1月＝1、12月＝12）。
    pub month: u8,
    /// 日（1～31）。
    pub day: u8,
    /// 曜日（月曜日＝1、日曜日＝7）。
    pub day_of_week: u8,
    /// 時（0～23）。
    pub hour: u8,
    /// 分（0～59）。
    pub minute: u8,
    /// 秒（0～59）。
    pub second: u8,
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.year.fmt(f)?;
        f.write_char('-')?;
        write_hundreds(f, self.month)?;
        f.write_char('-')?;
        write_hundreds(f, self.day)?;
        f.write_char(' ')?;

        write_hundreds(f, self.hour)?;
        f.write_char(':')?;
        write_hundreds(f, self.minute)?;
        f.write_char(':')?;
        write_hundreds(f, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

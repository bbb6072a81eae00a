use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use std::str::FromStr;

/// 调度使用的时区，按固定 UTC 偏移表示（`+08:00`、`UTC`、`local`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone(FixedOffset);

impl Zone {
    pub fn utc() -> Self {
        Self(Utc.fix())
    }

    pub fn from_offset(offset: FixedOffset) -> Self {
        Self(offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.0)
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.0)
    }

    /// 无时区的本地时间 -> 绝对时刻。固定偏移下不存在歧义
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.0
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for Zone {
    fn default() -> Self {
        Self(FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()))
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "utc" | "z" | "gmt" => return Ok(Self::utc()),
            "local" => return Ok(Self(Local::now().offset().fix())),
            _ => {}
        }

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(format!("unsupported timezone '{s}', use an offset like +08:00")),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid utc offset '{s}'"));
        }
        let (hh, mm) = match digits.len() {
            2 => (&digits[..2], "00"),
            4 => (&digits[..2], &digits[2..]),
            _ => return Err(format!("invalid utc offset '{s}'")),
        };
        let hours: i32 = hh.parse().map_err(|_| format!("invalid utc offset '{s}'"))?;
        let minutes: i32 = mm.parse().map_err(|_| format!("invalid utc offset '{s}'"))?;
        if hours > 23 || minutes > 59 {
            return Err(format!("utc offset out of range '{s}'"));
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self)
            .ok_or_else(|| format!("utc offset out of range '{s}'"))
    }
}

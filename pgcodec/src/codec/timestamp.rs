//! Timestamp and date codecs.
//!
//! Binary timestamps are signed microseconds since 2000-01-01T00:00:00,
//! binary dates are signed days since 2000-01-01 (Julian-day arithmetic).
//! `i64::MAX`/`i64::MIN` and `i32::MAX`/`i32::MIN` are the wire sentinels
//! for `infinity`/`-infinity`.
use bytes::{BufMut, BytesMut};
use time::{
    Duration, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem as I, Component as C, modifier},
};

use crate::{
    common::{ByteStr, warning},
    error::{MalformedLiteral, Result},
    postgres::{Oid, PgFormat, PgType},
    value::{PgDate, PgTimestamp, Value},
};

use super::{Codec, Encoded, Flags, check_width, fixed_width, format_fallback};

/// 2000-01-01 as a Julian day number.
const PG_EPOCH_JDN: i32 = 2_451_545;

const PG_EPOCH: PrimitiveDateTime = {
    // source: `from_julian_day` docs
    let date = match time::Date::from_julian_day(PG_EPOCH_JDN) {
        Ok(ok) => ok,
        Err(_) => panic!("postgres epoch is a valid julian day"),
    };
    PrimitiveDateTime::new(date, time::Time::MIDNIGHT)
};

const DATE_FMT: &[I<'_>] = &[
    I::Component(C::Year(modifier::Year::default())),
    I::Literal(b"-"),
    I::Component(C::Month(modifier::Month::default())),
    I::Literal(b"-"),
    I::Component(C::Day(modifier::Day::default())),
];

const TIME_FMT: &[I<'_>] = &[
    I::Component(C::Hour(modifier::Hour::default())),
    I::Literal(b":"),
    I::Component(C::Minute(modifier::Minute::default())),
    I::Literal(b":"),
    I::Component(C::Second(modifier::Second::default())),
];

const SUBSEC_FMT: &[I<'_>] =
    &[I::Literal(b"."), I::Component(C::Subsecond(modifier::Subsecond::default()))];

const TS_WRITE: &[I<'_>] = &[
    I::Compound(DATE_FMT),
    I::Literal(b" "),
    I::Compound(TIME_FMT),
    I::Compound(SUBSEC_FMT),
];

const TS_PARSE: &[I<'_>] = &[
    I::Compound(DATE_FMT),
    I::Literal(b" "),
    I::Compound(TIME_FMT),
    I::Optional(&I::Compound(SUBSEC_FMT)),
];

pub(crate) fn timestamp_text(ts: &PgTimestamp) -> ByteStr {
    match ts {
        PgTimestamp::NegInfinity => ByteStr::from_static("-infinity"),
        PgTimestamp::PosInfinity => ByteStr::from_static("infinity"),
        PgTimestamp::At(at) => {
            at.format(&TS_WRITE).expect("format is statically known").into()
        }
    }
}

pub(crate) fn date_text(date: &PgDate) -> ByteStr {
    match date {
        PgDate::NegInfinity => ByteStr::from_static("-infinity"),
        PgDate::PosInfinity => ByteStr::from_static("infinity"),
        PgDate::At(at) => at.format(&DATE_FMT).expect("format is statically known").into(),
    }
}

fn local_offset() -> UtcOffset {
    match UtcOffset::current_local_offset() {
        Ok(offset) => offset,
        Err(_) => {
            warning!("local utc offset is indeterminate, assuming UTC");
            UtcOffset::UTC
        }
    }
}

fn shift(at: PrimitiveDateTime, from: UtcOffset, to: UtcOffset) -> PrimitiveDateTime {
    let odt = at.assume_offset(from).to_offset(to);
    PrimitiveDateTime::new(odt.date(), odt.time())
}

/// `timestamp` codec, 8-byte signed microseconds since the postgres epoch
/// in binary format.
///
/// [`Flags::DB_UTC`] and [`Flags::APP_UTC`] select how the zone-less wire
/// wallclock and the application value are interpreted; a mismatch
/// converts through the current local offset.
pub struct Timestamp {
    format: PgFormat,
    flags: Flags,
}

impl Timestamp {
    pub fn text() -> Self {
        Self { format: PgFormat::Text, flags: Flags::DB_UTC.with(Flags::APP_UTC) }
    }

    pub fn binary() -> Self {
        Self { format: PgFormat::Binary, flags: Flags::DB_UTC.with(Flags::APP_UTC) }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    fn db_to_app(&self, at: PrimitiveDateTime) -> PrimitiveDateTime {
        match (self.flags.contains(Flags::DB_UTC), self.flags.contains(Flags::APP_UTC)) {
            (true, false) => shift(at, UtcOffset::UTC, local_offset()),
            (false, true) => shift(at, local_offset(), UtcOffset::UTC),
            _ => at,
        }
    }

    fn app_to_db(&self, at: PrimitiveDateTime) -> PrimitiveDateTime {
        match (self.flags.contains(Flags::DB_UTC), self.flags.contains(Flags::APP_UTC)) {
            (true, false) => shift(at, local_offset(), UtcOffset::UTC),
            (false, true) => shift(at, UtcOffset::UTC, local_offset()),
            _ => at,
        }
    }
}

impl Codec for Timestamp {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn format(&self) -> PgFormat {
        self.format
    }

    fn oid(&self) -> Oid {
        PrimitiveDateTime::OID
    }

    fn flags(&self) -> Flags {
        self.flags
    }

    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let Value::Timestamp(ts) = value else {
            let reason = format!("cannot encode {} value as timestamp", value.kind());
            return format_fallback(self, value, reason);
        };
        match self.format {
            PgFormat::Binary => {
                let micros = match ts {
                    PgTimestamp::NegInfinity => i64::MIN,
                    PgTimestamp::PosInfinity => i64::MAX,
                    PgTimestamp::At(at) => {
                        let since_epoch = self.app_to_db(*at) - PG_EPOCH;
                        i64::try_from(since_epoch.whole_microseconds()).map_err(|_| {
                            crate::error::FormatError::new("timestamp out of range")
                        })?
                    }
                };
                fixed_width(out, size_of::<i64>(), |buf| buf.put_i64(micros))
            }
            PgFormat::Text => {
                let ts = match ts {
                    PgTimestamp::At(at) => PgTimestamp::At(self.app_to_db(*at)),
                    other => *other,
                };
                Ok(Encoded::Text(timestamp_text(&ts)))
            }
        }
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let ts = match self.format {
            PgFormat::Binary => {
                check_width(self, raw, size_of::<i64>(), row, col)?;
                let mut be = [0u8; size_of::<i64>()];
                be.copy_from_slice(raw);
                match i64::from_be_bytes(be) {
                    i64::MAX => PgTimestamp::PosInfinity,
                    i64::MIN => PgTimestamp::NegInfinity,
                    micros => {
                        let at = PG_EPOCH
                            .checked_add(Duration::microseconds(micros))
                            .ok_or_else(|| {
                                MalformedLiteral::new("timestamp out of range", row, col)
                            })?;
                        PgTimestamp::At(self.db_to_app(at))
                    }
                }
            }
            PgFormat::Text => match raw {
                b"infinity" => PgTimestamp::PosInfinity,
                b"-infinity" => PgTimestamp::NegInfinity,
                _ => {
                    let at = std::str::from_utf8(raw)
                        .ok()
                        .and_then(|text| PrimitiveDateTime::parse(text, &TS_PARSE).ok())
                        .ok_or_else(|| {
                            MalformedLiteral::new("invalid timestamp literal", row, col)
                        })?;
                    PgTimestamp::At(self.db_to_app(at))
                }
            },
        };
        Ok(Value::Timestamp(ts))
    }
}

/// `date` codec, 4-byte signed days since the postgres epoch in binary
/// format.
pub struct Date {
    format: PgFormat,
}

impl Date {
    pub fn text() -> Self {
        Self { format: PgFormat::Text }
    }

    pub fn binary() -> Self {
        Self { format: PgFormat::Binary }
    }
}

impl Codec for Date {
    fn name(&self) -> &'static str {
        "date"
    }

    fn format(&self) -> PgFormat {
        self.format
    }

    fn oid(&self) -> Oid {
        time::Date::OID
    }

    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let Value::Date(date) = value else {
            let reason = format!("cannot encode {} value as date", value.kind());
            return format_fallback(self, value, reason);
        };
        match self.format {
            PgFormat::Binary => {
                let days = match date {
                    PgDate::NegInfinity => i32::MIN,
                    PgDate::PosInfinity => i32::MAX,
                    PgDate::At(at) => at.to_julian_day() - PG_EPOCH_JDN,
                };
                fixed_width(out, size_of::<i32>(), |buf| buf.put_i32(days))
            }
            PgFormat::Text => Ok(Encoded::Text(date_text(date))),
        }
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let date = match self.format {
            PgFormat::Binary => {
                check_width(self, raw, size_of::<i32>(), row, col)?;
                let mut be = [0u8; size_of::<i32>()];
                be.copy_from_slice(raw);
                match i32::from_be_bytes(be) {
                    i32::MAX => PgDate::PosInfinity,
                    i32::MIN => PgDate::NegInfinity,
                    days => {
                        let jdn = days.checked_add(PG_EPOCH_JDN).ok_or_else(|| {
                            MalformedLiteral::new("date out of range", row, col)
                        })?;
                        let at = time::Date::from_julian_day(jdn).map_err(|_| {
                            MalformedLiteral::new("date out of range", row, col)
                        })?;
                        PgDate::At(at)
                    }
                }
            }
            PgFormat::Text => match raw {
                b"infinity" => PgDate::PosInfinity,
                b"-infinity" => PgDate::NegInfinity,
                _ => {
                    let at = std::str::from_utf8(raw)
                        .ok()
                        .and_then(|text| time::Date::parse(text, &DATE_FMT).ok())
                        .ok_or_else(|| {
                            MalformedLiteral::new("invalid date literal", row, col)
                        })?;
                    PgDate::At(at)
                }
            },
        };
        Ok(Value::Date(date))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::encode_value;
    use time::Month;

    fn date(year: i32, month: Month, day: u8) -> time::Date {
        time::Date::from_calendar_date(year, month, day).unwrap()
    }

    #[test]
    fn timestamp_epoch_is_zero() {
        let codec = Timestamp::binary();
        let value = codec.decode(&0i64.to_be_bytes(), 0, 0).unwrap();
        assert_eq!(value, Value::Timestamp(PgTimestamp::At(PG_EPOCH)));
    }

    #[test]
    fn timestamp_binary_roundtrip() {
        let codec = Timestamp::binary();
        let at = PrimitiveDateTime::new(
            date(2026, Month::August, 26),
            time::Time::from_hms_micro(13, 37, 1, 123_456).unwrap(),
        );
        let wire = encode_value(&codec, &Value::Timestamp(PgTimestamp::At(at))).unwrap();
        assert_eq!(wire.len(), 8);
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Timestamp(PgTimestamp::At(at)));
    }

    #[test]
    fn timestamp_infinity_sentinels() {
        let codec = Timestamp::binary();
        let wire = encode_value(&codec, &Value::Timestamp(PgTimestamp::PosInfinity)).unwrap();
        assert_eq!(&wire[..], &i64::MAX.to_be_bytes());
        assert_eq!(
            codec.decode(&wire, 0, 0).unwrap(),
            Value::Timestamp(PgTimestamp::PosInfinity),
        );
        assert_eq!(
            codec.decode(&i64::MIN.to_be_bytes(), 0, 0).unwrap(),
            Value::Timestamp(PgTimestamp::NegInfinity),
        );
    }

    #[test]
    fn timestamp_text_parse() {
        let codec = Timestamp::text();
        let at = PrimitiveDateTime::new(
            date(2004, Month::October, 19),
            time::Time::from_hms(10, 23, 54).unwrap(),
        );
        assert_eq!(
            codec.decode(b"2004-10-19 10:23:54", 0, 0).unwrap(),
            Value::Timestamp(PgTimestamp::At(at)),
        );
        assert_eq!(
            codec.decode(b"infinity", 0, 0).unwrap(),
            Value::Timestamp(PgTimestamp::PosInfinity),
        );
        assert!(codec.decode(b"yesterday-ish", 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn timestamp_binary_wrong_length() {
        assert!(Timestamp::binary().decode(&[0; 7], 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn date_epoch_is_zero() {
        let codec = Date::binary();
        let wire = encode_value(
            &codec,
            &Value::Date(PgDate::At(date(2000, Month::January, 1))),
        )
        .unwrap();
        assert_eq!(&wire[..], &0i32.to_be_bytes());
    }

    #[test]
    fn date_binary_roundtrip() {
        let codec = Date::binary();
        for at in [
            date(1999, Month::December, 31),
            date(2000, Month::January, 2),
            date(1970, Month::January, 1),
            date(2026, Month::August, 26),
        ] {
            let wire = encode_value(&codec, &Value::Date(PgDate::At(at))).unwrap();
            assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Date(PgDate::At(at)));
        }
        assert_eq!(
            codec.decode(&(-1i32).to_be_bytes(), 0, 0).unwrap(),
            Value::Date(PgDate::At(date(1999, Month::December, 31))),
        );
    }

    #[test]
    fn date_infinity_roundtrip() {
        let codec = Date::binary();
        let wire = encode_value(&codec, &Value::Date(PgDate::NegInfinity)).unwrap();
        assert_eq!(&wire[..], &i32::MIN.to_be_bytes());
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Date(PgDate::NegInfinity));
    }

    #[test]
    fn date_text() {
        let codec = Date::text();
        let wire = encode_value(
            &codec,
            &Value::Date(PgDate::At(date(2026, Month::August, 26))),
        )
        .unwrap();
        assert_eq!(&wire[..], b"2026-08-26");
        assert_eq!(
            codec.decode(b"2026-08-26", 0, 0).unwrap(),
            Value::Date(PgDate::At(date(2026, Month::August, 26))),
        );
        assert_eq!(codec.decode(b"-infinity", 0, 0).unwrap(), Value::Date(PgDate::NegInfinity));
    }
}

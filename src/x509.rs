//! Types common to all things X.509.
//!
//! These are the building blocks shared between certificates and the
//! signer infos of CMS messages: names, serial numbers, times, and
//! algorithm identifiers.

use std::{fmt, io, ops, str};
use std::str::FromStr;
use bcder::{decode, encode};
use bcder::{Captured, Mode, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use chrono::{Datelike, DateTime, LocalResult, Timelike, TimeZone, Utc};
use crate::ber::Tlv;
use crate::error::Error;


//------------ Name ----------------------------------------------------------

/// A distinguished name.
///
/// We never look inside names. They are only ever compared, which happens
/// on their encoded form.
#[derive(Clone, Debug)]
pub struct Name(Captured);

impl Name {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.capture(|cons| {
            cons.take_sequence(|cons| { // RDNSequence
                while cons.take_opt_set(|cons| {
                    let mut empty_set = true;
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        empty_set = false;
                        Oid::skip_in(cons)?;
                        if cons.skip_one()?.is_none() {
                            return Err(cons.content_err("invalid name"))
                        }
                        Ok(())
                    })? { }
                    if empty_set {
                        return Err(cons.content_err(
                            "empty relative distinguished name"
                        ));
                    }
                    Ok(())
                })?.is_some() { }
                Ok(())
            })
        }).map(Name)
    }

    /// Returns the encoded name.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.0
    }
}


//--- PartialEq and Eq

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for Name {}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
///
/// Serial numbers can be up to 20 octets long and, historically, negative.
/// We keep the content octets of the DER encoded INTEGER, which therefore
/// must be minimal so that comparing the octets compares the numbers.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Serial(Bytes);

impl Serial {
    /// Creates a serial number from the content octets of an INTEGER.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, ContentError> {
        match (bytes.first(), bytes.get(1)) {
            (None, _) => {
                Err(ContentError::from_static("empty serial number"))
            }
            (Some(0), Some(second)) if second & 0x80 == 0 => {
                Err(ContentError::from_static("non-minimal serial number"))
            }
            (Some(0xFF), Some(second)) if second & 0x80 != 0 => {
                Err(ContentError::from_static("non-minimal serial number"))
            }
            _ => Ok(Serial(bytes))
        }
    }

    /// Returns the content octets of the serial number.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive_if(Tag::INTEGER, |prim| {
            let bytes = prim.take_all()?;
            Self::from_bytes(bytes).map_err(|err| prim.content_err(err))
        })
    }
}


//--- Display and Debug

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for octet in self.0.iter() {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serial({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for Serial {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.0.as_ref())
    }
}


//------------ Time ----------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Creates a time value from its components.
    ///
    /// Returns `None` if the components do not describe a valid time.
    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single()
            .map(Time)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive(|tag, prim| {
            match tag {
                Tag::UTC_TIME => {
                    // RFC 5280 requires the format YYMMDDHHMMSSZ
                    let year = read_two_char(prim)? as i32;
                    let year = if year >= 50 { year + 1900 }
                               else { year + 2000 };
                    let res = (
                        year,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                    );
                    if prim.take_u8()? != b'Z' {
                        return Err(prim.content_err(
                            "malformed time value"
                        ))
                    }
                    Self::from_parts(res).map_err(|err| prim.content_err(err))
                }
                Tag::GENERALIZED_TIME => {
                    // RFC 5280 requires the format YYYYMMDDHHMMSSZ
                    let res = (
                        read_four_char(prim)? as i32,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                        read_two_char(prim)?,
                    );
                    if prim.take_u8()? != b'Z' {
                        return Err(prim.content_err(
                            "malformed time value"
                        ))
                    }
                    Self::from_parts(res).map_err(|err| prim.content_err(err))
                }
                _ => {
                    Err(prim.content_err(
                        "malformed time value"
                    ))
                }
            }
        })
    }

    /// Converts an opaque value into a time.
    ///
    /// The value must be a UTCTime or GeneralizedTime.
    pub fn from_tlv(tlv: &Tlv) -> Result<Self, Error> {
        if !tlv.is_universal(Tlv::UTC_TIME, false)
            && !tlv.is_universal(Tlv::GENERALIZED_TIME, false)
        {
            return Err(Error::WrongType)
        }
        Mode::Der.decode(tlv.to_bytes().as_ref(), Self::take_from)
            .map_err(Into::into)
    }

    fn from_parts(
        parts: (i32, u32, u32, u32, u32, u32)
    ) -> Result<Self, ContentError> {
        match Utc.with_ymd_and_hms(
            parts.0, parts.1, parts.2, parts.3, parts.4, parts.5
        ) {
            LocalResult::Single(dt) => Ok(Time(dt)),
            _ => Err(ContentError::from_static("malformed time value"))
        }
    }

    /// Returns the time as an opaque value.
    ///
    /// Times between 1950 and 2049 are encoded as UTCTime, all others as
    /// GeneralizedTime.
    pub fn to_tlv(self) -> Tlv {
        let year = self.0.year();
        if !(1950..=2049).contains(&year) {
            Tlv::primitive(
                Tlv::GENERALIZED_TIME,
                format!(
                    "{:04}{:02}{:02}{:02}{:02}{:02}Z",
                    year, self.0.month(), self.0.day(),
                    self.0.hour(), self.0.minute(), self.0.second()
                ).into()
            )
        }
        else {
            Tlv::primitive(
                Tlv::UTC_TIME,
                format!(
                    "{:02}{:02}{:02}{:02}{:02}{:02}Z",
                    year % 100, self.0.month(), self.0.day(),
                    self.0.hour(), self.0.minute(), self.0.second()
                ).into()
            )
        }
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}


fn read_two_char<S: decode::Source>(
    source: &mut S
) -> Result<u32, DecodeError<S::Error>> {
    let mut s = [0u8; 2];
    s[0] = source.take_u8()?;
    s[1] = source.take_u8()?;
    let s = match str::from_utf8(&s[..]) {
        Ok(s) => s,
        Err(_err) => {
            return Err(source.content_err("malformed time value"))
        }
    };
    u32::from_str(s).map_err(|_err| {
        source.content_err("malformed time value")
    })
}

fn read_four_char<S: decode::Source>(
    source: &mut S
) -> Result<u32, DecodeError<S::Error>> {
    let mut s = [0u8; 4];
    s[0] = source.take_u8()?;
    s[1] = source.take_u8()?;
    s[2] = source.take_u8()?;
    s[3] = source.take_u8()?;
    let s = match str::from_utf8(&s[..]) {
        Ok(s) => s,
        Err(_err) => {
            return Err(source.content_err("malformed time value"))
        }
    };
    u32::from_str(s).map_err(|_err| {
        source.content_err("malformed time value")
    })
}


//------------ Validity ------------------------------------------------------

#[derive(Clone, Debug, Copy, Eq, Hash, PartialEq)]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(self) -> Time {
        self.not_before
    }

    pub fn not_after(self) -> Time {
        self.not_after
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }
}


//------------ AlgorithmIdentifier -------------------------------------------

/// A generic algorithm identifier.
///
/// ```txt
/// AlgorithmIdentifier ::= SEQUENCE {
///      algorithm          OBJECT IDENTIFIER,
///      parameters         ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// The parameters are kept in their encoded form. They are considered
/// absent if the sequence contains nothing but the object identifier.
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    algorithm: Oid<Bytes>,
    parameters: Option<Captured>,
}

impl AlgorithmIdentifier {
    pub fn new(algorithm: Oid<Bytes>, parameters: Option<Captured>) -> Self {
        AlgorithmIdentifier { algorithm, parameters }
    }

    pub fn algorithm(&self) -> &Oid<Bytes> {
        &self.algorithm
    }

    pub fn parameters(&self) -> Option<&Captured> {
        self.parameters.as_ref()
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(Self::from_constructed)
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let algorithm = Oid::take_from(cons)?;
        let parameters = cons.capture_all()?;
        Ok(AlgorithmIdentifier {
            algorithm,
            parameters: if parameters.as_slice().is_empty() {
                None
            }
            else {
                Some(parameters)
            }
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.algorithm.encode_ref(),
            self.parameters.as_ref(),
        ))
    }
}


//--- PartialEq and Eq

impl PartialEq for AlgorithmIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm
            && self.parameters.as_ref().map(Captured::as_slice)
                == other.parameters.as_ref().map(Captured::as_slice)
    }
}

impl Eq for AlgorithmIdentifier { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use bcder::encode::Values;
    use super::*;

    #[test]
    fn serial_minimal() {
        assert!(Serial::from_bytes(Bytes::from_static(b"")).is_err());
        assert!(Serial::from_bytes(Bytes::from_static(b"\x00\x01")).is_err());
        assert!(Serial::from_bytes(Bytes::from_static(b"\xff\x80")).is_err());
        assert!(Serial::from_bytes(Bytes::from_static(b"\x00\x80")).is_ok());
        assert!(Serial::from_bytes(Bytes::from_static(b"\x80")).is_ok());
        assert_eq!(
            Serial::from_bytes(Bytes::from_static(b"\x10\x01"))
                .unwrap().to_string(),
            "1001"
        );
    }

    #[test]
    fn time_tlv() {
        let time = Time::utc(2026, 10, 18, 14, 35, 44).unwrap();
        let tlv = time.to_tlv();
        assert!(tlv.is_universal(Tlv::UTC_TIME, false));
        assert_eq!(tlv.content().as_ref(), b"261018143544Z");
        assert_eq!(Time::from_tlv(&tlv).unwrap(), time);

        let time = Time::utc(2126, 9, 24, 14, 35, 44).unwrap();
        let tlv = time.to_tlv();
        assert!(tlv.is_universal(Tlv::GENERALIZED_TIME, false));
        assert_eq!(tlv.content().as_ref(), b"21260924143544Z");
        assert_eq!(Time::from_tlv(&tlv).unwrap(), time);

        let tlv = Tlv::primitive(Tlv::OCTET_STRING, Bytes::from_static(b"x"));
        assert!(matches!(Time::from_tlv(&tlv), Err(Error::WrongType)));

        let tlv = Tlv::primitive(
            Tlv::UTC_TIME, Bytes::from_static(b"261318143544Z")
        );
        assert!(matches!(Time::from_tlv(&tlv), Err(Error::Decode(_))));
    }

    #[test]
    fn algorithm_identifier_parameters() {
        let with_null = b"\x30\x0d\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x0b\
                          \x05\x00";
        let without = b"\x30\x0b\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x0b";

        let alg = Mode::Der.decode(
            with_null.as_ref(), AlgorithmIdentifier::take_from
        ).unwrap();
        assert_eq!(alg.parameters().unwrap().as_slice(), b"\x05\x00");
        assert_eq!(
            alg.encode_ref().to_captured(Mode::Der).as_slice(),
            with_null.as_ref()
        );

        let bare = Mode::Der.decode(
            without.as_ref(), AlgorithmIdentifier::take_from
        ).unwrap();
        assert!(bare.parameters().is_none());
        assert_eq!(
            bare.encode_ref().to_captured(Mode::Der).as_slice(),
            without.as_ref()
        );
        assert_ne!(alg, bare);
        assert_eq!(bare.algorithm(), alg.algorithm());
    }
}

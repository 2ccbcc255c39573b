use std::fmt;

/// An ACNET status value.
///
/// The low byte is the facility code (unsigned), the high byte the error
/// code (signed). A negative error code is fatal, zero is success and a
/// positive error code is a warning.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i16);

impl Status {
    pub const SUCCESS: Status = Status::new(1, 0);
    pub const PEND: Status = Status::new(1, 1);
    pub const ENDMULT: Status = Status::new(1, 2);
    pub const RETRY: Status = Status::new(1, -1);
    pub const NOLCLMEM: Status = Status::new(1, -2);
    pub const NOREMMEM: Status = Status::new(1, -3);
    pub const RPLYPACK: Status = Status::new(1, -4);
    pub const REQPACK: Status = Status::new(1, -5);
    pub const REQTMO: Status = Status::new(1, -6);
    pub const NOCON: Status = Status::new(1, -21);

    /// Build a status from its facility and error code.
    pub const fn new(facility: u8, err_code: i8) -> Self {
        Status(((err_code as i16) << 8) | facility as i16)
    }

    /// Wrap a raw 16-bit status as found on the wire.
    pub const fn from_raw(raw: i16) -> Self {
        Status(raw)
    }

    /// The raw 16-bit value.
    pub const fn raw(self) -> i16 {
        self.0
    }

    pub const fn facility(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub const fn err_code(self) -> i8 {
        (self.0 >> 8) as i8
    }

    pub const fn is_success(self) -> bool {
        self.err_code() == 0
    }

    pub const fn is_fatal(self) -> bool {
        self.err_code() < 0
    }

    pub const fn is_warning(self) -> bool {
        self.err_code() > 0
    }

    /// Symbolic name for the well-known ACNET statuses.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "ACNET_SUCCESS",
            Self::PEND => "ACNET_PEND",
            Self::ENDMULT => "ACNET_ENDMULT",
            Self::RETRY => "ACNET_RETRY",
            Self::NOLCLMEM => "ACNET_NOLCLMEM",
            Self::NOREMMEM => "ACNET_NOREMMEM",
            Self::RPLYPACK => "ACNET_RPLYPACK",
            Self::REQPACK => "ACNET_REQPACK",
            Self::REQTMO => "ACNET_REQTMO",
            Self::NOCON => "ACNET_NOCON",
            _ => return None,
        };
        Some(name)
    }
}

impl From<i16> for Status {
    fn from(raw: i16) -> Self {
        Status(raw)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.facility(), self.err_code())
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Status({name} {self})"),
            None => write!(f, "Status({self})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_raw_values() {
        assert_eq!(Status::SUCCESS.raw(), 1);
        assert_eq!(Status::PEND.raw(), 257);
        assert_eq!(Status::ENDMULT.raw(), 513);
        assert_eq!(Status::RETRY.raw(), -255);
        assert_eq!(Status::NOCON.raw(), 1 - 21 * 256);
    }

    #[test]
    fn facility_and_error_roundtrip_for_all_values() {
        for facility in 0..=255u8 {
            for err_code in -128..=127i8 {
                let status = Status::new(facility, err_code);
                assert_eq!(status.facility(), facility);
                assert_eq!(status.err_code(), err_code);
                assert_eq!(Status::from_raw(status.raw()), status);
            }
        }
    }

    #[test]
    fn classification_follows_error_sign() {
        for raw in i16::MIN..=i16::MAX {
            let status = Status::from_raw(raw);
            let err = status.err_code();
            assert_eq!(status.is_fatal(), err < 0);
            assert_eq!(status.is_success(), err == 0);
            assert_eq!(status.is_warning(), err > 0);
        }
    }

    #[test]
    fn display_and_debug() {
        assert_eq!(Status::NOCON.to_string(), "[1 -21]");
        assert_eq!(format!("{:?}", Status::PEND), "Status(ACNET_PEND [1 1])");
        assert_eq!(format!("{:?}", Status::new(17, -3)), "Status([17 -3])");
    }

    #[test]
    fn pend_and_endmult_are_not_fatal() {
        assert!(Status::PEND.is_warning());
        assert!(Status::ENDMULT.is_warning());
        assert!(Status::SUCCESS.is_success());
        assert!(Status::NOCON.is_fatal());
    }
}

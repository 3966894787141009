use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A frame rate, parsed from ffprobe's rational `num/den` notation
/// (`24000/1001`) or from plain decimal text (`29.97`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate(f64);

impl FrameRate {
    /// Whether any of `candidates` lies strictly within `tolerance`.
    pub fn is_near_any(&self, candidates: &[f64], tolerance: f64) -> bool {
        candidates.iter().any(|candidate| (self.0 - candidate).abs() < tolerance)
    }
}

impl FromStr for FrameRate {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorKind::ParseError { field: "frame_rate", value: s.to_string() };
        let fps = match s.trim().split_once('/') {
            Some((num, den)) => {
                let num: u64 = num.trim().parse().map_err(|_| invalid())?;
                let den: u64 = den.trim().parse().map_err(|_| invalid())?;
                if den == 0 {
                    exn::bail!(invalid());
                }
                num as f64 / den as f64
            },
            None => s.trim().parse::<f64>().map_err(|_| invalid())?,
        };
        if !fps.is_finite() || fps <= 0.0 {
            exn::bail!(invalid());
        }
        Ok(Self(fps))
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("24000/1001", 23.976)]
    #[case("30000/1001", 29.970)]
    #[case("25/1", 25.0)]
    #[case("29.97", 29.97)]
    #[case(" 24 ", 24.0)]
    fn test_parse(#[case] input: &str, #[case] expected: f64) {
        let rate: FrameRate = input.parse().unwrap();
        assert!(rate.is_near_any(&[expected], 0.001), "{input} parsed as {rate}");
    }

    #[rstest]
    #[case("0/0")]
    #[case("24/0")]
    #[case("0")]
    #[case("-24")]
    #[case("1e400")]
    #[case("24000/1001/2")]
    #[case("twenty-four")]
    #[case("")]
    fn test_parse_invalid(#[case] input: &str) {
        let err = input.parse::<FrameRate>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "frame_rate", .. }));
    }

    #[test]
    fn test_tolerance() {
        let ntsc: FrameRate = "24000/1001".parse().unwrap();
        assert!(ntsc.is_near_any(&[23.98, 24.0], 0.1));
        assert!(!ntsc.is_near_any(&[25.0, 30.0], 0.1));
        assert_eq!(ntsc.to_string(), "23.98");
    }
}

use crate::error::ParseError;
use core::{fmt, str::FromStr};

/// Highest zoom level accepted. At zoom 30 the tile index still fits a
/// 32-bit signed integer.
pub const MAX_ZOOM: u8 = 30;

/// A validated slippy-map tile address.
///
/// Construction goes through [`TileCoord::parse`] (or [`TileCoord::new`]), so
/// every value satisfies `zoom <= 30` and `x, y < 2^zoom`. The format token is
/// carried through untouched; only the engine gives it meaning.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    zoom: u8,
    x: u32,
    y: u32,
    format: String,
}

impl TileCoord {
    /// Builds a coordinate from already-split components, applying the same
    /// range checks as [`TileCoord::parse`].
    pub fn new(zoom: i64, x: i64, y: i64, format: impl Into<String>) -> Result<Self, ParseError> {
        let format = format.into();
        if format.is_empty() {
            return Err(ParseError::MalformedPath);
        }
        if zoom < 0 {
            return Err(ParseError::InvalidZoom);
        }
        if zoom > i64::from(MAX_ZOOM) {
            return Err(ParseError::ZoomTooLarge);
        }
        if x < 0 || y < 0 {
            return Err(ParseError::NegativeCoordinate);
        }

        let bound = 1_i64 << zoom;
        if x >= bound {
            return Err(ParseError::XOutOfRange);
        }
        if y >= bound {
            return Err(ParseError::YOutOfRange);
        }

        // All three fit after the checks above.
        Ok(Self {
            zoom: zoom as u8,
            x: x as u32,
            y: y as u32,
            format,
        })
    }

    /// Parses a request path of the form `/{zoom}/{x}/{y}.{format}`.
    ///
    /// The numeric segments are base-10 and may carry a sign, so `/-1/0/0.pbf`
    /// is reported as [`ParseError::InvalidZoom`] rather than as a malformed
    /// path. The format is everything after the first `.` of the last segment
    /// and must be non-empty and free of whitespace.
    pub fn parse(path: &str) -> Result<Self, ParseError> {
        let rest = path.strip_prefix('/').ok_or(ParseError::MalformedPath)?;

        let mut segments = rest.splitn(3, '/');
        let zoom = segments.next().ok_or(ParseError::MalformedPath)?;
        let x = segments.next().ok_or(ParseError::MalformedPath)?;
        let last = segments.next().ok_or(ParseError::MalformedPath)?;
        let (y, format) = last.split_once('.').ok_or(ParseError::MalformedPath)?;

        if format.is_empty() || format.contains(['/', '.']) || format.contains(char::is_whitespace)
        {
            return Err(ParseError::MalformedPath);
        }

        Self::new(
            parse_int(zoom)?,
            parse_int(x)?,
            parse_int(y)?,
            format,
        )
    }

    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    pub const fn x(&self) -> u32 {
        self.x
    }

    pub const fn y(&self) -> u32 {
        self.y
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Number of tiles along one axis at this zoom (`2^zoom`).
    pub const fn bound(&self) -> u32 {
        1 << self.zoom
    }
}

fn parse_int(segment: &str) -> Result<i64, ParseError> {
    let digits = segment
        .strip_prefix(['-', '+'])
        .unwrap_or(segment);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::MalformedPath);
    }
    segment.parse().map_err(|_| ParseError::MalformedPath)
}

impl FromStr for TileCoord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}.{}", self.zoom, self.x, self.y, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(path: &str) -> TileCoord {
        TileCoord::parse(path).unwrap()
    }

    #[test]
    fn parses_every_zoom_at_its_corners() {
        for z in 0..=u32::from(MAX_ZOOM) {
            let max = (1_u64 << z) - 1;
            for (x, y) in [(0, 0), (max, 0), (0, max), (max, max), (max / 2, max / 3)] {
                let path = format!("/{z}/{x}/{y}.ext");
                let c = coord(&path);
                assert_eq!(u32::from(c.zoom()), z, "{path}");
                assert_eq!(u64::from(c.x()), x, "{path}");
                assert_eq!(u64::from(c.y()), y, "{path}");
                assert_eq!(c.format(), "ext");
                assert_eq!(c.to_string(), path);
            }
        }
    }

    #[test]
    fn zoom_31_is_too_large_whatever_the_tile() {
        for path in ["/31/0/0.pbf", "/31/5/5.png", "/31/-1/-1.pbf", "/1000/0/0.pbf"] {
            assert_eq!(TileCoord::parse(path), Err(ParseError::ZoomTooLarge), "{path}");
        }
    }

    #[test]
    fn x_at_bound_is_out_of_range() {
        assert_eq!(TileCoord::parse("/5/32/0.pbf"), Err(ParseError::XOutOfRange));
        assert_eq!(coord("/5/31/0.pbf").x(), 31);
        assert_eq!(TileCoord::parse("/5/0/32.pbf"), Err(ParseError::YOutOfRange));
        assert_eq!(TileCoord::parse("/0/1/0.pbf"), Err(ParseError::XOutOfRange));
    }

    #[test]
    fn x_is_checked_before_y() {
        assert_eq!(TileCoord::parse("/2/4/4.pbf"), Err(ParseError::XOutOfRange));
    }

    #[test]
    fn negative_values() {
        assert_eq!(TileCoord::parse("/-1/0/0.pbf"), Err(ParseError::InvalidZoom));
        assert_eq!(TileCoord::parse("/3/-1/0.pbf"), Err(ParseError::NegativeCoordinate));
        assert_eq!(TileCoord::parse("/3/0/-2.pbf"), Err(ParseError::NegativeCoordinate));
        assert_eq!(coord("/+3/+1/+2.pbf"), coord("/3/1/2.pbf"));
    }

    #[test]
    fn malformed_paths() {
        for path in [
            "",
            "/",
            "0/0/0.pbf",
            "/0/0.pbf",
            "/0/0/0",
            "/0/0/0.",
            "/a/0/0.pbf",
            "/0/b/0.pbf",
            "/0/0/c.pbf",
            "/0//0.pbf",
            "/0/0/.pbf",
            "/-/0/0.pbf",
            "/0/0/0.pbf/extra",
            "/0/0/0.tar.gz",
            "/0/0/0.p bf",
            "/1.5/0/0.pbf",
            "/0x1/0/0.pbf",
            "/1/99999999999999999999999/0.pbf",
        ] {
            assert_eq!(
                TileCoord::parse(path),
                Err(ParseError::MalformedPath),
                "{path:?}"
            );
        }
    }

    #[test]
    fn from_str_and_new_agree_with_parse() {
        let parsed: TileCoord = "/12/654/1583.mvt".parse().unwrap();
        assert_eq!(parsed, TileCoord::new(12, 654, 1583, "mvt").unwrap());
        assert_eq!(parsed.bound(), 4096);
        assert_eq!(TileCoord::new(1, 0, 0, ""), Err(ParseError::MalformedPath));
    }
}

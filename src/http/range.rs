//! HTTP Range request parsing module
//!
//! Single byte-range support (RFC 7233). Multi-range requests are ignored and
//! answered with the full file.

/// Inclusive byte range already clamped to the file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub const fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Valid range request
    Valid(ByteRange),
    /// Range not satisfiable for this file - should return 416
    NotSatisfiable,
    /// No Range header or malformed (ignore, return full content)
    None,
}

/// Parse HTTP Range header (single range only, bytes unit)
///
/// Supported formats:
/// - `bytes=start-end` - Specific range
/// - `bytes=start-` - From start to end
/// - `bytes=-suffix` - Last suffix bytes
///
/// # Examples
/// ```
/// use nocache_server::http::range::{parse_range_header, ByteRange, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=0-99"), 1000);
/// assert_eq!(result, RangeParseResult::Valid(ByteRange { start: 0, end: 99 }));
///
/// let result = parse_range_header(None, 1000);
/// assert_eq!(result, RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };

    if spec.contains(',') {
        return RangeParseResult::None;
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeParseResult::None;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        parse_suffix_range(end_str, file_size)
    } else {
        parse_standard_range(start_str, end_str, file_size)
    }
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, file_size: u64) -> RangeParseResult {
    let Ok(suffix) = suffix_str.parse::<u64>() else {
        return RangeParseResult::None;
    };

    if suffix == 0 || file_size == 0 {
        return RangeParseResult::NotSatisfiable;
    }

    // Suffix larger than the file selects the whole file
    RangeParseResult::Valid(ByteRange {
        start: file_size.saturating_sub(suffix),
        end: file_size - 1,
    })
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, file_size: u64) -> RangeParseResult {
    let Ok(start) = start_str.parse::<u64>() else {
        return RangeParseResult::None;
    };

    if start >= file_size {
        return RangeParseResult::NotSatisfiable;
    }

    let end = if end_str.is_empty() {
        file_size - 1
    } else {
        let Ok(e) = end_str.parse::<u64>() else {
            return RangeParseResult::None;
        };
        if e < start {
            // RFC 7233: last-byte-pos before first-byte-pos makes the header invalid
            return RangeParseResult::None;
        }
        e.min(file_size - 1)
    };

    RangeParseResult::Valid(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(start: u64, end: u64) -> RangeParseResult {
        RangeParseResult::Valid(ByteRange { start, end })
    }

    #[test]
    fn test_no_range() {
        assert_eq!(parse_range_header(None, 100), RangeParseResult::None);
        assert_eq!(parse_range_header(Some("items=0-1"), 100), RangeParseResult::None);
    }

    #[test]
    fn test_standard_and_open_ranges() {
        assert_eq!(parse_range_header(Some("bytes=0-9"), 100), valid(0, 9));
        assert_eq!(parse_range_header(Some("bytes=50-"), 100), valid(50, 99));
        assert_eq!(parse_range_header(Some("bytes=90-500"), 100), valid(90, 99));
        assert_eq!(valid(0, 9), RangeParseResult::Valid(ByteRange { start: 0, end: 9 }));
        assert_eq!(ByteRange { start: 50, end: 99 }.length(), 50);
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range_header(Some("bytes=-20"), 100), valid(80, 99));
        assert_eq!(parse_range_header(Some("bytes=-500"), 100), valid(0, 99));
    }

    #[test]
    fn test_not_satisfiable() {
        assert_eq!(
            parse_range_header(Some("bytes=200-"), 100),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=-0"), 100),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=0-"), 0),
            RangeParseResult::NotSatisfiable
        );
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(parse_range_header(Some("bytes=a-b"), 100), RangeParseResult::None);
        assert_eq!(
            parse_range_header(Some("bytes=0-9,20-29"), 100),
            RangeParseResult::None
        );
        assert_eq!(parse_range_header(Some("bytes=9-3"), 100), RangeParseResult::None);
        assert_eq!(parse_range_header(Some("bytes=5"), 100), RangeParseResult::None);
    }
}

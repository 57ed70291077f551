/// Inclusive byte span of a single-range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Malformed or multi-range; the whole body is served instead.
    Invalid,
    Unsatisfiable,
}

pub fn parse_range_header(value: &str, size: u64) -> Result<ByteRange, RangeError> {
    let ranges = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Invalid)?
        .trim();
    if ranges.contains(',') {
        return Err(RangeError::Invalid);
    }
    let (first, last) = ranges.split_once('-').ok_or(RangeError::Invalid)?;
    let number = |text: &str| text.trim().parse::<u64>().map_err(|_| RangeError::Invalid);

    if first.trim().is_empty() {
        let suffix = number(last)?;
        if suffix == 0 || size == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let start = number(first)?;
    let end = if last.trim().is_empty() {
        None
    } else {
        Some(number(last)?)
    };
    if matches!(end, Some(end) if end < start) {
        return Err(RangeError::Invalid);
    }
    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }
    let last_byte = size - 1;
    Ok(ByteRange {
        start,
        end: end.map_or(last_byte, |end| end.min(last_byte)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_closed_ranges() {
        assert_eq!(
            parse_range_header("bytes=0-", 100),
            Ok(ByteRange { start: 0, end: 99 })
        );
        let range = parse_range_header("bytes=10-19", 100).unwrap();
        assert_eq!(range, ByteRange { start: 10, end: 19 });
        assert_eq!(range.len(), 10);
        assert_eq!(range.content_range(100), "bytes 10-19/100");
    }

    #[test]
    fn end_past_the_file_is_clamped() {
        assert_eq!(
            parse_range_header("bytes=90-200", 100),
            Ok(ByteRange { start: 90, end: 99 })
        );
    }

    #[test]
    fn suffix_ranges_count_from_the_end() {
        assert_eq!(
            parse_range_header("bytes=-10", 100),
            Ok(ByteRange { start: 90, end: 99 })
        );
        assert_eq!(
            parse_range_header("bytes=-500", 100),
            Ok(ByteRange { start: 0, end: 99 })
        );
        assert_eq!(
            parse_range_header("bytes=-0", 100),
            Err(RangeError::Unsatisfiable)
        );
    }

    #[test]
    fn malformed_headers_are_invalid() {
        for header in ["items=0-1", "bytes=0-1,2-3", "bytes=10-5", "bytes=x-", "bytes=5"] {
            assert_eq!(parse_range_header(header, 100), Err(RangeError::Invalid), "{}", header);
        }
    }

    #[test]
    fn start_past_the_end_is_unsatisfiable() {
        assert_eq!(
            parse_range_header("bytes=100-", 100),
            Err(RangeError::Unsatisfiable)
        );
        assert_eq!(
            parse_range_header("bytes=0-", 0),
            Err(RangeError::Unsatisfiable)
        );
    }
}

use std::fmt;

/// Parse a human-friendly byte count such as `700MB`, `1.5 GiB` or `4096`.
///
/// # Grammar
///
/// ```text
/// size      = number separators? [ unit ] ;
/// number    = digits [ "." digits ] ;
/// unit      = "b" | "k" | "kb" | "kib" | "m" | "mb" | "mib"
///           | "g" | "gb" | "gib" | "t" | "tb" | "tib" ;
/// separators = { whitespace | "_" } ;
/// ```
///
/// Units are case-insensitive. Decimal units (`kb`, `mb`, ...) are powers of
/// 1000, `kib`-style units powers of 1024 and the single-letter forms are
/// treated as decimal. Fractional results are rounded down to whole bytes;
/// zero is rejected.
pub fn parse_size(value: &str) -> Result<u64, SizeParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::Empty);
    }

    if let Some((offset, ch)) = trimmed.char_indices().find(|(_, c)| !c.is_ascii()) {
        return Err(SizeParseError::UnexpectedChar {
            index: offset,
            found: ch,
        });
    }

    let bytes = trimmed.as_bytes();
    let (mantissa, scale, mut index) = parse_number(bytes)?;

    while index < bytes.len() && (bytes[index] == b'_' || bytes[index].is_ascii_whitespace()) {
        index += 1;
    }

    let unit = parse_unit(&trimmed[index..]).ok_or_else(|| SizeParseError::UnknownUnit {
        index,
        found: trimmed[index..].to_string(),
    })?;

    let total = mantissa
        .checked_mul(unit.bytes())
        .ok_or(SizeParseError::TooLarge)?
        / 10u128.pow(scale);

    if total == 0 {
        return Err(SizeParseError::Zero);
    }

    u64::try_from(total).map_err(|_| SizeParseError::TooLarge)
}

fn parse_number(bytes: &[u8]) -> Result<(u128, u32, usize), SizeParseError> {
    let mut index = 0usize;
    if !bytes.first().is_some_and(u8::is_ascii_digit) {
        return Err(SizeParseError::ExpectedNumber {
            index,
            found: bytes.first().map(|&b| b as char),
        });
    }

    let mut mantissa: u128 = 0;
    let mut scale: u32 = 0;
    let mut decimal_index = None;

    while index < bytes.len() {
        match bytes[index] {
            byte @ b'0'..=b'9' => {
                mantissa = mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(u128::from(byte - b'0')))
                    .ok_or(SizeParseError::TooLarge)?;
                if decimal_index.is_some() {
                    scale += 1;
                    if scale > MAX_FRACTION_DIGITS {
                        return Err(SizeParseError::FractionTooLong {
                            max_digits: MAX_FRACTION_DIGITS,
                        });
                    }
                }
            }
            b'.' if decimal_index.is_none() => decimal_index = Some(index),
            b'.' => return Err(SizeParseError::UnexpectedChar { index, found: '.' }),
            _ => break,
        }
        index += 1;
    }

    if let (Some(dot), 0) = (decimal_index, scale) {
        return Err(SizeParseError::MissingFractionDigits { index: dot });
    }

    Ok((mantissa, scale, index))
}

fn parse_unit(text: &str) -> Option<Unit> {
    let unit = match text.to_ascii_lowercase().as_str() {
        "" | "b" => Unit::Byte,
        "k" | "kb" => Unit::Kilo,
        "kib" => Unit::Kibi,
        "m" | "mb" => Unit::Mega,
        "mib" => Unit::Mebi,
        "g" | "gb" => Unit::Giga,
        "gib" => Unit::Gibi,
        "t" | "tb" => Unit::Tera,
        "tib" => Unit::Tebi,
        _ => return None,
    };
    Some(unit)
}

const MAX_FRACTION_DIGITS: u32 = 9;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Unit {
    Byte,
    Kilo,
    Kibi,
    Mega,
    Mebi,
    Giga,
    Gibi,
    Tera,
    Tebi,
}

impl Unit {
    fn bytes(self) -> u128 {
        match self {
            Unit::Byte => 1,
            Unit::Kilo => 1_000,
            Unit::Kibi => 1 << 10,
            Unit::Mega => 1_000_000,
            Unit::Mebi => 1 << 20,
            Unit::Giga => 1_000_000_000,
            Unit::Gibi => 1 << 30,
            Unit::Tera => 1_000_000_000_000,
            Unit::Tebi => 1 << 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeParseError {
    Empty,
    ExpectedNumber { index: usize, found: Option<char> },
    UnknownUnit { index: usize, found: String },
    MissingFractionDigits { index: usize },
    FractionTooLong { max_digits: u32 },
    UnexpectedChar { index: usize, found: char },
    Zero,
    TooLarge,
}

impl std::error::Error for SizeParseError {}

impl fmt::Display for SizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeParseError::Empty => write!(f, "size cannot be empty"),
            SizeParseError::ExpectedNumber { index, found } => match found {
                Some(ch) => write!(
                    f,
                    "expected a number at position {} but found '{}'",
                    index + 1,
                    ch
                ),
                None => write!(f, "expected a number at position {}", index + 1),
            },
            SizeParseError::UnknownUnit { index, found } => {
                write!(f, "unknown unit '{}' at position {}", found, index + 1)
            }
            SizeParseError::MissingFractionDigits { index } => write!(
                f,
                "expected digits after decimal point at position {}",
                index + 1
            ),
            SizeParseError::FractionTooLong { max_digits } => {
                write!(f, "sizes allow at most {max_digits} fractional digits")
            }
            SizeParseError::UnexpectedChar { index, found } => write!(
                f,
                "unexpected character '{}' at position {}",
                found,
                index + 1
            ),
            SizeParseError::Zero => write!(f, "size must be greater than zero"),
            SizeParseError::TooLarge => {
                write!(f, "size exceeds the maximum of {} bytes", u64::MAX)
            }
        }
    }
}

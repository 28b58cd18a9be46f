use counter::Counter;
use thiserror::Error;

/// Candidate delimiters, most preferred first. Any other ASCII punctuation
/// in the sample is tried only when none of these fit.
pub const DELIMITERS: [u8; 6] = [b',', b'\t', b';', b' ', b':', b'|'];

/// Smallest share of sample records that must agree on a field count.
const CONSISTENCY_THRESHOLD: f64 = 0.9;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SniffError {
    #[error("Need at least 2 lines to detect a dialect, found {0}")]
    TooShort(usize),
    #[error("Could not determine delimiter")]
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    Lf,
    CrLf,
    Cr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub double_quote: bool,
    pub escape: Option<u8>,
    pub line_terminator: LineTerminator,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            delimiter: b',',
            quote: b'"',
            double_quote: true,
            escape: None,
            line_terminator: LineTerminator::Lf,
        }
    }
}

impl Dialect {
    pub fn with_delimiter(delimiter: u8) -> Dialect {
        Dialect {
            delimiter,
            ..Dialect::default()
        }
    }

    /// Reader for this dialect. Headers are handled by the caller and rows
    /// of any width are returned so that short or long rows reach the
    /// database and fail there under the row policy.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut reader_builder = csv::ReaderBuilder::new();

        reader_builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(self.double_quote)
            .escape(self.escape);

        reader_builder
    }
}

/// Infer the dialect of a sample made of the first few raw lines of a file.
pub fn sniff(sample: &[u8]) -> Result<Dialect, SniffError> {
    let lines = sample
        .split(|byte| matches!(byte, b'\n' | b'\r'))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .count();

    if lines < 2 {
        return Err(SniffError::TooShort(lines));
    }

    let quote = guess_quote(sample);
    let escaped = contains_pair(sample, b'\\', quote) && !contains_pair(sample, quote, quote);

    let line_terminator = if contains_pair(sample, b'\r', b'\n') {
        LineTerminator::CrLf
    } else if sample.contains(&b'\r') {
        LineTerminator::Cr
    } else {
        LineTerminator::Lf
    };

    let mut dialect = Dialect {
        quote,
        double_quote: !escaped,
        escape: if escaped { Some(b'\\') } else { None },
        line_terminator,
        ..Dialect::default()
    };

    let delimiter = best_delimiter(sample, &dialect, &DELIMITERS)
        .or_else(|| best_delimiter(sample, &dialect, &other_punctuation(sample, &dialect)))
        .ok_or(SniffError::Inconsistent)?;

    dialect.delimiter = delimiter;
    Ok(dialect)
}

/// The candidate whose field counts agree best, ties going to the earlier one.
fn best_delimiter(sample: &[u8], dialect: &Dialect, candidates: &[u8]) -> Option<u8> {
    let mut best: Option<(f64, u8)> = None;

    for &delimiter in candidates {
        let trial = Dialect {
            delimiter,
            ..*dialect
        };
        let Some(share) = agreement(sample, &trial) else {
            continue;
        };
        if share < CONSISTENCY_THRESHOLD {
            continue;
        }
        if best.map_or(true, |(best_share, _)| share > best_share) {
            best = Some((share, delimiter));
        }
    }

    best.map(|(_, delimiter)| delimiter)
}

/// ASCII punctuation found in the sample that is not already a candidate,
/// the quote or the escape, in byte order.
fn other_punctuation(sample: &[u8], dialect: &Dialect) -> Vec<u8> {
    let mut found: Vec<u8> = sample
        .iter()
        .copied()
        .filter(|byte| byte.is_ascii_punctuation())
        .filter(|byte| !DELIMITERS.contains(byte) && *byte != dialect.quote && *byte != b'\\')
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

/// Share of records having the most common field count, or `None` when that
/// count is below two fields.
fn agreement(sample: &[u8], dialect: &Dialect) -> Option<f64> {
    let field_counts: Counter<usize> = dialect
        .reader_builder()
        .from_reader(sample)
        .byte_records()
        .filter_map(Result::ok)
        .map(|record| record.len())
        .collect();

    let total: usize = field_counts.values().sum();
    let (fields, frequency) = field_counts.most_common_ordered().into_iter().next()?;

    if fields < 2 {
        return None;
    }
    Some(frequency as f64 / total as f64)
}

fn guess_quote(sample: &[u8]) -> u8 {
    let mut double = 0;
    let mut single = 0;

    for (index, byte) in sample.iter().enumerate() {
        let opens_field = index == 0
            || matches!(sample[index - 1], b'\n' | b'\r')
            || DELIMITERS.contains(&sample[index - 1]);
        if !opens_field {
            continue;
        }
        match byte {
            b'"' => double += 1,
            b'\'' => single += 1,
            _ => {}
        }
    }

    if single > double {
        b'\''
    } else {
        b'"'
    }
}

fn contains_pair(sample: &[u8], first: u8, second: u8) -> bool {
    sample.windows(2).any(|pair| pair == [first, second])
}

//! Loading of counted record files.
//!
//! The format is a record count followed by that many whitespace-separated
//! records, each a comma-separated list of fields:
//!
//! ```text
//! 3
//! 1,2,0,1
//! 4,4,1,1
//! 9,0,-1,2
//! ```
//!
//! A missing file, a bad count, an unparsable record, or a record count that
//! disagrees with the header are all fatal [`Error::Input`] errors.

use crate::error::{Error, Result};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub fn read_counted_records<R, P>(path: P) -> Result<Vec<R>>
where
    R: FromStr,
    R::Err: Display,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::input(format!("cannot read {}: {}", path.display(), e)))?;
    parse_counted_records(&text)
        .map_err(|e| Error::input(format!("{}: {}", path.display(), input_message(e))))
}

fn input_message(err: Error) -> String {
    match err {
        Error::Input(msg) => msg,
        other => other.to_string(),
    }
}

pub fn parse_counted_records<R>(text: &str) -> Result<Vec<R>>
where
    R: FromStr,
    R::Err: Display,
{
    let mut tokens = text.split_whitespace();
    let header = tokens
        .next()
        .ok_or_else(|| Error::input("empty input, expected a record count"))?;
    let count: usize = header
        .parse()
        .map_err(|e| Error::input(format!("bad record count {:?}: {}", header, e)))?;

    // the header is untrusted; a record takes at least two bytes of text
    let mut records = Vec::with_capacity(count.min(text.len() / 2));
    for (index, token) in tokens.enumerate() {
        if index >= count {
            return Err(Error::input(format!(
                "inconsistent file data: more than {} records",
                count
            )));
        }
        let record = token
            .parse()
            .map_err(|e| Error::input(format!("record {} ({:?}): {}", index, token, e)))?;
        records.push(record);
    }

    if records.len() < count {
        return Err(Error::input(format!(
            "inconsistent file data: header says {} records, found {}",
            count,
            records.len()
        )));
    }
    Ok(records)
}

/// Split one record into exactly `N` comma-separated fields. Meant for
/// `FromStr` impls of record types.
pub fn fields<T, const N: usize>(record: &str) -> std::result::Result<[T; N], String>
where
    T: FromStr + Copy + Default,
    T::Err: Display,
{
    let mut out = [T::default(); N];
    let mut parts = record.split(',');
    for (i, slot) in out.iter_mut().enumerate() {
        let part = parts
            .next()
            .ok_or_else(|| format!("expected {} fields, found {}", N, i))?;
        *slot = part
            .trim()
            .parse()
            .map_err(|e| format!("field {} ({:?}): {}", i, part, e))?;
    }
    if parts.next().is_some() {
        return Err(format!("expected {} fields, found more", N));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flow {
        x: i32,
        y: i32,
        vx: i32,
        vy: i32,
    }

    impl FromStr for Flow {
        type Err = String;

        fn from_str(s: &str) -> std::result::Result<Self, String> {
            let [x, y, vx, vy] = fields::<i32, 4>(s)?;
            Ok(Flow { x, y, vx, vy })
        }
    }

    #[test]
    fn test_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2\n1,2,3,4\n-5,6,7,-8").unwrap();

        let flows: Vec<Flow> = read_counted_records(file.path()).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[1], Flow { x: -5, y: 6, vx: 7, vy: -8 });
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_counted_records::<Flow, _>(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, Error::Input(ref m) if m.contains("nope.txt")));
    }

    #[test]
    fn test_count_mismatch() {
        assert!(matches!(
            parse_counted_records::<Flow>("3\n1,2,3,4\n5,6,7,8"),
            Err(Error::Input(ref m)) if m.contains("found 2")
        ));
        assert!(matches!(
            parse_counted_records::<Flow>("1\n1,2,3,4\n5,6,7,8"),
            Err(Error::Input(ref m)) if m.contains("more than 1")
        ));
    }

    #[test]
    fn test_bad_record_and_header() {
        assert!(parse_counted_records::<Flow>("1\n1,2,x,4").is_err());
        assert!(parse_counted_records::<Flow>("1\n1,2,3").is_err());
        assert!(parse_counted_records::<Flow>("two\n1,2,3,4").is_err());
        assert!(parse_counted_records::<Flow>("").is_err());
    }

    #[test]
    fn test_plain_scalars() {
        let values: Vec<f64> = parse_counted_records("3 0.5 1.5 2.5").unwrap();
        assert_eq!(values, vec![0.5, 1.5, 2.5]);
        let empty: Vec<u32> = parse_counted_records("0").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_huge_count_is_an_input_error() {
        let text = format!("{}\n1,2,3,4", usize::MAX);
        assert!(matches!(
            parse_counted_records::<Flow>(&text),
            Err(Error::Input(ref m)) if m.contains("found 1")
        ));
        assert!(matches!(
            parse_counted_records::<u32>("1000000000000 7"),
            Err(Error::Input(_))
        ));
    }
}

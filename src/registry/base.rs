//! The 14 base scopes: they read the file record directly, without a
//! Markdown parse.

use super::{QualifierSpec, Registry};
use crate::value::{CastValue, QueryValue};
use anyhow::{anyhow, bail, Result};
use jiff::{civil, tz::TimeZone, Timestamp};
use mdseek_syntax::LeafKind;
use mdwalk::FileRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static HAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Han}").expect("han pattern"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"!\[.*?\]\(.*\)|<img.*?src=".*?""#).expect("image pattern"));
static SIZE_OPERAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)(k|m|g|kb|mb|gb)$").expect("size pattern"));

fn text_of(record: &FileRecord) -> String {
    String::from_utf8_lossy(&record.data).into_owned()
}

pub(super) fn install(registry: &mut Registry) {
    registry.register([
        QualifierSpec::new("default", "Content and path", |record| {
            Ok(QueryValue::Str(format!(
                "{}\n{}",
                text_of(record),
                record.path
            )))
        }),
        QualifierSpec::new("path", "Path", |record| {
            Ok(QueryValue::Str(record.path.clone()))
        })
        .meta(),
        QualifierSpec::new("file", "File name", |record| {
            Ok(QueryValue::Str(record.file.clone()))
        })
        .meta(),
        QualifierSpec::new("ext", "Extension", |record| {
            Ok(QueryValue::Str(extname(&record.file)))
        })
        .meta(),
        QualifierSpec::new("content", "Content", |record| {
            Ok(QueryValue::Str(text_of(record)))
        }),
        QualifierSpec::new("time", "Modified date", |record| {
            Ok(QueryValue::EpochMs(local_midnight_of_epoch_ms(
                record.stats.mtime_ms,
            )?))
        })
        .meta()
        .validate(validate_date)
        .cast(cast_date),
        QualifierSpec::new("size", "Size", |record| {
            Ok(QueryValue::Num(record.stats.size))
        })
        .meta()
        .validate(validate_size)
        .cast(cast_size),
        QualifierSpec::new("linenum", "Line count", |record| {
            Ok(QueryValue::Num(text_of(record).split('\n').count() as u64))
        })
        .validate(validate_number)
        .cast(cast_number),
        QualifierSpec::new("charnum", "Character count", |record| {
            Ok(QueryValue::Num(text_of(record).chars().count() as u64))
        })
        .validate(validate_number)
        .cast(cast_number),
        QualifierSpec::new("chinesenum", "Chinese character count", |record| {
            Ok(QueryValue::Num(
                HAN.find_iter(&text_of(record)).count() as u64
            ))
        })
        .validate(validate_number)
        .cast(cast_number),
        QualifierSpec::new("crlf", "Has CRLF line endings", |record| {
            Ok(QueryValue::Bool(
                memchr::memmem::find(&record.data, b"\r\n").is_some(),
            ))
        })
        .validate(validate_boolean)
        .cast(cast_boolean),
        QualifierSpec::new("hasimage", "Has image", |record| {
            Ok(QueryValue::Bool(IMAGE.is_match(&text_of(record))))
        })
        .validate(validate_boolean)
        .cast(cast_boolean),
        QualifierSpec::new("haschinese", "Has Chinese characters", |record| {
            Ok(QueryValue::Bool(HAN.is_match(&text_of(record))))
        })
        .validate(validate_boolean)
        .cast(cast_boolean),
        QualifierSpec::new("line", "Line", |record| {
            Ok(QueryValue::List(
                text_of(record)
                    .split('\n')
                    .map(|line| line.trim().to_string())
                    .collect(),
            ))
        }),
    ]);
}

/// `extname` semantics: leading dot included, empty when the name has no dot
/// past its first character (so dotfiles carry no extension).
fn extname(name: &str) -> String {
    match name[1.min(name.len())..].rfind('.') {
        Some(pos) => name[pos + 1..].to_string(),
        None => String::new(),
    }
}

/// Guard shared by the comparable scopes: no `:`, no regexp literals.
fn comparable_guard(operator: &str, kind: LeafKind) -> Result<(), String> {
    if kind == LeafKind::Regexp {
        return Err("Regular expression operand is not supported".to_string());
    }
    if operator == ":" {
        return Err("Unsupported operator:「:」".to_string());
    }
    Ok(())
}

fn validate_number(_scope: &str, operator: &str, operand: &str, kind: LeafKind) -> Result<(), String> {
    comparable_guard(operator, kind)?;
    if operand.parse::<u64>().is_err() {
        return Err("Operand must be a number".to_string());
    }
    Ok(())
}

fn cast_number(operand: &str, _kind: LeafKind) -> Result<CastValue> {
    Ok(CastValue::Num(operand.parse()?))
}

fn validate_size(_scope: &str, operator: &str, operand: &str, kind: LeafKind) -> Result<(), String> {
    comparable_guard(operator, kind)?;
    if !SIZE_OPERAND.is_match(operand) {
        return Err(
            "Operand must be a number followed by a unit: mb|gb|kb|k|m|g".to_string(),
        );
    }
    Ok(())
}

/// `10kb` → 10240; unit multipliers are binary powers of 1024.
fn cast_size(operand: &str, _kind: LeafKind) -> Result<CastValue> {
    let captures = SIZE_OPERAND
        .captures(operand)
        .ok_or_else(|| anyhow!("Invalid size operand: {operand:?}"))?;
    let value: f64 = captures[1].parse()?;
    let multiplier = match captures[2].to_ascii_lowercase().as_str() {
        "k" | "kb" => 1024u64,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        unit => bail!("Unknown size unit: {unit:?}"),
    };
    Ok(CastValue::Num((value * multiplier as f64).round() as u64))
}

fn validate_date(_scope: &str, operator: &str, operand: &str, kind: LeafKind) -> Result<(), String> {
    comparable_guard(operator, kind)?;
    if parse_calendar_date(operand).is_none() {
        return Err("Operand must be a calendar date".to_string());
    }
    Ok(())
}

fn cast_date(operand: &str, _kind: LeafKind) -> Result<CastValue> {
    let date = parse_calendar_date(operand)
        .ok_or_else(|| anyhow!("Unrecognized date literal: {operand}"))?;
    Ok(CastValue::EpochMs(local_midnight_of_date(date)?))
}

/// Accepts `-`, `/` and `.` separated dates, year-first or day/month-first,
/// preferring the layout the literal itself suggests.
fn parse_calendar_date(raw: &str) -> Option<civil::Date> {
    let trimmed = raw.trim();
    let separator = trimmed.chars().find(|ch| matches!(ch, '-' | '/' | '.'))?;
    let mut formats = match separator {
        '-' => vec!["%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y"],
        '/' => vec!["%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"],
        '.' => vec!["%Y.%m.%d", "%d.%m.%Y", "%m.%d.%Y"],
        _ => return None,
    };
    let year_first = trimmed.len() >= 4
        && trimmed.chars().take(4).all(|c| c.is_ascii_digit())
        && matches!(trimmed.chars().nth(4), Some('-' | '/' | '.'));
    if !year_first {
        formats.rotate_left(1);
    }
    formats
        .into_iter()
        .find_map(|format| civil::Date::strptime(format, trimmed).ok())
}

fn local_midnight_of_date(date: civil::Date) -> Result<i64> {
    let zoned = TimeZone::system().to_zoned(date.at(0, 0, 0, 0))?;
    Ok(zoned.timestamp().as_millisecond())
}

/// Truncates an mtime to the local midnight of its calendar day.
fn local_midnight_of_epoch_ms(epoch_ms: i64) -> Result<i64> {
    let tz = TimeZone::system();
    let date = Timestamp::from_millisecond(epoch_ms)?.to_zoned(tz.clone()).date();
    let midnight = tz.to_zoned(date.at(0, 0, 0, 0))?;
    Ok(midnight.timestamp().as_millisecond())
}

fn validate_boolean(
    _scope: &str,
    operator: &str,
    operand: &str,
    kind: LeafKind,
) -> Result<(), String> {
    if kind == LeafKind::Regexp {
        return Err("Regular expression operand is not supported".to_string());
    }
    if !matches!(operator, "=" | "!=") {
        return Err(format!("Unsupported operator:「{operator}」"));
    }
    if !operand.eq_ignore_ascii_case("true") && !operand.eq_ignore_ascii_case("false") {
        return Err("Operand must be「true」or「false」".to_string());
    }
    Ok(())
}

fn cast_boolean(operand: &str, _kind: LeafKind) -> Result<CastValue> {
    Ok(CastValue::Bool(operand.eq_ignore_ascii_case("true")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdwalk::FileStats;

    fn record(data: &str) -> FileRecord {
        FileRecord {
            path: "/notes/a.md".to_string(),
            file: "a.md".to_string(),
            stats: FileStats {
                size: data.len() as u64,
                mtime_ms: 0,
            },
            data: data.as_bytes().to_vec(),
        }
    }

    fn query(scope: &str, data: &str) -> QueryValue {
        let registry = {
            let mut registry = Registry::empty();
            install(&mut registry);
            registry
        };
        registry.get(scope).unwrap().query(&record(data)).unwrap()
    }

    #[test]
    fn extname_includes_the_leading_dot() {
        assert_eq!(extname("a.md"), ".md");
        assert_eq!(extname("archive.tar.gz"), ".gz");
        assert_eq!(extname("README"), "");
        assert_eq!(extname(".gitignore"), "");
    }

    #[test]
    fn default_scope_joins_content_and_path() {
        assert_eq!(
            query("default", "hello"),
            QueryValue::Str("hello\n/notes/a.md".to_string())
        );
    }

    #[test]
    fn counting_scopes() {
        assert_eq!(query("linenum", "a\nb\nc"), QueryValue::Num(3));
        assert_eq!(query("charnum", "héllo"), QueryValue::Num(5));
        assert_eq!(query("chinesenum", "中文 ok 字"), QueryValue::Num(3));
    }

    #[test]
    fn boolean_scopes() {
        assert_eq!(query("crlf", "a\r\nb"), QueryValue::Bool(true));
        assert_eq!(query("crlf", "a\nb"), QueryValue::Bool(false));
        assert_eq!(
            query("hasimage", "look ![alt](a.png) here"),
            QueryValue::Bool(true)
        );
        assert_eq!(
            query("hasimage", r#"<img class="x" src="a.png""#),
            QueryValue::Bool(true)
        );
        assert_eq!(query("hasimage", "plain"), QueryValue::Bool(false));
        assert_eq!(query("haschinese", "你好"), QueryValue::Bool(true));
    }

    #[test]
    fn line_scope_trims_each_line() {
        assert_eq!(
            query("line", "  a  \nb"),
            QueryValue::List(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn size_operand_validation_is_authoritative() {
        let err = validate_size("size", ">", "10", LeafKind::Keyword).unwrap_err();
        assert_eq!(
            err,
            "Operand must be a number followed by a unit: mb|gb|kb|k|m|g"
        );
        assert!(validate_size("size", ">", "10kb", LeafKind::Keyword).is_ok());
        assert!(validate_size("size", ">", "1.5M", LeafKind::Keyword).is_ok());
        assert!(validate_size("size", ":", "10kb", LeafKind::Keyword).is_err());
        assert!(validate_size("size", ">", "10kb", LeafKind::Regexp).is_err());
    }

    #[test]
    fn size_cast_uses_binary_multipliers() {
        let CastValue::Num(bytes) = cast_size("10kb", LeafKind::Keyword).unwrap() else {
            panic!("expected a number");
        };
        assert_eq!(bytes, 10 * 1024);
        let CastValue::Num(bytes) = cast_size("1.5k", LeafKind::Keyword).unwrap() else {
            panic!("expected a number");
        };
        assert_eq!(bytes, 1536);
        let CastValue::Num(bytes) = cast_size("2G", LeafKind::Keyword).unwrap() else {
            panic!("expected a number");
        };
        assert_eq!(bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn date_operands_parse_in_common_layouts() {
        assert!(parse_calendar_date("2024-03-12").is_some());
        assert!(parse_calendar_date("2024/3/12").is_some());
        assert!(parse_calendar_date("12.03.2024").is_some());
        assert!(parse_calendar_date("tomorrow").is_none());
        assert!(validate_date("time", ":", "2024-03-12", LeafKind::Keyword).is_err());
        assert!(validate_date("time", "=", "2024-03-12", LeafKind::Keyword).is_ok());
    }

    #[test]
    fn mtime_truncates_to_local_midnight() {
        let CastValue::EpochMs(expected) = cast_date("2024-03-12", LeafKind::Keyword).unwrap()
        else {
            panic!("expected epoch millis");
        };
        // 15:00 local on the same day truncates back to the same midnight.
        let later = expected + 15 * 60 * 60 * 1000;
        assert_eq!(local_midnight_of_epoch_ms(later).unwrap(), expected);
    }

    #[test]
    fn boolean_operands() {
        assert!(validate_boolean("crlf", "=", "true", LeafKind::Keyword).is_ok());
        assert!(validate_boolean("crlf", "=", "FALSE", LeafKind::Keyword).is_ok());
        assert!(validate_boolean("crlf", ":", "true", LeafKind::Keyword).is_err());
        assert!(validate_boolean("crlf", "=", "yes", LeafKind::Keyword).is_err());
        assert!(matches!(
            cast_boolean("true", LeafKind::Keyword).unwrap(),
            CastValue::Bool(true)
        ));
    }
}

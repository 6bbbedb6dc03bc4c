//! printf-style template formatting for event messages
//!
//! Placeholders follow `%[index$][flags][width][.precision]conversion`.

use lazy_regex::regex;
use std::fmt;

use crate::line_writer::LINE_SEPARATOR;

/// One argument substituted into a template
#[derive(Debug, Clone, PartialEq)]
pub enum FormatArg {
    Str(String),
    /// Signed integer and the bit width of its source type, so `%x` and `%o`
    /// render negatives in that width's two's complement
    Int { value: i64, bits: u32 },
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl FormatArg {
    fn type_name(&self) -> &'static str {
        match self {
            FormatArg::Str(_) => "string",
            FormatArg::Int { .. } | FormatArg::UInt(_) => "integer",
            FormatArg::Float(_) => "float",
            FormatArg::Bool(_) => "bool",
            FormatArg::Char(_) => "char",
        }
    }
}

impl fmt::Display for FormatArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatArg::Str(s) => f.write_str(s),
            FormatArg::Int { value, .. } => write!(f, "{}", value),
            FormatArg::UInt(v) => write!(f, "{}", v),
            FormatArg::Float(v) => write!(f, "{}", v),
            FormatArg::Bool(v) => write!(f, "{}", v),
            FormatArg::Char(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FormatArg {
    fn from(value: &str) -> Self {
        FormatArg::Str(value.to_string())
    }
}

impl From<String> for FormatArg {
    fn from(value: String) -> Self {
        FormatArg::Str(value)
    }
}

impl From<&String> for FormatArg {
    fn from(value: &String) -> Self {
        FormatArg::Str(value.clone())
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FormatArg {
            fn from(value: $t) -> Self {
                FormatArg::Int {
                    value: value as i64,
                    bits: <$t>::BITS,
                }
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FormatArg {
            fn from(value: $t) -> Self {
                FormatArg::UInt(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for FormatArg {
    fn from(value: f32) -> Self {
        FormatArg::Float(value as f64)
    }
}

impl From<f64> for FormatArg {
    fn from(value: f64) -> Self {
        FormatArg::Float(value)
    }
}

impl From<bool> for FormatArg {
    fn from(value: bool) -> Self {
        FormatArg::Bool(value)
    }
}

impl From<char> for FormatArg {
    fn from(value: char) -> Self {
        FormatArg::Char(value)
    }
}

/// Build a `&[FormatArg]` from a list of convertible values
///
/// ```
/// use buildlog::{fargs, format_template};
/// let s = format_template("retry %d of %d", fargs![2, 5]).unwrap();
/// assert_eq!(s, "retry 2 of 5");
/// ```
#[macro_export]
macro_rules! fargs {
    ($($arg:expr),* $(,)?) => {
        &[$($crate::format::FormatArg::from($arg)),*][..]
    };
}

/// Template/argument mismatch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    #[error("missing argument for '{spec}' (argument {index})")]
    MissingArgument { spec: String, index: usize },
    #[error("'{spec}' cannot format a {found} argument")]
    Conversion { spec: String, found: &'static str },
    #[error("unknown conversion '{0}'")]
    UnknownConversion(String),
    #[error("malformed template: {0}")]
    Malformed(String),
}

#[derive(Debug, Default)]
struct Spec<'a> {
    text: &'a str,
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Largest width or precision a placeholder may request
pub const MAX_FIELD: usize = u16::MAX as usize;

/// Substitute `args` into `template`
///
/// Arguments beyond the last placeholder are ignored.
pub fn format_template(template: &str, args: &[FormatArg]) -> Result<String, FormatError> {
    let re = regex!(r"%(?:(\d+)\$)?([-+ 0]*)(\d+)?(?:\.(\d+))?([a-zA-Z%])");

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut next_arg = 0;

    for caps in re.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        push_literal(&mut out, &template[last..whole.start()])?;
        last = whole.end();

        let flags = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let text = whole.as_str();
        let spec = Spec {
            text,
            left: flags.contains('-'),
            zero: flags.contains('0'),
            plus: flags.contains('+'),
            space: flags.contains(' '),
            width: field(caps.get(3), text, "width")?,
            precision: field(caps.get(4), text, "precision")?,
        };
        let conversion = caps.get(5).map(|m| m.as_str()).unwrap_or("");

        match conversion {
            "%" => {
                out.push_str(&pad(&spec, "%".to_string(), false));
                continue;
            }
            "n" => {
                out.push_str(LINE_SEPARATOR);
                continue;
            }
            _ => {}
        }

        let index = match field(caps.get(1), spec.text, "argument index")? {
            Some(0) => return Err(FormatError::Malformed(format!("argument index 0 in '{}'", spec.text))),
            Some(explicit) => explicit - 1,
            None => {
                let i = next_arg;
                next_arg += 1;
                i
            }
        };
        let arg = args.get(index).ok_or_else(|| FormatError::MissingArgument {
            spec: spec.text.to_string(),
            index: index + 1,
        })?;

        out.push_str(&convert(&spec, conversion, arg)?);
    }

    push_literal(&mut out, &template[last..])?;
    Ok(out)
}

fn field(
    m: Option<lazy_regex::regex::Match<'_>>,
    spec: &str,
    what: &str,
) -> Result<Option<usize>, FormatError> {
    let Some(m) = m else { return Ok(None) };
    match m.as_str().parse::<usize>() {
        Ok(n) if n <= MAX_FIELD => Ok(Some(n)),
        _ => Err(FormatError::Malformed(format!(
            "{} {} in '{}' exceeds {}",
            what,
            m.as_str(),
            spec,
            MAX_FIELD
        ))),
    }
}

fn push_literal(out: &mut String, literal: &str) -> Result<(), FormatError> {
    if let Some(pos) = literal.find('%') {
        return Err(FormatError::Malformed(format!("stray '%' near '{}'", &literal[pos..])));
    }
    out.push_str(literal);
    Ok(())
}

fn convert(spec: &Spec<'_>, conversion: &str, arg: &FormatArg) -> Result<String, FormatError> {
    let mismatch = || FormatError::Conversion {
        spec: spec.text.to_string(),
        found: arg.type_name(),
    };

    let rendered = match conversion {
        "s" | "S" => {
            let mut s = arg.to_string();
            if let Some(p) = spec.precision {
                s = s.chars().take(p).collect();
            }
            if conversion == "S" {
                s = s.to_uppercase();
            }
            pad(spec, s, false)
        }
        "d" => match arg {
            FormatArg::Int { value, .. } => pad(
                spec,
                signed(spec, *value < 0, value.unsigned_abs().to_string()),
                true,
            ),
            FormatArg::UInt(v) => pad(spec, signed(spec, false, v.to_string()), true),
            _ => return Err(mismatch()),
        },
        "x" | "X" | "o" => {
            let digits = match (arg, conversion) {
                (FormatArg::Int { value, bits }, "o") => format!("{:o}", twos_complement(*value, *bits)),
                (FormatArg::Int { value, bits }, _) => format!("{:x}", twos_complement(*value, *bits)),
                (FormatArg::UInt(v), "o") => format!("{:o}", v),
                (FormatArg::UInt(v), _) => format!("{:x}", v),
                _ => return Err(mismatch()),
            };
            let digits = if conversion == "X" { digits.to_uppercase() } else { digits };
            pad(spec, digits, true)
        }
        "f" => match arg {
            FormatArg::Float(v) => {
                let digits = format!("{:.*}", spec.precision.unwrap_or(6), v.abs());
                pad(spec, signed(spec, v.is_sign_negative(), digits), true)
            }
            _ => return Err(mismatch()),
        },
        "e" | "E" => match arg {
            FormatArg::Float(v) => {
                let digits = scientific(v.abs(), spec.precision.unwrap_or(6));
                let digits = if conversion == "E" { digits.to_uppercase() } else { digits };
                pad(spec, signed(spec, v.is_sign_negative(), digits), true)
            }
            _ => return Err(mismatch()),
        },
        "c" => match arg {
            FormatArg::Char(c) => pad(spec, c.to_string(), false),
            _ => return Err(mismatch()),
        },
        "b" | "B" => {
            let value = match arg {
                FormatArg::Bool(b) => *b,
                _ => true,
            };
            let s = if conversion == "B" {
                value.to_string().to_uppercase()
            } else {
                value.to_string()
            };
            pad(spec, s, false)
        }
        other => return Err(FormatError::UnknownConversion(other.to_string())),
    };
    Ok(rendered)
}

fn twos_complement(value: i64, bits: u32) -> u64 {
    let mask = if bits >= u64::BITS { u64::MAX } else { (1u64 << bits) - 1 };
    (value as u64) & mask
}

fn signed(spec: &Spec<'_>, negative: bool, digits: String) -> String {
    if negative {
        format!("-{}", digits)
    } else if spec.plus {
        format!("+{}", digits)
    } else if spec.space {
        format!(" {}", digits)
    } else {
        digits
    }
}

// Exponent always carries a sign and at least two digits: 1.500000e+03
fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, magnitude) = match exp.strip_prefix('-') {
                Some(m) => ('-', m),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, magnitude)
        }
        None => raw,
    }
}

fn pad(spec: &Spec<'_>, s: String, numeric: bool) -> String {
    let width = match spec.width {
        Some(w) => w,
        None => return s,
    };
    let len = s.chars().count();
    if len >= width {
        return s;
    }
    let fill = width - len;
    if spec.left {
        format!("{}{}", s, " ".repeat(fill))
    } else if spec.zero && numeric {
        let sign_len = s.chars().take_while(|c| matches!(c, '-' | '+' | ' ')).count();
        let (sign, rest) = s.split_at(sign_len);
        format!("{}{}{}", sign, "0".repeat(fill), rest)
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fargs;

    #[test]
    fn test_sequential_integers() {
        assert_eq!(format_template("retry %d of %d", fargs![2, 5]).unwrap(), "retry 2 of 5");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(format_template("disk full", &[]).unwrap(), "disk full");
    }

    #[test]
    fn test_strings_and_escapes() {
        let out = format_template("%s is 100%% done", fargs!["step"]).unwrap();
        assert_eq!(out, "step is 100% done");
    }

    #[test]
    fn test_explicit_index() {
        let out = format_template("%2$s before %1$s", fargs!["a", "b"]).unwrap();
        assert_eq!(out, "b before a");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(format_template("[%5d]", fargs![42]).unwrap(), "[   42]");
        assert_eq!(format_template("[%-5d]", fargs![42]).unwrap(), "[42   ]");
        assert_eq!(format_template("[%05d]", fargs![-42]).unwrap(), "[-0042]");
        assert_eq!(format_template("[%+d]", fargs![7]).unwrap(), "[+7]");
    }

    #[test]
    fn test_hex_and_octal() {
        assert_eq!(format_template("%x %X %o", fargs![255, 255, 8]).unwrap(), "ff FF 10");
    }

    #[test]
    fn test_floats() {
        assert_eq!(format_template("%.2f", fargs![3.14159]).unwrap(), "3.14");
        assert_eq!(format_template("%f", fargs![1.5]).unwrap(), "1.500000");
        assert_eq!(format_template("%.3e", fargs![1500.0]).unwrap(), "1.500e+03");
        assert_eq!(format_template("%.1e", fargs![0.05]).unwrap(), "5.0e-02");
    }

    #[test]
    fn test_string_precision_and_upper() {
        assert_eq!(format_template("%.3s", fargs!["abcdef"]).unwrap(), "abc");
        assert_eq!(format_template("%S", fargs!["ok"]).unwrap(), "OK");
    }

    #[test]
    fn test_bool_and_char() {
        assert_eq!(format_template("%b %b %c", fargs![false, "x", 'z']).unwrap(), "false true z");
    }

    #[test]
    fn test_line_separator() {
        let out = format_template("a%nb", &[]).unwrap();
        assert_eq!(out, format!("a{}b", LINE_SEPARATOR));
    }

    #[test]
    fn test_extra_arguments_ignored() {
        assert_eq!(format_template("only %s", fargs!["one", "two"]).unwrap(), "only one");
    }

    #[test]
    fn test_missing_argument() {
        let err = format_template("retry %d of %d", fargs![2]).unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingArgument {
                spec: "%d".to_string(),
                index: 2
            }
        );
    }

    #[test]
    fn test_conversion_mismatch() {
        let err = format_template("%d", fargs!["two"]).unwrap_err();
        assert!(matches!(err, FormatError::Conversion { found: "string", .. }));
    }

    #[test]
    fn test_unknown_conversion() {
        let err = format_template("%q", fargs![1]).unwrap_err();
        assert_eq!(err, FormatError::UnknownConversion("q".to_string()));
    }

    #[test]
    fn test_negative_hex_uses_source_width() {
        assert_eq!(format_template("%x", fargs![-1i32]).unwrap(), "ffffffff");
        assert_eq!(format_template("%X", fargs![-2i8]).unwrap(), "FE");
        assert_eq!(format_template("%o", fargs![-1i16]).unwrap(), "177777");
        assert_eq!(format_template("%x", fargs![-1i64]).unwrap(), "ffffffffffffffff");
        assert_eq!(format_template("%d", fargs![-1i8]).unwrap(), "-1");
    }

    #[test]
    fn test_oversized_precision_is_malformed() {
        assert!(matches!(
            format_template("%.70000f", fargs![1.0]),
            Err(FormatError::Malformed(_))
        ));
        assert!(matches!(
            format_template("%.70000e", fargs![1.0]),
            Err(FormatError::Malformed(_))
        ));
    }

    #[test]
    fn test_oversized_width_is_malformed() {
        assert!(matches!(
            format_template("%99999999999s", fargs!["x"]),
            Err(FormatError::Malformed(_))
        ));
        // Overflows usize entirely
        assert!(matches!(
            format_template("%99999999999999999999999d", fargs![1]),
            Err(FormatError::Malformed(_))
        ));
        assert!(matches!(
            format_template("%99999999999999999999999$s", fargs!["x"]),
            Err(FormatError::Malformed(_))
        ));
    }

    #[test]
    fn test_width_at_limit_is_accepted() {
        let out = format_template(&format!("%{}s", MAX_FIELD), fargs!["x"]).unwrap();
        assert_eq!(out.len(), MAX_FIELD);
    }

    #[test]
    fn test_trailing_percent_is_malformed() {
        assert!(matches!(format_template("50%", &[]), Err(FormatError::Malformed(_))));
    }
}

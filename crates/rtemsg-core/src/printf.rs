// crates/rtemsg-core/src/printf.rs
//
// Renderer for the printf-style format strings carried by the field
// descriptors. The compiler splits every formatting string so that one
// piece holds at most one conversion; this renders such a piece with its
// single argument. Supported: flags `-+ 0#`, width, precision, the
// length modifiers h/l/ll (accepted and ignored - values are already
// 64-bit), conversions d i u o x X c s e E f F g G a A and %%.

#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    U(u64),
    I(i64),
    F(f64),
    S(&'a str),
}

#[derive(Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

/// Render a format piece with at most one conversion directive.
/// A piece without a directive (or with only `%%`) ignores the argument.
pub fn format_one(fmt: &str, arg: Option<Arg>) -> String {
    let mut out = String::with_capacity(fmt.len() + 16);
    let bytes = fmt.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'%' {
                i += 1;
            }
            out.push_str(&fmt[start..i]);
            continue;
        }

        if i + 1 < bytes.len() && bytes[i + 1] == b'%' {
            out.push('%');
            i += 2;
            continue;
        }

        i += 1; // skip '%'
        let mut spec = Spec::default();

        while i < bytes.len() {
            match bytes[i] {
                b'-' => spec.minus = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'0' => spec.zero = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }

        while i < bytes.len() && bytes[i].is_ascii_digit() {
            spec.width = spec.width * 10 + (bytes[i] - b'0') as usize;
            i += 1;
        }

        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            let mut prec = 0usize;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                prec = prec * 10 + (bytes[i] - b'0') as usize;
                i += 1;
            }
            spec.precision = Some(prec);
        }

        while i < bytes.len() && (bytes[i] == b'h' || bytes[i] == b'l') {
            i += 1;
        }

        if i >= bytes.len() {
            out.push('%'); // Unfinished directive, keep it verbatim.
            break;
        }

        let conv = bytes[i] as char;
        i += 1;
        out.push_str(&render(conv, spec, arg));
    }

    out
}

fn render(conv: char, spec: Spec, arg: Option<Arg>) -> String {
    match conv {
        'd' | 'i' => pad_number(signed_decimal(as_i64(arg), spec), spec),
        'u' => pad_number(unsigned(as_u64(arg), 10, false, spec), spec),
        'o' => pad_number(unsigned(as_u64(arg), 8, false, spec), spec),
        'x' => pad_number(unsigned(as_u64(arg), 16, false, spec), spec),
        'X' => pad_number(unsigned(as_u64(arg), 16, true, spec), spec),
        'c' => pad_text(
            char::from_u32(as_u64(arg) as u32).unwrap_or('?').to_string(),
            spec,
        ),
        's' => {
            let mut s = match arg {
                Some(Arg::S(s)) => s.to_owned(),
                _ => String::new(),
            };
            if let Some(prec) = spec.precision {
                s.truncate(prec.min(s.len()));
            }
            pad_text(s, spec)
        }
        'f' | 'F' => pad_number(float_fixed(as_f64(arg), spec), spec),
        'e' | 'E' => pad_number(float_exp(as_f64(arg), spec, conv == 'E'), spec),
        'g' | 'G' => pad_number(float_general(as_f64(arg), spec, conv == 'G'), spec),
        'a' | 'A' => pad_number(float_hex(as_f64(arg), conv == 'A'), spec),
        other => {
            let mut s = String::from("%");
            s.push(other);
            s
        }
    }
}

fn as_u64(arg: Option<Arg>) -> u64 {
    match arg {
        Some(Arg::U(v)) => v,
        Some(Arg::I(v)) => v as u64,
        Some(Arg::F(v)) => v as u64,
        _ => 0,
    }
}

fn as_i64(arg: Option<Arg>) -> i64 {
    match arg {
        Some(Arg::U(v)) => v as i64,
        Some(Arg::I(v)) => v,
        Some(Arg::F(v)) => v as i64,
        _ => 0,
    }
}

fn as_f64(arg: Option<Arg>) -> f64 {
    match arg {
        Some(Arg::U(v)) => v as f64,
        Some(Arg::I(v)) => v as f64,
        Some(Arg::F(v)) => v,
        _ => 0.0,
    }
}

fn sign_prefix(negative: bool, spec: Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn signed_decimal(value: i64, spec: Spec) -> String {
    let digits = value.unsigned_abs().to_string();
    let digits = min_digits(digits, spec.precision);
    format!("{}{}", sign_prefix(value < 0, spec), digits)
}

fn unsigned(value: u64, radix: u32, upper: bool, spec: Spec) -> String {
    let digits = match radix {
        8 => format!("{value:o}"),
        16 if upper => format!("{value:X}"),
        16 => format!("{value:x}"),
        _ => value.to_string(),
    };

    let digits = min_digits(digits, spec.precision);

    if spec.alt && value != 0 {
        match radix {
            8 => format!("0{digits}"),
            16 if upper => format!("0X{digits}"),
            16 => format!("0x{digits}"),
            _ => digits,
        }
    } else {
        digits
    }
}

fn min_digits(digits: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

fn float_fixed(value: f64, spec: Spec) -> String {
    let prec = spec.precision.unwrap_or(6);
    let body = format!("{:.*}", prec, value.abs());
    format!("{}{}", sign_prefix(value.is_sign_negative(), spec), body)
}

fn float_exp(value: f64, spec: Spec, upper: bool) -> String {
    let prec = spec.precision.unwrap_or(6);
    let (mantissa, exp) = exp_parts(value.abs(), prec);
    let e = if upper { 'E' } else { 'e' };
    let exp_sign = if exp < 0 { '-' } else { '+' };
    format!(
        "{}{}{}{}{:02}",
        sign_prefix(value.is_sign_negative(), spec),
        mantissa,
        e,
        exp_sign,
        exp.abs()
    )
}

/// Mantissa string with `prec` fraction digits and the decimal exponent.
fn exp_parts(value: f64, prec: usize) -> (String, i32) {
    if value == 0.0 || !value.is_finite() {
        let mantissa = if prec == 0 {
            "0".to_string()
        } else {
            format!("0.{}", "0".repeat(prec))
        };
        return (mantissa, 0);
    }

    let mut exp = value.abs().log10().floor() as i32;
    let mut scaled = value / 10f64.powi(exp);

    // Rounding at the requested precision can push the mantissa to 10.0.
    let rounded = format!("{scaled:.prec$}");
    if rounded.starts_with("10") {
        exp += 1;
        scaled = value / 10f64.powi(exp);
    }

    (format!("{scaled:.prec$}"), exp)
}

fn float_general(value: f64, spec: Spec, upper: bool) -> String {
    let prec = match spec.precision {
        Some(0) | None => spec.precision.unwrap_or(6).max(1),
        Some(p) => p,
    };

    let exp = if value == 0.0 {
        0
    } else {
        value.abs().log10().floor() as i32
    };

    let mut body = if exp < -4 || exp >= prec as i32 {
        float_exp(value, Spec { precision: Some(prec - 1), ..spec }, upper)
    } else {
        let fixed_prec = (prec as i32 - 1 - exp).max(0) as usize;
        float_fixed(value, Spec { precision: Some(fixed_prec), ..spec })
    };

    if !spec.alt {
        body = strip_trailing_zeros(body);
    }

    body
}

fn strip_trailing_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }

    let (mantissa, exp) = match s.find(['e', 'E']) {
        Some(pos) => (s[..pos].to_string(), s[pos..].to_string()),
        None => (s, String::new()),
    };

    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.').to_string();
    format!("{mantissa}{exp}")
}

fn float_hex(value: f64, upper: bool) -> String {
    let bits = value.to_bits();
    let sign = if bits >> 63 != 0 { "-" } else { "" };
    let exp_bits = ((bits >> 52) & 0x7FF) as i32;
    let mantissa = bits & 0xF_FFFF_FFFF_FFFF;

    let body = if exp_bits == 0 && mantissa == 0 {
        "0x0p+0".to_string()
    } else if exp_bits == 0 {
        format!("0x0.{}p-1022", hex_fraction(mantissa))
    } else {
        let exp = exp_bits - 1023;
        let exp_sign = if exp < 0 { '-' } else { '+' };
        let frac = hex_fraction(mantissa);
        if frac.is_empty() {
            format!("0x1p{}{}", exp_sign, exp.abs())
        } else {
            format!("0x1.{}p{}{}", frac, exp_sign, exp.abs())
        }
    };

    let body = format!("{sign}{body}");
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}

fn hex_fraction(mantissa: u64) -> String {
    let full = format!("{mantissa:013x}");
    full.trim_end_matches('0').to_string()
}

fn pad_number(body: String, spec: Spec) -> String {
    if body.len() >= spec.width {
        return body;
    }

    let fill = spec.width - body.len();

    if spec.minus {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero {
        // Zero padding goes between the sign/prefix and the digits.
        let sign_len = body
            .chars()
            .take_while(|c| matches!(c, '-' | '+' | ' '))
            .count();
        let (sign, digits) = body.split_at(sign_len);
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn pad_text(body: String, spec: Spec) -> String {
    if body.len() >= spec.width {
        return body;
    }

    let fill = " ".repeat(spec.width - body.len());
    if spec.minus {
        format!("{body}{fill}")
    } else {
        format!("{fill}{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_escaped_percent() {
        assert_eq!(format_one("100%% done", None), "100% done");
        assert_eq!(format_one("plain", None), "plain");
    }

    #[test]
    fn integers() {
        assert_eq!(format_one("x=%d", Some(Arg::I(-42))), "x=-42");
        assert_eq!(format_one("%+d", Some(Arg::I(7))), "+7");
        assert_eq!(format_one("%5u", Some(Arg::U(42))), "   42");
        assert_eq!(format_one("%-5u|", Some(Arg::U(42))), "42   |");
        assert_eq!(format_one("%05d", Some(Arg::I(-42))), "-0042");
        assert_eq!(format_one("%04X", Some(Arg::U(0xAB))), "00AB");
        assert_eq!(format_one("%#x", Some(Arg::U(255))), "0xff");
        assert_eq!(format_one("%#o", Some(Arg::U(8))), "010");
        assert_eq!(format_one("%.4d", Some(Arg::I(7))), "0007");
        assert_eq!(format_one("%lu", Some(Arg::U(9))), "9");
    }

    #[test]
    fn floats() {
        assert_eq!(format_one("%f", Some(Arg::F(1.5))), "1.500000");
        assert_eq!(format_one("%8.3f", Some(Arg::F(-2.25))), "  -2.250");
        assert_eq!(format_one("%8.6f", Some(Arg::F(0.0))), "0.000000");
        assert_eq!(format_one("%e", Some(Arg::F(1234.5))), "1.234500e+03");
        assert_eq!(format_one("%.2E", Some(Arg::F(0.00125))), "1.25E-03");
        assert_eq!(format_one("%g", Some(Arg::F(0.5))), "0.5");
        assert_eq!(format_one("%g", Some(Arg::F(1e7))), "1e+07");
        assert_eq!(format_one("%g", Some(Arg::F(120.0))), "120");
    }

    #[test]
    fn hex_float() {
        assert_eq!(format_one("%a", Some(Arg::F(1.0))), "0x1p+0");
        assert_eq!(format_one("%a", Some(Arg::F(0.0))), "0x0p+0");
        assert_eq!(format_one("%a", Some(Arg::F(2.5))), "0x1.4p+1");
    }

    #[test]
    fn strings_and_chars() {
        assert_eq!(format_one("[%s]", Some(Arg::S("abc"))), "[abc]");
        assert_eq!(format_one("[%5s]", Some(Arg::S("ab"))), "[   ab]");
        assert_eq!(format_one("[%.2s]", Some(Arg::S("abcd"))), "[ab]");
        assert_eq!(format_one("%c", Some(Arg::U(65))), "A");
    }
}

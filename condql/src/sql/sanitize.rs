//! Identifier sanitizing and quoting.
//!
//! Every identifier that reaches SQL text goes through one of the sanitizers
//! and then [`quote`]. The sanitizers never fail: anything outside the allowed
//! alphabet is dropped, which may leave an empty identifier.

/// Keep only `[A-Za-z0-9_]`, prefixing `_` when the result starts with a digit.
pub fn sanitize(name: &str) -> String { sanitize_with(name, |c| c.is_ascii_alphanumeric() || c == '_') }

/// Like [`sanitize`] but also keeps `.` and `"`, for qualified and pre-quoted names.
pub fn sanitize_allow_dots(name: &str) -> String { sanitize_with(name, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '"') }

fn sanitize_with(name: &str, allowed: impl Fn(char) -> bool) -> String {
    let s: String = name.chars().filter(|c| allowed(*c)).collect();
    match s.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", s),
        _ => s,
    }
}

/// Double-quote an identifier. Dotted names are quoted per segment; a segment
/// that already contains `"` is passed through as pre-quoted.
pub fn quote(name: &str) -> String {
    if name.contains('.') {
        name.split('.').map(quote).collect::<Vec<_>>().join(".")
    } else if name.contains('"') {
        name.to_owned()
    } else {
        format!(r#""{}""#, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_everything_else() {
        assert_eq!(sanitize("name; drop table users--"), "namedroptableusers");
        assert_eq!(sanitize("first name"), "firstname");
        assert_eq!(sanitize(r#"t."col""#), "tcol");
        assert_eq!(sanitize("über_feld"), "ber_feld");
    }

    #[test]
    fn test_sanitize_leading_digit() {
        assert_eq!(sanitize("1abc"), "_1abc");
        assert_eq!(sanitize("-1abc"), "_1abc");
        assert_eq!(sanitize_allow_dots("2.x"), "_2.x");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("'--;"), "");
    }

    #[test]
    fn test_sanitize_allow_dots() {
        assert_eq!(sanitize_allow_dots(r#"ss2."name""#), r#"ss2."name""#);
        assert_eq!(sanitize_allow_dots("public.users"), "public.users");
        assert_eq!(sanitize_allow_dots("a' OR '1'='1"), "aOR11");
    }

    #[test]
    fn test_sanitize_alphabet_and_idempotence() {
        let inputs = ["", "0", "9lives", "a b c", "x.y.z", r#""q"."r""#, "ñandú", "$$", "_ok_", "12.34", "😀name", "tab\tname"];
        for input in inputs {
            let strict = sanitize(input);
            assert!(strict.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'), "{:?} -> {:?}", input, strict);
            assert!(!strict.starts_with(|c: char| c.is_ascii_digit()), "{:?} -> {:?}", input, strict);
            assert_eq!(sanitize(&strict), strict);

            let dotted = sanitize_allow_dots(input);
            assert!(dotted.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '"')), "{:?} -> {:?}", input, dotted);
            assert!(!dotted.starts_with(|c: char| c.is_ascii_digit()), "{:?} -> {:?}", input, dotted);
            assert_eq!(sanitize_allow_dots(&dotted), dotted);
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("name"), r#""name""#);
        assert_eq!(quote("t.c"), r#""t"."c""#);
        assert_eq!(quote(r#""already""#), r#""already""#);
        assert_eq!(quote(r#""ss2"."id""#), r#""ss2"."id""#);
        assert_eq!(quote(r#"ss2."id""#), r#""ss2"."id""#);
        assert_eq!(quote("s.t.c"), r#""s"."t"."c""#);
    }
}

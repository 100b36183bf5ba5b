//! Name grammars of JVMS §4.2: unqualified names, class names, and the
//! escape-bearing module/package names, plus modified-UTF-8
//! wellformedness for constant-pool payloads.

/// Reason a UTF-8 constant payload is unacceptable, or `None` when valid.
///
/// Modified UTF-8 encodes NUL as 0xC0 0x80 and supplementary characters as
/// surrogate pairs, so the bytes 0x00 and 0xF0..=0xFF never appear in a
/// wellformed payload.
pub fn invalid_utf8_reason(bytes: &[u8]) -> Option<&'static str> {
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == 0x00 || b >= 0xF0 {
            return Some("contains an invalid character");
        }
        let following = if b < 0x80 {
            0
        } else if b & 0xE0 == 0xC0 {
            1
        } else if b & 0xF0 == 0xE0 {
            2
        } else {
            // a stray continuation byte in lead position
            return Some("is not well-formed modified UTF-8");
        };
        for k in 1..=following {
            match bytes.get(i + k) {
                Some(cont) if cont & 0xC0 == 0x80 => {}
                _ => return Some("is not well-formed modified UTF-8"),
            }
        }
        i += 1 + following;
    }
    None
}

/// Unqualified-name grammar. Non-method names exclude `. ; [ /`; method
/// names additionally exclude `<` and `>` unless the whole name is
/// `<init>` or `<clinit>`.
pub fn validate_unqualified_name(name: &str, is_method: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    if is_method
        && (name == crate::consts::CONSTRUCTOR_METHOD_NAME
            || name == crate::consts::STATIC_INITIALIZER_METHOD_NAME)
    {
        return true;
    }
    for c in name.chars() {
        match c {
            '.' | ';' | '[' | '/' => return false,
            '<' | '>' if is_method => return false,
            _ => {}
        }
    }
    true
}

/// Field-name rule: a valid unqualified name that also carries no
/// whitespace and no leading digit.
pub fn validate_field_name(name: &str) -> bool {
    if !validate_unqualified_name(name, false) {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_digit() => return false,
        Some(_) => {}
        None => return false,
    }
    !name.chars().any(|c| c.is_whitespace())
}

/// Class-name grammar for normalized constant-pool class references.
///
/// Slash-separated segments with none of `. ; [` — except that a leading
/// `[` marks an array class, which is accepted whole. The empty string is
/// tolerated: primitive array references normalize to it.
pub fn validate_class_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('[') {
        return true;
    }
    !name.chars().any(|c| matches!(c, '.' | ';' | '['))
}

/// Module-name grammar: `\:`, `\@` and `\\` are the only legal escapes,
/// bare `:` and `@` are illegal anywhere, and a trailing bare `\` is
/// illegal.
pub fn check_module_name(name: &str) -> Result<(), String> {
    check_escaped_name(name).map_err(|why| format!("invalid module name '{name}': {why}"))
}

/// Package-name grammar; same shape as module names.
pub fn check_package_name(name: &str) -> Result<(), String> {
    check_escaped_name(name).map_err(|why| format!("invalid package name '{name}': {why}"))
}

fn check_escaped_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(':') | Some('@') | Some('\\') => {}
                Some(_) => return Err("illegal escape sequence"),
                None => return Err("trailing unescaped backslash"),
            },
            ':' => return Err("unescaped ':'"),
            '@' => return Err("unescaped '@'"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_disallowed_bytes() {
        assert_eq!(invalid_utf8_reason(b"Exceptions"), None);
        assert_eq!(
            invalid_utf8_reason(&[b'B', b'a', b'd', 0xFA]),
            Some("contains an invalid character")
        );
        assert_eq!(
            invalid_utf8_reason(&[b'a', 0x00]),
            Some("contains an invalid character")
        );
    }

    #[test]
    fn utf8_structure() {
        // two-byte sequence, wellformed
        assert_eq!(invalid_utf8_reason(&[0xC3, 0xA9]), None);
        // lead byte with missing continuation
        assert_eq!(
            invalid_utf8_reason(&[0xC3]),
            Some("is not well-formed modified UTF-8")
        );
        // continuation byte in lead position
        assert_eq!(
            invalid_utf8_reason(&[0x80]),
            Some("is not well-formed modified UTF-8")
        );
        // modified-UTF-8 encoded NUL is fine structurally
        assert_eq!(invalid_utf8_reason(&[0xC0, 0x80]), None);
    }

    #[test]
    fn unqualified_names() {
        assert!(!validate_unqualified_name("", false));
        assert!(!validate_unqualified_name("[array]", false));
        assert!(validate_unqualified_name("isArray", false));
        assert!(validate_unqualified_name("<clinit>", true));
        assert!(validate_unqualified_name("<init>", true));
        assert!(!validate_unqualified_name("java/isOpen", true));
        assert!(!validate_unqualified_name("invalid<>", true));
        assert!(!validate_unqualified_name("<other>", true));
    }

    #[test]
    fn field_names() {
        assert!(validate_field_name("validName"));
        assert!(!validate_field_name("bad name"));
        assert!(!validate_field_name("99bottlesOfBeer"));
        assert!(!validate_field_name(""));
    }

    #[test]
    fn class_names() {
        assert!(validate_class_name("java/lang/Object"));
        assert!(validate_class_name("[Ljava/lang/String;"));
        assert!(validate_class_name(""));
        assert!(!validate_class_name("java.lang.Object"));
        assert!(!validate_class_name("bad;name"));
    }

    #[test]
    fn module_names() {
        assert!(check_module_name("").is_err());
        assert!(check_module_name("@invalid").is_err());
        assert!(check_module_name("invalid:").is_err());
        assert!(check_module_name("invalid\\").is_err());
        assert!(check_module_name("invalid\\n").is_err());
        assert!(check_module_name("valid\\@").is_err() == false);
        assert!(check_module_name("\\@valid").is_ok());
        assert!(check_module_name("goodname").is_ok());
    }

    #[test]
    fn package_names() {
        assert!(check_package_name("").is_err());
        assert!(check_package_name("@invalid").is_err());
        assert!(check_package_name("invalid:").is_err());
        assert!(check_package_name("invalid\\").is_err());
        assert!(check_package_name("\\@valid").is_ok());
        assert!(check_package_name("goodname").is_ok());
    }
}

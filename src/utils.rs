// src/utils.rs

//! Small helpers shared across the crate: name encodings, cascade naming
//! for denormalized stages, and string utilities.

/// Separator used when flattening nested pipeline names.
pub const PIPELINE_DIRECTION_CHAR: &str = "->";

const REPLACE_SEQUENCE: [(&str, &str); 6] = [
    ("->", "__a__"),
    ("|", "__b__"),
    ("/", "__c__"),
    ("\\", "__d__"),
    (":", "__e__"),
    (" ", "__f__"),
];

/// Replace characters that do not play nice in file names (`->`, `|`, `/`,
/// `\`, `:`, space) with stable digraph sequences.
pub fn encode_filesystem_safe(s: &str) -> String {
    let mut out = s.to_string();
    for (from, to) in REPLACE_SEQUENCE {
        out = out.replace(from, to);
    }
    out
}

/// Inverse of [`encode_filesystem_safe`].
pub fn decode_filesystem_safe(s: &str) -> String {
    let mut out = s.to_string();
    for (from, to) in REPLACE_SEQUENCE {
        out = out.replace(to, from);
    }
    out
}

const BASE62_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode arbitrary bytes as a base62 string (big-endian big-integer form).
pub fn encode_base62(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.iter().all(|&b| b == 0) {
        return "0".into();
    }

    // Repeated divmod of the byte string by 62.
    let mut digits: Vec<u8> = Vec::new();
    let mut quotient: Vec<u8> = bytes.to_vec();
    while quotient.iter().any(|&b| b != 0) {
        let mut remainder: u32 = 0;
        let mut next = Vec::with_capacity(quotient.len());
        for &b in &quotient {
            let acc = remainder * 256 + b as u32;
            next.push((acc / 62) as u8);
            remainder = acc % 62;
        }
        while next.first() == Some(&0) {
            next.remove(0);
        }
        digits.push(BASE62_ALPHABET[remainder as usize]);
        quotient = next;
    }

    digits.reverse();
    String::from_utf8(digits).expect("alphabet is ASCII")
}

/// Decode a string produced by [`encode_base62`]. Returns an empty string
/// for input that is not valid base62.
pub fn decode_base62(s: &str) -> String {
    let mut bytes: Vec<u8> = Vec::new();
    for c in s.bytes() {
        let digit = match BASE62_ALPHABET.iter().position(|&a| a == c) {
            Some(d) => d as u32,
            None => return String::new(),
        };
        // bytes = bytes * 62 + digit
        let mut carry = digit;
        for b in bytes.iter_mut().rev() {
            let acc = *b as u32 * 62 + carry;
            *b = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            bytes.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}

/// Build the unique name of a flattened stage from its ancestor chain.
pub fn cascade_name(parents: &[String], current: &str) -> String {
    format!(
        "{}{}{}",
        parents.join(PIPELINE_DIRECTION_CHAR),
        PIPELINE_DIRECTION_CHAR,
        current
    )
}

/// Last segment of a cascaded pipeline name.
pub fn tail_extract(name: &str) -> &str {
    name.rsplit(PIPELINE_DIRECTION_CHAR).next().unwrap_or(name)
}

/// Uppercase the first character iff it is an ASCII letter; names with a
/// leading non-letter are returned as-is.
pub fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            format!("{}{}", first.to_ascii_uppercase(), chars.as_str())
        }
        _ => name.to_string(),
    }
}

/// Derived environment variable name for a task's exported output:
/// the task name uppercased with every non-alphanumeric byte replaced by
/// an underscore, suffixed with `_OUTPUT`.
pub fn export_env_name(task_name: &str) -> String {
    let sanitized: String = task_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{sanitized}_OUTPUT")
}

/// Last non-empty line of `s`, or the empty string.
pub fn last_nonempty_line(s: &str) -> &str {
    s.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_encoding_round_trips() {
        let names = [
            "plain",
            "with space",
            "pipe|line",
            "graph->stage->leaf",
            "a:b/c\\d",
        ];
        for name in names {
            assert_eq!(decode_filesystem_safe(&encode_filesystem_safe(name)), name);
        }
    }

    #[test]
    fn base62_round_trips() {
        for name in ["task", "task one", "p1->p2->leaf", "x"] {
            assert_eq!(decode_base62(&encode_base62(name)), name);
        }
    }

    #[test]
    fn cascade_name_joins_with_direction_char() {
        let parents = vec!["root".to_string(), "sub".to_string()];
        assert_eq!(cascade_name(&parents, "leaf"), "root->sub->leaf");
        assert_eq!(tail_extract("root->sub->leaf"), "leaf");
    }

    #[test]
    fn title_case_leaves_leading_non_letters_alone() {
        assert_eq!(title_case("build"), "Build");
        assert_eq!(title_case("Build"), "Build");
        assert_eq!(title_case("1build"), "1build");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn export_env_name_uppercases_and_sanitizes() {
        assert_eq!(export_env_name("build"), "BUILD_OUTPUT");
        assert_eq!(export_env_name("task-p2:1"), "TASK_P2_1_OUTPUT");
    }

    #[test]
    fn last_nonempty_line_skips_trailing_blanks() {
        assert_eq!(last_nonempty_line("a\nb\n\n"), "b");
        assert_eq!(last_nonempty_line(""), "");
    }
}

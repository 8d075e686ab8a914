use std::fmt::Display;

/// Separator used between fragments inside one block, e.g. `file.rs:42`.
pub const INNER_SEP: &str = ":";

/// Separator used between the sub-blocks of an outer block.
pub const OUTER_SEP: &str = " - ";

/// Join the included fragments of `fragments` with `sep`.
///
/// **Parameters**
/// - `fragments`: ordered `(included, value)` pairs. Excluded pairs are
///   skipped entirely and never leave a dangling separator behind.
/// - `sep`: separator placed between two consecutive included values.
///
/// **Returns**
/// - The joined string; `""` for empty or all-excluded input. For `k`
///   included fragments exactly `k - 1` separators are emitted.
pub fn compose_inner<I, T>(fragments: I, sep: &str) -> String
where
    I: IntoIterator<Item = (bool, T)>,
    T: Display,
{
    let mut out = String::new();
    let mut any_included = false;
    for (included, value) in fragments {
        if !included {
            continue;
        }
        if any_included {
            out.push_str(sep);
        }
        out.push_str(&value.to_string());
        any_included = true;
    }
    out
}

/// Join the non-empty `segments` with `sep` and wrap the result as a
/// `"[ ... ] "` block. Returns `""` when every segment is empty.
///
/// The trailing space is part of the block so consecutive blocks can be
/// concatenated directly into a console line.
pub fn compose_outer<I, S>(segments: I, sep: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = compose_inner(
        segments.into_iter().map(|s| {
            let present = !s.as_ref().is_empty();
            (present, s.as_ref().to_owned())
        }),
        sep,
    );

    if joined.is_empty() {
        joined
    } else {
        format!("[ {} ] ", joined)
    }
}

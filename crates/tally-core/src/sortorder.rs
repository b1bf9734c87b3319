//! Natural ("human") string ordering.
//!
//! Embedded digit runs compare as numbers, so `build9 < build10 <
//! build888`. Build prefixes and row names are sorted with this order.

use std::cmp::Ordering;

/// Compare two strings in natural order.
///
/// Digit runs are compared numerically (leading zeros ignored for
/// magnitude, shorter textual run wins ties so the order is total);
/// everything else compares bytewise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut xs = a.as_bytes();
    let mut ys = b.as_bytes();

    loop {
        match (xs.first(), ys.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&x), Some(&y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let (xrun, xrest) = split_digits(xs);
                    let (yrun, yrest) = split_digits(ys);
                    match cmp_digit_runs(xrun, yrun) {
                        Ordering::Equal => {
                            xs = xrest;
                            ys = yrest;
                        }
                        ord => return ord,
                    }
                } else {
                    match x.cmp(&y) {
                        Ordering::Equal => {
                            xs = &xs[1..];
                            ys = &ys[1..];
                        }
                        ord => return ord,
                    }
                }
            }
        }
    }
}

/// True when `a` sorts strictly before `b`.
pub fn natural_less(a: &str, b: &str) -> bool {
    natural_cmp(a, b) == Ordering::Less
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn cmp_digit_runs(x: &[u8], y: &[u8]) -> Ordering {
    let xt = trim_zeros(x);
    let yt = trim_zeros(y);
    // More significant digits wins; equal width compares lexically.
    xt.len()
        .cmp(&yt.len())
        .then_with(|| xt.cmp(yt))
        // "007" and "7" are numerically equal; fewer leading zeros first.
        .then_with(|| x.len().cmp(&y.len()))
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

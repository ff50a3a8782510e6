use std::collections::{HashMap, hash_map::Entry};
use std::fmt::Write as _;

use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

use super::common::{
    arg, boolean, collation_arg, double_arg, integer, item_or_context, item_string, one, opt_atomic, string,
    string_arg,
};
use super::numeric::round_half_up;
use crate::consts::CODEPOINT_URI;
use crate::engine::evaluator::{atomize, collapse_whitespace};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

fn context_string<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>], fname: &str) -> Result<String, Error> {
    Ok(item_or_context(ctx, args, fname)?
        .map(|item| item_string(&item))
        .unwrap_or_default())
}

pub(super) fn concat_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let mut out = String::new();
    for a in args {
        if let Some(v) = opt_atomic(a, "concat")? {
            out.push_str(&v.string_value());
        }
    }
    Ok(string(out))
}

pub(super) fn string_join_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let sep = string_arg(arg(args, 1), "string-join")?;
    let joined = atomize(arg(args, 0).to_vec())
        .iter()
        .map(XdmAtomicValue::string_value)
        .join(&sep);
    Ok(string(joined))
}

/// Characters at positions `p` with `round(start) <= p < round(start) + round(len)`;
/// NaN bounds select nothing.
pub(super) fn substring_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = string_arg(arg(args, 0), "substring")?;
    let start = round_half_up(double_arg(arg(args, 1), "substring")?);
    let end = match args.get(2) {
        Some(len) => start + round_half_up(double_arg(len, "substring")?),
        None => f64::INFINITY,
    };
    let out: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(string(out))
}

pub(super) fn string_length_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = context_string(ctx, args, "string-length")?;
    Ok(integer(s.chars().count() as i64))
}

pub(super) fn upper_case_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(string(string_arg(arg(args, 0), "upper-case")?.to_uppercase()))
}

pub(super) fn lower_case_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(string(string_arg(arg(args, 0), "lower-case")?.to_lowercase()))
}

/// Both operands of a substring function, compared under the collation's keys.
struct Needle {
    haystack: String,
    needle: String,
    keyed_haystack: String,
    keyed_needle: String,
}

impl Needle {
    fn new<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>], fname: &str) -> Result<Self, Error> {
        let haystack = string_arg(arg(args, 0), fname)?;
        let needle = string_arg(arg(args, 1), fname)?;
        let collation = collation_arg(ctx, args, 2, fname)?;
        let (keyed_haystack, keyed_needle) = if collation.uri() == CODEPOINT_URI {
            (haystack.clone(), needle.clone())
        } else {
            (collation.key(&haystack), collation.key(&needle))
        };
        Ok(Self {
            haystack,
            needle,
            keyed_haystack,
            keyed_needle,
        })
    }

    /// Match as (char offset, char length) in the original string.
    fn find(&self) -> Option<(usize, usize)> {
        let byte = self.keyed_haystack.find(&self.keyed_needle)?;
        let offset = self.keyed_haystack[..byte].chars().count();
        Some((offset, self.keyed_needle.chars().count()))
    }

    fn before(&self) -> String {
        match self.find() {
            Some((offset, _)) if !self.needle.is_empty() => self.haystack.chars().take(offset).collect(),
            _ => String::new(),
        }
    }

    fn after(&self) -> String {
        if self.needle.is_empty() {
            return self.haystack.clone();
        }
        match self.find() {
            Some((offset, len)) => self.haystack.chars().skip(offset + len).collect(),
            None => String::new(),
        }
    }
}

pub(super) fn contains_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let n = Needle::new(ctx, args, "contains")?;
    Ok(boolean(n.keyed_haystack.contains(&n.keyed_needle)))
}

pub(super) fn starts_with_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let n = Needle::new(ctx, args, "starts-with")?;
    Ok(boolean(n.keyed_haystack.starts_with(&n.keyed_needle)))
}

pub(super) fn ends_with_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let n = Needle::new(ctx, args, "ends-with")?;
    Ok(boolean(n.keyed_haystack.ends_with(&n.keyed_needle)))
}

pub(super) fn substring_before_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let n = Needle::new(ctx, args, "substring-before")?;
    Ok(string(n.before()))
}

pub(super) fn substring_after_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let n = Needle::new(ctx, args, "substring-after")?;
    Ok(string(n.after()))
}

pub(super) fn normalize_space_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = context_string(ctx, args, "normalize-space")?;
    Ok(string(collapse_whitespace(&s)))
}

pub(super) fn normalize_unicode_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = string_arg(arg(args, 0), "normalize-unicode")?;
    let form = match args.get(1) {
        Some(f) => string_arg(f, "normalize-unicode")?.trim().to_uppercase(),
        None => "NFC".to_string(),
    };
    let out: String = match form.as_str() {
        "" => s,
        "NFC" => s.nfc().collect(),
        "NFD" => s.nfd().collect(),
        "NFKC" => s.nfkc().collect(),
        "NFKD" => s.nfkd().collect(),
        other => {
            return Err(Error::from_code(
                ErrorCode::FOCH0003,
                format!("unsupported normalization form '{other}'"),
            ));
        }
    };
    Ok(string(out))
}

pub(super) fn translate_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = string_arg(arg(args, 0), "translate")?;
    let map = string_arg(arg(args, 1), "translate")?;
    let trans = string_arg(arg(args, 2), "translate")?;
    let mut table: HashMap<char, Option<char>> = HashMap::new();
    let mut replacements = trans.chars();
    for m in map.chars() {
        let repl = replacements.next();
        // first occurrence in the map wins
        if let Entry::Vacant(e) = table.entry(m) {
            e.insert(repl);
        }
    }
    let out: String = s
        .chars()
        .filter_map(|ch| match table.get(&ch) {
            Some(mapped) => *mapped,
            None => Some(ch),
        })
        .collect();
    Ok(string(out))
}

pub(super) fn compare_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    if arg(args, 0).is_empty() || arg(args, 1).is_empty() {
        return Ok(vec![]);
    }
    let a = string_arg(arg(args, 0), "compare")?;
    let b = string_arg(arg(args, 1), "compare")?;
    let collation = collation_arg(ctx, args, 2, "compare")?;
    Ok(integer(collation.compare(&a, &b) as i64))
}

fn is_xml_char(cp: u32) -> bool {
    matches!(cp, 0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF)
}

pub(super) fn codepoints_to_string_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let mut out = String::new();
    for v in atomize(arg(args, 0).to_vec()) {
        let cp = match v.as_integer() {
            Some(i) if v.type_code().is_integer_derived() => i,
            _ => {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("fn:codepoints-to-string expects xs:integer*, found {}", v.type_code()),
                ));
            }
        };
        let ch = u32::try_from(cp)
            .ok()
            .filter(|c| is_xml_char(*c))
            .and_then(char::from_u32)
            .ok_or_else(|| Error::from_code(ErrorCode::FOCH0001, format!("{cp} is not a valid XML character")))?;
        out.push(ch);
    }
    Ok(string(out))
}

pub(super) fn string_to_codepoints_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = string_arg(arg(args, 0), "string-to-codepoints")?;
    Ok(s.chars()
        .map(|c| XdmItem::Atomic(XdmAtomicValue::Integer(i64::from(u32::from(c)))))
        .collect())
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

pub(super) fn encode_for_uri_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = string_arg(arg(args, 0), "encode-for-uri")?;
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    Ok(string(out))
}

/// Resolves against the explicit base, else the static base URI.
pub(super) fn resolve_uri_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    if arg(args, 0).is_empty() {
        return Ok(vec![]);
    }
    let relative = string_arg(arg(args, 0), "resolve-uri")?;
    if url::Url::parse(&relative).is_ok() {
        return Ok(one(XdmAtomicValue::AnyUri(relative)));
    }
    let base = match args.get(1) {
        Some(b) => string_arg(b, "resolve-uri")?,
        None => ctx
            .static_ctx
            .base_uri
            .clone()
            .ok_or_else(|| Error::from_code(ErrorCode::FONS0005, "no base URI to resolve against"))?,
    };
    let resolved = url::Url::parse(&base)?.join(&relative)?;
    Ok(one(XdmAtomicValue::AnyUri(resolved.to_string())))
}

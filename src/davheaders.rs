use std::fmt;
use std::str::FromStr;

use headers::Header;
use http::header::{HeaderName, HeaderValue};

lazy_static! {
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref IF: HeaderName = HeaderName::from_static("if");
    static ref LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
}

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(invalid)?;
    if values.next().is_some() {
        return Err(invalid());
    }
    Ok(v)
}

// helper
fn invalid() -> headers::Error {
    headers::Error::invalid()
}

// helper
fn map_invalid(_e: impl std::error::Error) -> headers::Error {
    headers::Error::invalid()
}

macro_rules! header {
    ($tname:ident, $hname:ident, $sname:expr) => {
        lazy_static! {
            static ref $hname: HeaderName = HeaderName::from_static($sname);
        }

        #[derive(Debug, Clone, PartialEq)]
        pub struct $tname(pub String);

        impl Header for $tname {
            fn name() -> &'static HeaderName {
                &$hname
            }

            fn decode<'i, I>(values: &mut I) -> Result<$tname, headers::Error>
            where
                I: Iterator<Item = &'i HeaderValue>,
            {
                one(values)?
                    .to_str()
                    .map(|x| $tname(x.to_owned()))
                    .map_err(map_invalid)
            }

            fn encode<E>(&self, values: &mut E)
            where
                E: Extend<HeaderValue>,
            {
                if let Ok(value) = HeaderValue::from_str(&self.0) {
                    values.extend(std::iter::once(value));
                }
            }
        }
    };
}

header!(MsAuthorVia, MS_AUTHOR_VIA, "ms-author-via");
// sent by the litmus test suite.
header!(XLitmus, X_LITMUS, "x-litmus");

/// Depth: header.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Depth, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        match value.as_bytes() {
            b"0" => Ok(Depth::Zero),
            b"1" => Ok(Depth::One),
            v if v.eq_ignore_ascii_case(b"infinity") => Ok(Depth::Infinity),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match *self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Lock-Token: header. Stored without the angle brackets.
#[derive(Debug, Clone, PartialEq)]
pub struct LockToken(pub String);

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<LockToken, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?.trim();
        match s.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            Some(t) if !t.trim().is_empty() => Ok(LockToken(t.trim().to_string())),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&format!("<{}>", self.0)) {
            values.extend(std::iter::once(value));
        }
    }
}

/// One test inside an `If` list.
#[derive(Debug, Clone, PartialEq)]
pub enum IfItem {
    /// `<token>`
    StateToken(String),
    /// `["etag"]`, stored without quotes and without `W/`.
    ETag(String),
}

/// `[Not] item`
#[derive(Debug, Clone, PartialEq)]
pub struct IfCondition {
    pub not: bool,
    pub item: IfItem,
}

/// A parenthesized list, optionally tagged with the resource it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct IfList {
    pub resource_tag: Option<String>,
    pub conditions: Vec<IfCondition>,
}

/// If: header (RFC 4918 §10.4).
#[derive(Debug, Clone, PartialEq)]
pub struct If(pub Vec<IfList>);

/// Syntax error in an `If` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfParseError(pub &'static str);

impl std::error::Error for IfParseError {}

impl fmt::Display for IfParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "malformed If header: {}", self.0)
    }
}

struct Scanner<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn skip_ws(&mut self) {
        let rest = &self.s[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.s[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.s[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    // read up to (not including) `end`, and skip `end`.
    fn until(&mut self, end: char) -> Result<&'a str, IfParseError> {
        let rest = &self.s[self.pos..];
        let idx = rest.find(end).ok_or(IfParseError("unterminated item"))?;
        self.pos += idx + end.len_utf8();
        Ok(&rest[..idx])
    }

    fn keyword_not(&mut self) -> bool {
        let rest = &self.s[self.pos..];
        let is_not = rest
            .get(..3)
            .map(|w| w.eq_ignore_ascii_case("not"))
            .unwrap_or(false)
            && !rest[3..].starts_with(|c: char| c.is_ascii_alphanumeric());
        if is_not {
            self.pos += 3;
        }
        is_not
    }
}

fn parse_etag(raw: &str) -> Result<String, IfParseError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    let tag = match raw.strip_prefix('"') {
        Some(r) => r.strip_suffix('"').ok_or(IfParseError("bad entity tag"))?,
        None => raw,
    };
    if tag.is_empty() || tag.contains('"') {
        return Err(IfParseError("bad entity tag"));
    }
    Ok(tag.to_string())
}

fn parse_list(sc: &mut Scanner<'_>) -> Result<Vec<IfCondition>, IfParseError> {
    // opening '(' was seen by the caller.
    sc.bump();
    let mut conditions = Vec::new();
    loop {
        match sc.peek() {
            Some(')') => {
                sc.bump();
                break;
            }
            None => return Err(IfParseError("unterminated list")),
            Some(_) => {}
        }
        let not = sc.keyword_not();
        let item = match sc.peek() {
            Some('<') => {
                sc.bump();
                let token = sc.until('>')?.trim();
                if token.is_empty() {
                    return Err(IfParseError("empty state token"));
                }
                IfItem::StateToken(token.to_string())
            }
            Some('[') => {
                sc.bump();
                IfItem::ETag(parse_etag(sc.until(']')?)?)
            }
            _ => return Err(IfParseError("unexpected character in list")),
        };
        conditions.push(IfCondition { not, item });
    }
    if conditions.is_empty() {
        return Err(IfParseError("empty list"));
    }
    Ok(conditions)
}

impl FromStr for If {
    type Err = IfParseError;

    fn from_str(s: &str) -> Result<If, IfParseError> {
        let mut sc = Scanner { s, pos: 0 };
        let mut lists = Vec::new();
        let mut tag: Option<String> = None;
        let mut tagged = None;
        // a resource tag must be followed by at least one list.
        let mut pending_tag = false;

        while let Some(c) = sc.peek() {
            match c {
                '<' => {
                    if pending_tag || tagged == Some(false) {
                        return Err(IfParseError("resource tag without list"));
                    }
                    sc.bump();
                    let t = sc.until('>')?.trim();
                    if t.is_empty() {
                        return Err(IfParseError("empty resource tag"));
                    }
                    tag = Some(t.to_string());
                    tagged = Some(true);
                    pending_tag = true;
                }
                '(' => {
                    if tagged.is_none() {
                        tagged = Some(false);
                    }
                    let conditions = parse_list(&mut sc)?;
                    lists.push(IfList {
                        resource_tag: tag.clone(),
                        conditions,
                    });
                    pending_tag = false;
                }
                _ => return Err(IfParseError("expected '<' or '('")),
            }
        }
        if pending_tag {
            return Err(IfParseError("resource tag without list"));
        }
        if lists.is_empty() {
            return Err(IfParseError("no lists"));
        }
        Ok(If(lists))
    }
}

impl Header for If {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<If, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        // multiple If: headers are one list of lists.
        let mut joined = String::new();
        for v in values {
            joined.push_str(v.to_str().map_err(map_invalid)?);
            joined.push(' ');
        }
        joined.parse::<If>().map_err(map_invalid)
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let mut s = String::new();
        for list in &self.0 {
            if let Some(tag) = &list.resource_tag {
                s.push_str(&format!("<{tag}> "));
            }
            s.push('(');
            let conds: Vec<String> = list
                .conditions
                .iter()
                .map(|c| {
                    let item = match &c.item {
                        IfItem::StateToken(t) => format!("<{t}>"),
                        IfItem::ETag(e) => format!("[\"{e}\"]"),
                    };
                    if c.not {
                        format!("Not {item}")
                    } else {
                        item
                    }
                })
                .collect();
            s.push_str(&conds.join(" "));
            s.push_str(") ");
        }
        if let Ok(value) = HeaderValue::from_str(s.trim_end()) {
            values.extend(std::iter::once(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headers::HeaderMapExt;

    fn token(t: &str, not: bool) -> IfCondition {
        IfCondition {
            not,
            item: IfItem::StateToken(t.to_string()),
        }
    }

    #[test]
    fn untagged_lists() {
        let h: If = "(<urn:a> [\"e1\"]) (Not <urn:b>)".parse().unwrap();
        assert_eq!(h.0.len(), 2);
        assert_eq!(h.0[0].resource_tag, None);
        assert_eq!(
            h.0[0].conditions,
            vec![
                token("urn:a", false),
                IfCondition {
                    not: false,
                    item: IfItem::ETag("e1".into())
                }
            ]
        );
        assert_eq!(h.0[1].conditions, vec![token("urn:b", true)]);
    }

    #[test]
    fn tagged_lists() {
        let h: If = "<http://x/a> (<t1>) (<t2>) </b> ([W/\"e\"])".parse().unwrap();
        assert_eq!(h.0.len(), 3);
        assert_eq!(h.0[0].resource_tag.as_deref(), Some("http://x/a"));
        assert_eq!(h.0[1].resource_tag.as_deref(), Some("http://x/a"));
        assert_eq!(h.0[2].resource_tag.as_deref(), Some("/b"));
        assert_eq!(h.0[2].conditions[0].item, IfItem::ETag("e".into()));
    }

    #[test]
    fn not_keyword() {
        let h: If = "(NOT<t1>)".parse().unwrap();
        assert!(h.0[0].conditions[0].not);
        assert!("(Nothing)".parse::<If>().is_err());
    }

    #[test]
    fn malformed() {
        for bad in [
            "",
            "   ",
            "()",
            "(<t1>",
            "(t1)",
            "<http://x/a>",
            "<http://x/a> <http://x/b> (<t>)",
            "(<t1>) <http://x/a> (<t2>)",
            "(<>)",
            "([])",
            "foo",
        ] {
            assert!(bad.parse::<If>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn typed_header_roundtrip() {
        let mut map = http::HeaderMap::new();
        map.insert("if", HeaderValue::from_static("(<opaquelocktoken:1>)"));
        map.append("if", HeaderValue::from_static("(Not [\"x\"])"));
        let h = map.typed_get::<If>().unwrap();
        assert_eq!(h.0.len(), 2);

        let mut out = http::HeaderMap::new();
        out.typed_insert(h.clone());
        assert_eq!(out.typed_get::<If>(), Some(h));
    }

    #[test]
    fn depth_and_lock_token() {
        let mut map = http::HeaderMap::new();
        map.insert("depth", HeaderValue::from_static("Infinity"));
        map.insert("lock-token", HeaderValue::from_static("<opaquelocktoken:abc>"));
        assert_eq!(map.typed_get::<Depth>(), Some(Depth::Infinity));
        assert_eq!(
            map.typed_get::<LockToken>(),
            Some(LockToken("opaquelocktoken:abc".into()))
        );

        map.insert("lock-token", HeaderValue::from_static("opaquelocktoken:abc"));
        assert_eq!(map.typed_get::<LockToken>(), None);
    }
}

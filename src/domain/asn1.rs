//! Minimal DER tree used to assemble and take apart CMS structures.
//!
//! Construction is schema-driven: callers build a [`Node`] tree that mirrors the
//! ASN.1 definition and [`Node::encode`] emits DER (definite, minimal lengths only).
//! [`Node::decode`] is the strict inverse: BER-only constructs such as indefinite
//! lengths or padded length octets are rejected instead of being normalised.

use der::asn1::ObjectIdentifier;

use crate::infra::error::{SigningError, SigningResult};

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

const CLASS_MASK: u8 = 0xC0;
const CLASS_CONTEXT: u8 = 0x80;
const CONSTRUCTED: u8 = 0x20;
const HIGH_TAG_NUMBER: u8 = 0x1F;

/// Deepest constructed nesting [`Node::decode`] accepts.
pub const MAX_DEPTH: usize = 64;

/// One DER element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// INTEGER holding its two's-complement content octets.
    Integer(Vec<u8>),
    OctetString(Vec<u8>),
    ObjectIdentifier(ObjectIdentifier),
    Null,
    Sequence(Vec<Node>),
    /// SET OF; children are emitted in DER canonical (sorted) order.
    Set(Vec<Node>),
    /// Constructed context-specific tag `[n]`. Serves both EXPLICIT wrapping (one
    /// child) and IMPLICIT SET/SEQUENCE OF (children emitted in the given order).
    ContextTag(u8, Vec<Node>),
    /// Any other element, kept as tag plus content octets.
    Other { tag: u8, content: Vec<u8> },
    /// A complete, already encoded element spliced in verbatim (certificates, names).
    Raw(Vec<u8>),
}

impl Node {
    /// INTEGER from an unsigned big-endian magnitude.
    #[must_use]
    pub fn unsigned_integer(magnitude: &[u8]) -> Self {
        let first_nonzero = magnitude.iter().position(|b| *b != 0);
        let mut content = match first_nonzero {
            Some(idx) => magnitude[idx..].to_vec(),
            None => vec![0],
        };
        if content[0] & 0x80 != 0 {
            content.insert(0, 0x00);
        }
        Node::Integer(content)
    }

    #[must_use]
    pub fn small_integer(value: u32) -> Self {
        Node::unsigned_integer(&value.to_be_bytes())
    }

    /// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters NULL }`.
    #[must_use]
    pub fn algorithm_identifier(oid: ObjectIdentifier) -> Self {
        Node::Sequence(vec![Node::ObjectIdentifier(oid), Node::Null])
    }

    /// Identifier octet of this element.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Node::Integer(_) => TAG_INTEGER,
            Node::OctetString(_) => TAG_OCTET_STRING,
            Node::ObjectIdentifier(_) => TAG_OID,
            Node::Null => TAG_NULL,
            Node::Sequence(_) => TAG_SEQUENCE,
            Node::Set(_) => TAG_SET,
            Node::ContextTag(number, _) => CLASS_CONTEXT | CONSTRUCTED | (number & HIGH_TAG_NUMBER),
            Node::Other { tag, .. } => *tag,
            Node::Raw(der) => der.first().copied().unwrap_or(0),
        }
    }

    /// Encode this element as DER.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Node::Integer(content) => write_tlv(out, TAG_INTEGER, content),
            Node::OctetString(content) => write_tlv(out, TAG_OCTET_STRING, content),
            Node::ObjectIdentifier(oid) => write_tlv(out, TAG_OID, oid.as_bytes()),
            Node::Null => write_tlv(out, TAG_NULL, &[]),
            Node::Sequence(children) => {
                write_tlv(out, TAG_SEQUENCE, &concat_children(children));
            }
            Node::Set(children) => {
                let mut encoded: Vec<Vec<u8>> = children.iter().map(Node::encode).collect();
                encoded.sort();
                write_tlv(out, TAG_SET, &encoded.concat());
            }
            Node::ContextTag(_, children) => {
                write_tlv(out, self.tag(), &concat_children(children));
            }
            Node::Other { tag, content } => write_tlv(out, *tag, content),
            Node::Raw(der) => out.extend_from_slice(der),
        }
    }

    /// Decode exactly one DER element; trailing bytes are an error, and so is
    /// nesting deeper than [`MAX_DEPTH`].
    pub fn decode(der: &[u8]) -> SigningResult<Node> {
        let (node, consumed) = decode_element(der, 0)?;
        if consumed != der.len() {
            return Err(SigningError::EncodingFailure(format!(
                "{} trailing bytes after DER element",
                der.len() - consumed
            )));
        }
        Ok(node)
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(children) => Some(children),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&[Node]> {
        match self {
            Node::Set(children) => Some(children),
            _ => None,
        }
    }

    /// Children of a context tag with the given number.
    #[must_use]
    pub fn as_context(&self, number: u8) -> Option<&[Node]> {
        match self {
            Node::ContextTag(n, children) if *n == number => Some(children),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_oid(&self) -> Option<ObjectIdentifier> {
        match self {
            Node::ObjectIdentifier(oid) => Some(*oid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<&[u8]> {
        match self {
            Node::Integer(content) => Some(content),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match self {
            Node::OctetString(content) => Some(content),
            _ => None,
        }
    }

    /// Value of a small non-negative INTEGER.
    #[must_use]
    pub fn as_small_integer(&self) -> Option<u32> {
        let content = self.as_integer()?;
        if content.len() > 5 || content[0] & 0x80 != 0 {
            return None;
        }
        let mut value: u64 = 0;
        for byte in content {
            value = (value << 8) | u64::from(*byte);
        }
        u32::try_from(value).ok()
    }
}

/// Borrowed view of one encoded element, keeping its exact bytes.
///
/// Used where re-encoding must not alter content, such as certificates and signed
/// attributes recovered from an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub tag: u8,
    pub content: &'a [u8],
    /// Full TLV including identifier and length octets.
    pub raw: &'a [u8],
}

impl<'a> Element<'a> {
    /// View exactly one element; trailing bytes are an error.
    pub fn parse(der: &'a [u8]) -> SigningResult<Self> {
        let (element, rest) = Self::split_first(der)?;
        if !rest.is_empty() {
            return Err(SigningError::EncodingFailure(format!(
                "{} trailing bytes after DER element",
                rest.len()
            )));
        }
        Ok(element)
    }

    fn split_first(input: &'a [u8]) -> SigningResult<(Self, &'a [u8])> {
        let (tag, header_len, content_len) = read_header(input)?;
        let end = header_len
            .checked_add(content_len)
            .filter(|end| *end <= input.len())
            .ok_or_else(|| {
                SigningError::EncodingFailure(format!(
                    "element 0x{tag:02X} declares {content_len} bytes but only {} remain",
                    input.len() - header_len
                ))
            })?;
        let element = Element {
            tag,
            content: &input[header_len..end],
            raw: &input[..end],
        };
        Ok((element, &input[end..]))
    }

    /// Child elements of a constructed element.
    pub fn children(&self) -> SigningResult<Vec<Element<'a>>> {
        if self.tag & CONSTRUCTED == 0 {
            return Err(SigningError::EncodingFailure(format!(
                "element 0x{:02X} is primitive and has no children",
                self.tag
            )));
        }
        let mut rest = self.content;
        let mut children = Vec::new();
        while !rest.is_empty() {
            let (child, tail) = Self::split_first(rest)?;
            children.push(child);
            rest = tail;
        }
        Ok(children)
    }

    /// Fully decode into a [`Node`] tree.
    pub fn to_node(&self) -> SigningResult<Node> {
        Node::decode(self.raw)
    }

    /// Fail unless the identifier octet is `expected`.
    pub fn expect_tag(self, expected: u8, what: &str) -> SigningResult<Self> {
        if self.tag == expected {
            Ok(self)
        } else {
            Err(SigningError::EncodingFailure(format!(
                "{what}: expected tag 0x{expected:02X}, found 0x{:02X}",
                self.tag
            )))
        }
    }
}

fn concat_children(children: &[Node]) -> Vec<u8> {
    let mut content = Vec::new();
    for child in children {
        child.encode_into(&mut content);
    }
    content
}

/// Encode an ASN.1 length field (short form below 128, minimal long form above).
#[must_use]
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let bytes = length.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = Vec::with_capacity(1 + bytes.len() - start);
    out.push(0x80 | (bytes.len() - start) as u8);
    out.extend_from_slice(&bytes[start..]);
    out
}

/// Write a DER TLV (tag-length-value) to a buffer.
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
}

/// Parse an identifier and length; returns `(tag, header_len, content_len)`.
fn read_header(input: &[u8]) -> SigningResult<(u8, usize, usize)> {
    let Some(&tag) = input.first() else {
        return Err(SigningError::EncodingFailure("empty DER input".into()));
    };
    if tag & HIGH_TAG_NUMBER == HIGH_TAG_NUMBER {
        return Err(SigningError::EncodingFailure(format!(
            "high tag number form not supported (identifier 0x{tag:02X})"
        )));
    }
    let Some(&first) = input.get(1) else {
        return Err(SigningError::EncodingFailure(format!(
            "missing length after tag 0x{tag:02X}"
        )));
    };
    if first < 0x80 {
        return Ok((tag, 2, first as usize));
    }
    if first == 0x80 {
        return Err(SigningError::EncodingFailure(format!(
            "indefinite length under tag 0x{tag:02X} is BER, not DER"
        )));
    }
    let count = (first & 0x7F) as usize;
    if count > std::mem::size_of::<usize>() || count > 4 {
        return Err(SigningError::EncodingFailure(format!(
            "length field of {count} octets is too large"
        )));
    }
    let Some(octets) = input.get(2..2 + count) else {
        return Err(SigningError::EncodingFailure("truncated length field".into()));
    };
    if octets[0] == 0 {
        return Err(SigningError::EncodingFailure(
            "length encoded with leading zero octet".into(),
        ));
    }
    let length = octets
        .iter()
        .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
    if length < 0x80 {
        return Err(SigningError::EncodingFailure(format!(
            "length {length} should use the short form"
        )));
    }
    Ok((tag, 2 + count, length))
}

fn decode_element(input: &[u8], depth: usize) -> SigningResult<(Node, usize)> {
    if depth > MAX_DEPTH {
        return Err(SigningError::EncodingFailure(format!(
            "DER nesting deeper than {MAX_DEPTH} levels"
        )));
    }
    let (element, _) = Element::split_first(input)?;
    let (tag, content) = (element.tag, element.content);

    let node = match tag {
        TAG_INTEGER => {
            check_minimal_integer(content)?;
            Node::Integer(content.to_vec())
        }
        TAG_OCTET_STRING => Node::OctetString(content.to_vec()),
        TAG_NULL => {
            if !content.is_empty() {
                return Err(SigningError::EncodingFailure(
                    "NULL with non-empty content".into(),
                ));
            }
            Node::Null
        }
        TAG_OID => {
            let oid = ObjectIdentifier::from_bytes(content).map_err(|e| {
                SigningError::EncodingFailure(format!("invalid OBJECT IDENTIFIER: {e}"))
            })?;
            Node::ObjectIdentifier(oid)
        }
        TAG_SEQUENCE => Node::Sequence(decode_children(content, depth + 1)?),
        TAG_SET => Node::Set(decode_children(content, depth + 1)?),
        t if t & CLASS_MASK == CLASS_CONTEXT && t & CONSTRUCTED != 0 => {
            Node::ContextTag(t & HIGH_TAG_NUMBER, decode_children(content, depth + 1)?)
        }
        t => Node::Other {
            tag: t,
            content: content.to_vec(),
        },
    };
    Ok((node, element.raw.len()))
}

fn decode_children(mut content: &[u8], depth: usize) -> SigningResult<Vec<Node>> {
    let mut children = Vec::new();
    while !content.is_empty() {
        let (child, consumed) = decode_element(content, depth)?;
        children.push(child);
        content = &content[consumed..];
    }
    Ok(children)
}

fn check_minimal_integer(content: &[u8]) -> SigningResult<()> {
    match content {
        [] => Err(SigningError::EncodingFailure("empty INTEGER".into())),
        [0x00, next, ..] if next & 0x80 == 0 => Err(SigningError::EncodingFailure(
            "INTEGER has redundant leading 0x00".into(),
        )),
        [0xFF, next, ..] if next & 0x80 != 0 => Err(SigningError::EncodingFailure(
            "INTEGER has redundant leading 0xFF".into(),
        )),
        _ => Ok(()),
    }
}

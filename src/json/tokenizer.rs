//! Single-pass structural tokenizer.
//!
//! The whole input is tokenized into one flat array before any value
//! decoding starts. Container tokens count their immediate children:
//! key/value pairs for objects, elements for arrays. String tokens bound the
//! content between the quotes; escape sequences are checked for shape here
//! and resolved later by the string decoder.

use crate::{EncodingResult, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Object,
    Array,
    String,
    Primitive,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first content byte (after the quote for strings).
    pub start: usize,
    /// Byte offset one past the content.
    pub end: usize,
    /// Immediate children: pairs for objects, elements for arrays.
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// A value may start here (root, after `:`, after `,` in an array).
    Value,
    /// First element of an array, or `]`.
    ValueOrEnd,
    /// First key of an object, or `}`.
    KeyOrEnd,
    /// A key is required (after `,` in an object).
    Key,
    Colon,
    AfterValue,
    Done,
}

pub fn tokenize(input: &[u8], token_limit: usize) -> EncodingResult<Vec<Token>> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut phase = Phase::Value;
    let mut i = 0;

    loop {
        while i < input.len() && input[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= input.len() {
            if phase == Phase::Done {
                return Ok(tokens);
            }
            return Err(Error::Decoding);
        }
        if phase == Phase::Done {
            // trailing garbage after the root value
            return Err(Error::Decoding);
        }

        let b = input[i];
        match phase {
            Phase::Value | Phase::ValueOrEnd => {
                if phase == Phase::ValueOrEnd && b == b']' {
                    i = close(&mut tokens, &mut stack, TokenKind::Array, i)?;
                    phase = after_value(&tokens, &stack);
                    continue;
                }
                match b {
                    b'{' => {
                        bump_array_parent(&mut tokens, &stack);
                        push(&mut tokens, token_limit, TokenKind::Object, i, 0)?;
                        stack.push(tokens.len() - 1);
                        phase = Phase::KeyOrEnd;
                        i += 1;
                    }
                    b'[' => {
                        bump_array_parent(&mut tokens, &stack);
                        push(&mut tokens, token_limit, TokenKind::Array, i, 0)?;
                        stack.push(tokens.len() - 1);
                        phase = Phase::ValueOrEnd;
                        i += 1;
                    }
                    b'"' => {
                        bump_array_parent(&mut tokens, &stack);
                        let (start, end) = scan_string(input, i)?;
                        push(&mut tokens, token_limit, TokenKind::String, start, end)?;
                        phase = after_value(&tokens, &stack);
                        i = end + 1;
                    }
                    b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => {
                        bump_array_parent(&mut tokens, &stack);
                        let end = scan_primitive(input, i);
                        push(&mut tokens, token_limit, TokenKind::Primitive, i, end)?;
                        phase = after_value(&tokens, &stack);
                        i = end;
                    }
                    _ => return Err(Error::Decoding),
                }
            }
            Phase::KeyOrEnd | Phase::Key => match b {
                b'"' => {
                    let (start, end) = scan_string(input, i)?;
                    push(&mut tokens, token_limit, TokenKind::String, start, end)?;
                    // a key opens a new pair
                    let parent = *stack.last().ok_or(Error::Decoding)?;
                    tokens[parent].size += 1;
                    phase = Phase::Colon;
                    i = end + 1;
                }
                b'}' if phase == Phase::KeyOrEnd => {
                    i = close(&mut tokens, &mut stack, TokenKind::Object, i)?;
                    phase = after_value(&tokens, &stack);
                }
                _ => return Err(Error::Decoding),
            },
            Phase::Colon => {
                if b != b':' {
                    return Err(Error::Decoding);
                }
                phase = Phase::Value;
                i += 1;
            }
            Phase::AfterValue => {
                let parent = *stack.last().ok_or(Error::Decoding)?;
                match (tokens[parent].kind, b) {
                    (TokenKind::Object, b',') => {
                        phase = Phase::Key;
                        i += 1;
                    }
                    (TokenKind::Object, b'}') => {
                        i = close(&mut tokens, &mut stack, TokenKind::Object, i)?;
                        phase = after_value(&tokens, &stack);
                    }
                    (TokenKind::Array, b',') => {
                        phase = Phase::Value;
                        i += 1;
                    }
                    (TokenKind::Array, b']') => {
                        i = close(&mut tokens, &mut stack, TokenKind::Array, i)?;
                        phase = after_value(&tokens, &stack);
                    }
                    _ => return Err(Error::Decoding),
                }
            }
            Phase::Done => unreachable!(),
        }
    }
}

fn after_value(_tokens: &[Token], stack: &[usize]) -> Phase {
    if stack.is_empty() {
        Phase::Done
    } else {
        Phase::AfterValue
    }
}

fn bump_array_parent(tokens: &mut [Token], stack: &[usize]) {
    if let Some(&parent) = stack.last() {
        if tokens[parent].kind == TokenKind::Array {
            tokens[parent].size += 1;
        }
    }
}

fn push(
    tokens: &mut Vec<Token>,
    token_limit: usize,
    kind: TokenKind,
    start: usize,
    end: usize,
) -> EncodingResult<()> {
    if tokens.len() >= token_limit {
        log::debug!("token budget of {token_limit} exhausted");
        return Err(Error::Decoding);
    }
    tokens.push(Token { kind, start, end, size: 0 });
    Ok(())
}

fn close(
    tokens: &mut [Token],
    stack: &mut Vec<usize>,
    kind: TokenKind,
    i: usize,
) -> EncodingResult<usize> {
    let idx = stack.pop().ok_or(Error::Decoding)?;
    if tokens[idx].kind != kind {
        return Err(Error::Decoding);
    }
    tokens[idx].end = i + 1;
    Ok(i + 1)
}

/// Returns content bounds (between the quotes). Escape sequences must be
/// well-formed; `\u` requires four hex digits.
fn scan_string(input: &[u8], quote: usize) -> EncodingResult<(usize, usize)> {
    let start = quote + 1;
    let mut i = start;
    while i < input.len() {
        match input[i] {
            b'"' => return Ok((start, i)),
            b'\\' => {
                let esc = *input.get(i + 1).ok_or(Error::Decoding)?;
                match esc {
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => i += 2,
                    b'u' => {
                        if input.len() < i + 6
                            || !input[i + 2..i + 6].iter().all(u8::is_ascii_hexdigit)
                        {
                            return Err(Error::Decoding);
                        }
                        i += 6;
                    }
                    _ => return Err(Error::Decoding),
                }
            }
            c if c < 0x20 => return Err(Error::Decoding),
            _ => i += 1,
        }
    }
    Err(Error::Decoding)
}

fn scan_primitive(input: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < input.len() {
        match input[i] {
            b',' | b']' | b'}' | b':' => break,
            c if c.is_ascii_whitespace() => break,
            _ => i += 1,
        }
    }
    i
}

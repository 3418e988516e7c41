//! OPC UA JSON codec, reversible and non-reversible.
//!
//! Encoding writes through [`writer::JsonWriter`], which doubles as the size
//! calculator when run in counting mode. Decoding tokenizes the whole input
//! once into a flat token array and then walks it.

pub mod decode;
pub mod encode;
pub mod tokenizer;
pub mod writer;

use crate::descriptor::DataTypeTable;
use crate::json::decode::TokenStream;
use crate::json::tokenizer::{tokenize, TokenKind};
use crate::json::writer::JsonWriter;
use crate::{EncodingResult, Error};

/// Token budget of one decode call. Exhausting it is a decoding error.
pub const DEFAULT_TOKEN_LIMIT: usize = 1000;

pub struct JsonCtx<'a> {
    pub reversible: bool,
    /// Namespace URI table, indexed by namespace index. Only read in
    /// non-reversible mode.
    pub namespaces: &'a [String],
    /// Server URI table, indexed by server index. Only read in
    /// non-reversible mode.
    pub server_uris: &'a [String],
    pub types: &'a DataTypeTable,
    pub token_limit: usize,
}

impl<'a> JsonCtx<'a> {
    pub fn reversible(types: &'a DataTypeTable) -> Self {
        Self {
            reversible: true,
            namespaces: &[],
            server_uris: &[],
            types,
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }

    pub fn non_reversible(
        types: &'a DataTypeTable,
        namespaces: &'a [String],
        server_uris: &'a [String],
    ) -> Self {
        Self {
            reversible: false,
            namespaces,
            server_uris,
            types,
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }
}

pub trait JsonEncodable {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()>;
}

pub trait JsonDecodable: Sized {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self>;
}

/// Encode into `buf`, returning the number of bytes written.
pub fn encode<T: JsonEncodable + ?Sized>(
    value: &T,
    buf: &mut [u8],
    ctx: &JsonCtx,
) -> EncodingResult<usize> {
    let mut w = JsonWriter::new(buf);
    value.encode_json(&mut w, ctx)?;
    Ok(w.pos())
}

/// Number of bytes [`encode`] would produce, via a counting writer.
pub fn calc_size<T: JsonEncodable + ?Sized>(value: &T, ctx: &JsonCtx) -> EncodingResult<usize> {
    let mut w = JsonWriter::counting();
    value.encode_json(&mut w, ctx)?;
    Ok(w.pos())
}

/// Decode one value. The root must be an object, except that a lone
/// primitive or string root is decoded directly.
pub fn decode<T: JsonDecodable>(input: &[u8], ctx: &JsonCtx) -> EncodingResult<T> {
    let tokens = tokenize(input, ctx.token_limit)?;
    let Some(root) = tokens.first() else {
        return Err(Error::Decoding);
    };
    match root.kind {
        TokenKind::Object => {}
        TokenKind::String | TokenKind::Primitive if tokens.len() == 1 => {}
        _ => return Err(Error::Decoding),
    }
    let mut stream = TokenStream::new(input, tokens);
    T::decode_json(&mut stream, ctx)
}

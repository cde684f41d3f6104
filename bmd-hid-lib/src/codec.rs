//! Generic report codec.
//!
//! A [`MessageCodec`] is parameterised by a [`Catalogue`], the closed set of
//! messages valid on one report channel. Decoding distinguishes three outcomes:
//! `Ok(Some(_))` for a parsed message, `Ok(None)` for an empty report or an
//! unrecognised discriminator (logged, the caller keeps polling), and
//! `Err(DecodeError)` for a known discriminator with a malformed body.

use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};
use std::marker::PhantomData;
use tracing::warn;

/// A closed catalogue of messages sharing one report channel.
pub trait Catalogue: Sized {
    /// Channel name used in diagnostics.
    const CHANNEL: &'static str;

    /// The discriminator byte of this message.
    fn id(&self) -> u8;

    /// Parses the body following discriminator `id`. Returns `Ok(None)` when
    /// `id` is not part of the catalogue.
    fn decode_body(id: u8, body: &[u8]) -> Result<Option<Self>, DecodeError>;

    /// Writes the fixed layout following the discriminator.
    fn encode_body(&self, out: &mut BytesMut);
}

/// Encode/decode engine for one catalogue. Stateless and freely shareable.
pub struct MessageCodec<C> {
    _catalogue: PhantomData<fn() -> C>,
}

impl<C: Catalogue> MessageCodec<C> {
    pub const fn new() -> Self {
        Self {
            _catalogue: PhantomData,
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Option<C>, DecodeError> {
        let Some((&id, body)) = data.split_first() else {
            return Ok(None);
        };
        let message = C::decode_body(id, body)?;
        if message.is_none() {
            warn!(
                channel = C::CHANNEL,
                "Unhandled message {} {}",
                id,
                hex::encode(data)
            );
        }
        Ok(message)
    }

    pub fn encode(&self, message: &C) -> Bytes {
        let mut out = BytesMut::with_capacity(64);
        out.put_u8(message.id());
        message.encode_body(&mut out);
        out.freeze()
    }
}

impl<C: Catalogue> Default for MessageCodec<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for MessageCodec<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for MessageCodec<C> {}

impl<C> std::fmt::Debug for MessageCodec<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec").finish()
    }
}

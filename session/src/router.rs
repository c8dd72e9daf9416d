//! Per-message-id dispatch shared by both session roles.

use std::collections::HashMap;

use payload::{PayloadReader, PayloadWriter};

/// A registered message handler. `Ctx` is `()` on the client and the
/// originating [`Peer`](transport::Peer) on the server.
pub(crate) type Handler<Ctx> = Box<dyn FnMut(Ctx, &mut PayloadReader<'_>)>;

/// Maps one-byte message ids to handlers and runs the dispatch loop over
/// inbound packets.
pub(crate) struct Router<Ctx> {
    handlers: HashMap<u8, Handler<Ctx>>,
}

impl<Ctx: Copy> Router<Ctx> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `id`, silently replacing any previous one.
    pub fn register(&mut self, id: u8, handler: Handler<Ctx>) {
        self.handlers.insert(id, handler);
    }

    /// Removes the handler for `id`, returning whether one was present.
    pub fn unregister(&mut self, id: u8) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Dispatches one packet's bytes.
    ///
    /// While unread bytes remain: read one id byte, invoke its handler
    /// with the reader positioned after the id. An unregistered id
    /// consumes only the id byte; the remaining bytes are interpreted as
    /// further id-prefixed messages, which desynchronizes the rest of the
    /// packet unless payloads are self-describing. Every iteration
    /// consumes at least one byte, so the loop always terminates.
    pub fn dispatch(&mut self, ctx: Ctx, packet: &[u8]) {
        let mut reader = PayloadReader::new(packet);
        while let Ok(id) = reader.read_u8() {
            if let Some(handler) = self.handlers.get_mut(&id) {
                handler(ctx, &mut reader);
            }
        }
    }
}

/// Resets `buffer` and composes one message into it: the id byte, then
/// whatever `encode` appends.
pub(crate) fn compose_message(
    buffer: &mut Vec<u8>,
    id: u8,
    encode: impl FnOnce(&mut PayloadWriter<'_>),
) {
    buffer.clear();
    let mut writer = PayloadWriter::new(buffer);
    writer.write_u8(id);
    encode(&mut writer);
}

/// Resets `buffer` and composes a bare payload with no id byte, for
/// handshake and farewell data.
pub(crate) fn compose_raw(buffer: &mut Vec<u8>, encode: impl FnOnce(&mut PayloadWriter<'_>)) {
    buffer.clear();
    let mut writer = PayloadWriter::new(buffer);
    encode(&mut writer);
}

//! Chat model port.
//!
//! `ChatModel` is the opaque "messages + tools in, message out" call the
//! agent loop drives. `BoxChatModel` erases the concrete provider.

pub mod box_model;
pub mod model;

pub mod codec;
pub mod document;
pub mod error;
pub mod session;

pub use codec::PathCodec;
pub use document::{SessionDocument, SessionLog};
pub use error::{CodecError, StoreError};
pub use session::{load_session, save_session, write_document};

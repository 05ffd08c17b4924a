//! Postbox shared types: the message model, the HTML form codec and the
//! length-prefixed wire frame spoken between intake and sink.

pub mod error;
pub mod form;
pub mod frame;
pub mod models;

pub use error::{FormError, FrameError};
pub use form::{decode_form, encode_form};
pub use frame::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER, encode_frame, read_frame, write_frame};
pub use models::{ANONYMOUS_USERNAME, Message, StoredMessage};

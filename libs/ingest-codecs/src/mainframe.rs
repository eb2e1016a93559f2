//! Mainframe fixed-width record decoding
//!
//! ```text
//! mainframe
//!     ├── ebcdic   (CP037 table, strict/lenient text)
//!     ├── decimal  (zoned, COMP-3, binary, encoders)
//!     ├── layout   (CopybookLayout, FieldSpec, fingerprint)
//!     ├── decoder  (decode_record, RecordDecoder)
//!     ├── batch    (decode_batch iterator)
//!     └── store    (StoredBatch envelope)
//! ```
//!
//! Numeric fields go straight from bytes to `BigInt`; only TEXT fields pass
//! through the code page.

mod batch;
mod decimal;
mod decoder;
mod ebcdic;
mod layout;
mod record;
mod store;

pub use batch::{decode_batch, BatchDecoder, BatchSummary};
pub use decimal::{
    decode_binary, decode_packed, decode_zoned, encode_packed, encode_zoned, format_scaled,
};
pub use decoder::{decode_record, DecodeOptions, RecordDecoder};
pub use ebcdic::{cp037_char, decode_cp037, encode_cp037, encode_cp037_padded, EBCDIC_SPACE};
pub use layout::{CopybookLayout, FieldKind, FieldSpec};
pub use record::{FieldValue, MainframeRecord};
pub use store::{StoredBatch, StoredRecord, STORED_BATCH_VERSION};

pub use num_bigint::BigInt;

//! ZIP container support: parsing, member content access, rewriting.
//!
//! The module is organized into three components:
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures and member payloads
//! - [`writer`]: Serialization of a rewritten archive
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each member
//! 2. Central Directory with metadata for all members
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Parsing reads the EOCD first (from the end of the file), then the
//! Central Directory, which carries authoritative names, sizes and CRCs
//! for every member. Rewriting streams the members back out in the same
//! order and regenerates the directory.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading archives > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - No ZIP64 output (rewritten archives must stay under 4GB)

mod parser;
mod structures;
mod writer;

pub use parser::ZipParser;
pub use structures::*;
pub use writer::ZipWriter;

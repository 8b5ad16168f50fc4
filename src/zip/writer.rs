//! ZIP archive serialization.
//!
//! The updater rewrites an archive by streaming every member back out in
//! central directory order: untouched members keep their stored payload
//! bytes, flags, timestamps, CRC and external attributes; filtered
//! members are re-encoded with their original compression method.
//! Headers are always written complete up front, so the data-descriptor
//! flag is dropped and no descriptors are emitted.
//!
//! Output is plain ZIP only. Archives whose rewritten form would need
//! ZIP64 records (offsets or sizes beyond 32 bits, more than 65535
//! members) are rejected before any bytes reach the disk.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{Compression, Crc, write::DeflateEncoder};
use std::io::Write;

use anyhow::{Context, Result, bail};

use super::structures::*;

/// "Version made by" / "version needed": 2.0, plain deflate-era zip.
const ZIP_VERSION: u16 = 20;

struct CentralRecord {
    file_name_raw: Vec<u8>,
    flags: u16,
    method: u16,
    last_mod_time: u16,
    last_mod_date: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    external_attrs: u32,
    lfh_offset: u32,
}

/// In-memory builder for a rewritten archive.
///
/// Members are appended in order, then [`finish`](Self::finish) produces
/// the complete archive image (local headers and payloads, central
/// directory, EOCD).
pub struct ZipWriter {
    data: Vec<u8>,
    central: Vec<CentralRecord>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            central: Vec::new(),
        }
    }

    /// Append a member whose content is unchanged, copying its stored
    /// payload bytes verbatim. Directory entries pass an empty payload.
    pub fn append_raw(&mut self, entry: &ZipFileEntry, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 != entry.compressed_size {
            bail!(
                "{}: stored payload is {} bytes, central directory says {}",
                entry.file_name,
                payload.len(),
                entry.compressed_size
            );
        }

        // Sizes and CRC now live in the local header, so the descriptor
        // bit must go; everything else is carried through.
        let flags = entry.flags & !FLAG_DATA_DESCRIPTOR;
        self.append_member(
            entry,
            flags,
            entry.compression_method.as_u16(),
            entry.crc32,
            payload,
            entry.uncompressed_size,
        )
    }

    /// Append a member with replacement content, re-encoded with the
    /// member's original compression method.
    pub fn append_filtered(&mut self, entry: &ZipFileEntry, content: &[u8]) -> Result<()> {
        let payload = match entry.compression_method {
            CompressionMethod::Stored => content.to_vec(),
            CompressionMethod::Deflate => deflate(content)
                .with_context(|| format!("{}: compressing replacement content", entry.file_name))?,
            CompressionMethod::Unknown(method) => {
                bail!(
                    "{}: unsupported compression method: {method}",
                    entry.file_name
                );
            }
        };

        let mut crc = Crc::new();
        crc.update(content);

        let flags = entry.flags & !(FLAG_DATA_DESCRIPTOR | FLAG_ENCRYPTED);
        self.append_member(
            entry,
            flags,
            entry.compression_method.as_u16(),
            crc.sum(),
            &payload,
            content.len() as u64,
        )
    }

    fn append_member(
        &mut self,
        entry: &ZipFileEntry,
        flags: u16,
        method: u16,
        crc32: u32,
        payload: &[u8],
        uncompressed_size: u64,
    ) -> Result<()> {
        let lfh_offset = checked_u32(self.data.len() as u64, "archive size")?;
        let compressed_size = checked_u32(payload.len() as u64, "compressed member size")?;
        let uncompressed_size = checked_u32(uncompressed_size, "member size")?;
        let name_len = u16::try_from(entry.file_name_raw.len())
            .map_err(|_| anyhow::anyhow!("{}: member name too long", entry.file_name))?;

        // Local File Header
        self.data.write_all(LFH_SIGNATURE)?;
        self.data.write_u16::<LittleEndian>(ZIP_VERSION)?;
        self.data.write_u16::<LittleEndian>(flags)?;
        self.data.write_u16::<LittleEndian>(method)?;
        self.data.write_u16::<LittleEndian>(entry.last_mod_time)?;
        self.data.write_u16::<LittleEndian>(entry.last_mod_date)?;
        self.data.write_u32::<LittleEndian>(crc32)?;
        self.data.write_u32::<LittleEndian>(compressed_size)?;
        self.data.write_u32::<LittleEndian>(uncompressed_size)?;
        self.data.write_u16::<LittleEndian>(name_len)?;
        self.data.write_u16::<LittleEndian>(0)?; // extra field length
        self.data.write_all(&entry.file_name_raw)?;
        self.data.write_all(payload)?;

        self.central.push(CentralRecord {
            file_name_raw: entry.file_name_raw.clone(),
            flags,
            method,
            last_mod_time: entry.last_mod_time,
            last_mod_date: entry.last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            external_attrs: entry.external_attrs,
            lfh_offset,
        });

        Ok(())
    }

    /// Write the central directory and EOCD, returning the archive image.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let cd_offset = checked_u32(self.data.len() as u64, "central directory offset")?;
        let total_entries = u16::try_from(self.central.len())
            .map_err(|_| anyhow::anyhow!("too many members; zip64 output is not supported"))?;

        for record in &self.central {
            self.data.write_all(CDFH_SIGNATURE)?;
            self.data.write_u16::<LittleEndian>(ZIP_VERSION)?; // version made by
            self.data.write_u16::<LittleEndian>(ZIP_VERSION)?; // version needed
            self.data.write_u16::<LittleEndian>(record.flags)?;
            self.data.write_u16::<LittleEndian>(record.method)?;
            self.data.write_u16::<LittleEndian>(record.last_mod_time)?;
            self.data.write_u16::<LittleEndian>(record.last_mod_date)?;
            self.data.write_u32::<LittleEndian>(record.crc32)?;
            self.data.write_u32::<LittleEndian>(record.compressed_size)?;
            self.data.write_u32::<LittleEndian>(record.uncompressed_size)?;
            self.data
                .write_u16::<LittleEndian>(record.file_name_raw.len() as u16)?;
            self.data.write_u16::<LittleEndian>(0)?; // extra field length
            self.data.write_u16::<LittleEndian>(0)?; // file comment length
            self.data.write_u16::<LittleEndian>(0)?; // disk number start
            self.data.write_u16::<LittleEndian>(0)?; // internal attributes
            self.data.write_u32::<LittleEndian>(record.external_attrs)?;
            self.data.write_u32::<LittleEndian>(record.lfh_offset)?;
            self.data.write_all(&record.file_name_raw)?;
        }

        let cd_end = checked_u32(self.data.len() as u64, "central directory size")?;

        // End of Central Directory
        self.data.write_all(EndOfCentralDirectory::SIGNATURE)?;
        self.data.write_u16::<LittleEndian>(0)?; // disk number
        self.data.write_u16::<LittleEndian>(0)?; // disk with central directory
        self.data.write_u16::<LittleEndian>(total_entries)?;
        self.data.write_u16::<LittleEndian>(total_entries)?;
        self.data.write_u32::<LittleEndian>(cd_end - cd_offset)?;
        self.data.write_u32::<LittleEndian>(cd_offset)?;
        self.data.write_u16::<LittleEndian>(0)?; // comment length

        Ok(self.data)
    }
}

fn deflate(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

fn checked_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow::anyhow!("{what} exceeds 4 GiB; zip64 output is not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ReadAt;
    use crate::zip::ZipParser;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MemReader(Vec<u8>);

    #[async_trait]
    impl ReadAt for MemReader {
        async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
            let start = offset as usize;
            let end = start + buf.len();
            if end > self.0.len() {
                bail!("read past end of buffer");
            }
            buf.copy_from_slice(&self.0[start..end]);
            Ok(())
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    fn entry(name: &str, method: CompressionMethod) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            file_name_raw: name.as_bytes().to_vec(),
            compression_method: method,
            flags: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0x7a3c,
            last_mod_date: 0x5a21,
            external_attrs: 0,
            is_directory: name.ends_with('/'),
        }
    }

    #[tokio::test]
    async fn written_archive_parses_back() {
        let mut writer = ZipWriter::new();
        writer
            .append_filtered(&entry("docs/", CompressionMethod::Stored), b"")
            .unwrap();
        writer
            .append_filtered(&entry("docs/a.txt", CompressionMethod::Stored), b"plain")
            .unwrap();
        writer
            .append_filtered(
                &entry("docs/b.xml", CompressionMethod::Deflate),
                b"<root>compress me, repeat repeat repeat</root>",
            )
            .unwrap();
        let image = writer.finish().unwrap();

        let parser = ZipParser::new(Arc::new(MemReader(image)));
        let entries = parser.read_entries().await.unwrap();
        assert_eq!(entries.len(), 3);

        assert!(entries[0].is_directory);
        assert_eq!(entries[0].file_name, "docs/");

        assert_eq!(entries[1].compression_method, CompressionMethod::Stored);
        assert_eq!(parser.read_member(&entries[1]).await.unwrap(), b"plain");

        assert_eq!(entries[2].compression_method, CompressionMethod::Deflate);
        assert_eq!(
            parser.read_member(&entries[2]).await.unwrap(),
            b"<root>compress me, repeat repeat repeat</root>"
        );
    }

    #[tokio::test]
    async fn raw_copy_preserves_payload_and_metadata() {
        let mut writer = ZipWriter::new();
        writer
            .append_filtered(&entry("keep.bin", CompressionMethod::Deflate), b"abcabcabc")
            .unwrap();
        let image = writer.finish().unwrap();

        let parser = ZipParser::new(Arc::new(MemReader(image)));
        let parsed = parser.read_entries().await.unwrap().remove(0);
        let payload = parser.read_compressed(&parsed).await.unwrap();

        // Round-trip the parsed entry through a raw copy.
        let mut second = ZipWriter::new();
        second.append_raw(&parsed, &payload).unwrap();
        let image = second.finish().unwrap();

        let parser = ZipParser::new(Arc::new(MemReader(image)));
        let copied = parser.read_entries().await.unwrap().remove(0);
        assert_eq!(copied.crc32, parsed.crc32);
        assert_eq!(copied.compressed_size, parsed.compressed_size);
        assert_eq!(copied.last_mod_time, parsed.last_mod_time);
        assert_eq!(copied.last_mod_date, parsed.last_mod_date);
        assert_eq!(parser.read_member(&copied).await.unwrap(), b"abcabcabc");
    }

    #[test]
    fn raw_payload_size_mismatch_is_rejected() {
        let mut parsed = entry("bad.txt", CompressionMethod::Stored);
        parsed.compressed_size = 10;
        let mut writer = ZipWriter::new();
        assert!(writer.append_raw(&parsed, b"short").is_err());
    }
}

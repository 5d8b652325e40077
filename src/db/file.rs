use anyhow::{anyhow, ensure, Result};
use crc::{Crc, CRC_32_BZIP2};
use std::path::Path;

use super::{crypto::Cipher, database::DatabaseV1, Database};

const MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024 * 1024;

fn crc() -> Crc<u32> {
    Crc::<u32>::new(&CRC_32_BZIP2)
}

/// Returns Ok(None) if the db file doesn't exist yet
pub async fn load(path: &Path, cipher: &impl Cipher) -> Result<Option<DatabaseV1>> {
    log::debug!("Loading database...");
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }

    let content_ciphertext = tokio::fs::read(path).await?;
    let content_plaintext = cipher.decrypt(&content_ciphertext)?;
    let content_decompressed =
        zstd::bulk::decompress(&content_plaintext, MAX_DECOMPRESSED_SIZE)?;
    let crc = crc();
    let (parsed, remaining): (Database, &[u8]) =
        postcard::take_from_bytes_crc32(&content_decompressed, crc.digest())?;
    let Database::V1(database) = parsed;
    ensure!(remaining.is_empty(), "File had extra bytes");

    log::debug!("Loading database...done");

    Ok(Some(database))
}

pub async fn save(db: DatabaseV1, path: &Path, cipher: &impl Cipher) -> Result<()> {
    log::debug!("Saving database...");

    let crc = crc();
    let content_plaintext = postcard::to_stdvec_crc32(&Database::V1(db), crc.digest())?;
    let content_compressed =
        zstd::bulk::compress(&content_plaintext, zstd::DEFAULT_COMPRESSION_LEVEL)?;
    let content_ciphertext = cipher.encrypt(&content_compressed)?;

    // Write to a temporary file first so a failed write can't corrupt the database
    let filename = path
        .file_name()
        .ok_or_else(|| anyhow!("Path has no filename"))?
        .to_str()
        .ok_or_else(|| anyhow!("Filename isn't valid utf-8"))?;
    let tmppath = path.with_file_name(format!("{filename}.tmp"));
    tokio::fs::write(&tmppath, content_ciphertext).await?;
    tokio::fs::rename(&tmppath, path).await?;

    log::debug!("Saving database...done");

    Ok(())
}

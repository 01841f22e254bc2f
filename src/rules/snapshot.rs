//! Rule registry persistence
//!
//! Binary snapshot of the registry, the only persisted artifact of the
//! routing core. The prefix index is derived state and is rebuilt from
//! the reloaded rules.
//!
//! # Format (all integers little-endian)
//!
//! ```text
//! magic      "SRUL" (4 bytes)
//! version    u32
//! payload:
//!   created_at  length-prefixed string (RFC3339)
//!   rule_count  u32
//!   per rule:
//!     index         length-prefixed string
//!     name          length-prefixed string
//!     raw_arg_count u32
//!     raw_args      length-prefixed strings
//! checksum   u32 (crc32 of payload)
//! ```
//!
//! Loading re-invokes the rule parser on the raw tokens, so the on-disk
//! format is stable across internal representation changes. Any rule
//! that fails to re-parse aborts the whole load: a silently dropped
//! rule would silently change which future writes get indexed.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::Utc;
use crc32fast::Hasher;

use super::errors::{RuleError, SnapshotError, SnapshotResult};
use super::RuleRegistry;

const MAGIC: &[u8; 4] = b"SRUL";
pub const CURRENT_VERSION: u32 = 1;

/// Serializes `registry` to `writer` in insertion order.
pub fn write_snapshot<W: Write>(registry: &RuleRegistry, writer: &mut W) -> SnapshotResult<()> {
    let mut payload = Vec::new();
    write_string(&mut payload, &Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    payload.extend_from_slice(&(registry.rules().len() as u32).to_le_bytes());
    for rule in registry.rules() {
        write_string(&mut payload, &rule.index);
        write_string(&mut payload, &rule.name);
        payload.extend_from_slice(&(rule.raw_args.len() as u32).to_le_bytes());
        for arg in &rule.raw_args {
            write_string(&mut payload, arg);
        }
    }

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let checksum = hasher.finalize();

    writer.write_all(MAGIC)?;
    writer.write_all(&CURRENT_VERSION.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&checksum.to_le_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reloads a snapshot into `registry`, re-parsing every rule. Rules
/// colliding with existing ones fail the load as malformed. All or
/// nothing: on any error the registry is left exactly as it was.
pub fn load_snapshot<R: Read>(reader: &mut R, registry: &mut RuleRegistry) -> SnapshotResult<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }

    let version = read_u32(reader)?;
    if version > CURRENT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version,
            current: CURRENT_VERSION,
        });
    }

    // Everything up to the 4-byte trailer is checksummed payload.
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    if rest.len() < 4 {
        return Err(SnapshotError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "snapshot truncated before checksum",
        )));
    }
    let (payload, trailer) = rest.split_at(rest.len() - 4);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = Hasher::new();
    hasher.update(payload);
    let computed = hasher.finalize();
    if computed != expected {
        return Err(SnapshotError::ChecksumMismatch { expected, computed });
    }

    let mut cursor = Cursor::new(payload);
    let _created_at = read_string(&mut cursor)?;
    let rule_count = read_u32(&mut cursor)?;

    // Parse into a staging registry first; the live registry is only
    // touched once every rule has re-parsed.
    let mut staged = RuleRegistry::new(registry.evaluator.clone());
    for _ in 0..rule_count {
        let index = read_string(&mut cursor)?;
        let name = read_string(&mut cursor)?;
        let arg_count = read_u32(&mut cursor)?;
        let mut raw_args = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            raw_args.push(read_string(&mut cursor)?);
        }
        if registry.contains(&index, &name) {
            return Err(SnapshotError::MalformedRule {
                index: index.clone(),
                name: name.clone(),
                source: RuleError::DuplicateRule { index, name },
            });
        }
        staged
            .add_rule(&index, &name, &raw_args)
            .map_err(|source| SnapshotError::MalformedRule {
                index,
                name,
                source,
            })?;
    }
    registry.absorb(staged);
    Ok(())
}

/// Writes a snapshot to `path`, fsyncing before returning.
pub fn save_to_path(registry: &RuleRegistry, path: &Path) -> SnapshotResult<()> {
    let mut file = File::create(path)?;
    write_snapshot(registry, &mut file)?;
    file.sync_all()?;
    Ok(())
}

/// Loads a snapshot from `path` into `registry`.
pub fn load_from_path(path: &Path, registry: &mut RuleRegistry) -> SnapshotResult<()> {
    let mut file = File::open(path)?;
    load_snapshot(&mut file, registry)
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_u32<R: Read>(reader: &mut R) -> SnapshotResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_string<R: Read>(reader: &mut R) -> SnapshotResult<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| {
        SnapshotError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid UTF-8 in snapshot string: {}", e),
        ))
    })
}

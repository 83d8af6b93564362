// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

use crate::ClientError;
use lynx_core::prelude::{ClassEntry, ResultSet};

/// Split the flat classification strings of a response into one ranking per slot.
///
/// Entries are slot-major with the same count for every slot. The server
/// may return fewer than the requested top-K when the model has fewer
/// classes, so only the total is checked against `batch_size`.
pub fn decode_classes(classes: &[String], batch_size: usize) -> Result<ResultSet, ClientError> {
    if batch_size == 0 || classes.len() % batch_size != 0 {
        return Err(ClientError::MalformedOutput {
            entries: classes.len(),
            batch_size,
        });
    }

    let per_slot = classes.len() / batch_size;
    if per_slot == 0 {
        return Ok(ResultSet::new(vec![vec![]; batch_size]));
    }

    let slots = classes
        .chunks(per_slot)
        .map(|chunk| chunk.iter().map(|raw| parse_entry(raw)).collect())
        .collect::<Result<Vec<Vec<ClassEntry>>, ClientError>>()?;

    Ok(ResultSet::new(slots))
}

fn parse_entry(raw: &str) -> Result<ClassEntry, ClientError> {
    let malformed = || ClientError::MalformedClass(raw.to_owned());

    let mut parts = raw.splitn(3, ':');
    let score = parts
        .next()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .ok_or_else(malformed)?;
    let index = parts
        .next()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(malformed)?;
    let label = parts.next().unwrap_or_default().to_owned();

    Ok(ClassEntry {
        index,
        label,
        score,
    })
}

/// Split a raw `BYTES` tensor into its elements, each prefixed by a little-endian u32 length.
pub(crate) fn split_bytes_tensor(raw: &[u8]) -> Result<Vec<String>, ClientError> {
    let mut elements = vec![];
    let mut rest = raw;

    while !rest.is_empty() {
        let Some((len, tail)) = rest.split_first_chunk::<4>() else {
            return Err(ClientError::MalformedClass(
                String::from_utf8_lossy(rest).into_owned(),
            ));
        };

        let len = u32::from_le_bytes(*len) as usize;
        if tail.len() < len {
            return Err(ClientError::MalformedClass(
                String::from_utf8_lossy(tail).into_owned(),
            ));
        }

        let (element, tail) = tail.split_at(len);
        elements.push(String::from_utf8_lossy(element).into_owned());
        rest = tail;
    }

    Ok(elements)
}

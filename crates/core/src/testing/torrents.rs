//! Torrent fixture builders.

use crate::metafile::{encode, Value};

/// Bencoded single-file torrent with a fixed piece layout.
pub fn single_file_torrent(name: &str, length: u64, announce: &str) -> Vec<u8> {
    let info = Value::Dict(vec![
        (b"length".to_vec(), Value::Int(length as i64)),
        (b"name".to_vec(), Value::Bytes(name.as_bytes().to_vec())),
        (b"piece length".to_vec(), Value::Int(262_144)),
        (b"pieces".to_vec(), Value::Bytes(vec![0u8; 20])),
    ]);
    let root = Value::Dict(vec![
        (
            b"announce".to_vec(),
            Value::Bytes(announce.as_bytes().to_vec()),
        ),
        (b"info".to_vec(), info),
    ]);
    encode(&root)
}

/// Bencoded multi-file torrent. `files` pairs path segments with lengths.
pub fn multi_file_torrent(name: &str, files: &[(&[&str], u64)], announce: &str) -> Vec<u8> {
    let entries: Vec<Value> = files
        .iter()
        .map(|(path, length)| {
            Value::Dict(vec![
                (b"length".to_vec(), Value::Int(*length as i64)),
                (
                    b"path".to_vec(),
                    Value::List(
                        path.iter()
                            .map(|s| Value::Bytes(s.as_bytes().to_vec()))
                            .collect(),
                    ),
                ),
            ])
        })
        .collect();
    let info = Value::Dict(vec![
        (b"files".to_vec(), Value::List(entries)),
        (b"name".to_vec(), Value::Bytes(name.as_bytes().to_vec())),
        (b"piece length".to_vec(), Value::Int(262_144)),
        (b"pieces".to_vec(), Value::Bytes(vec![0u8; 20])),
    ]);
    let root = Value::Dict(vec![
        (
            b"announce".to_vec(),
            Value::Bytes(announce.as_bytes().to_vec()),
        ),
        (b"info".to_vec(), info),
    ]);
    encode(&root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metafile::Metafile;

    #[test]
    fn test_fixtures_parse() {
        let single = single_file_torrent("a.mkv", 100, "http://t/a");
        let meta = Metafile::parse(&single).unwrap();
        assert_eq!(meta.total_size(), 100);

        let multi = multi_file_torrent("Pack", &[(&["a.mkv"], 1), (&["d", "b.mkv"], 2)], "http://t/a");
        let meta = Metafile::parse(&multi).unwrap();
        assert_eq!(meta.files.len(), 2);
    }
}
